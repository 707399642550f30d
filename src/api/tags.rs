use sqlx::{Pool, Postgres};
use warp::{reject::Rejection, Filter, Reply};

use crate::{actions::tags, error::ApiError, schema::Uuid};

use super::query::with_pool;

pub fn routes(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("tags")
        .and(warp::get())
        .and(with_pool(pool.clone()))
        .and_then(list_tags);

    let detail = warp::path!("tags" / Uuid)
        .and(warp::get())
        .and(with_pool(pool))
        .and_then(get_tag);

    list.or(detail)
}

async fn list_tags(pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let rows = tags::list_tags(&pool).await.map_err(ApiError::reject)?;
    Ok(warp::reply::json(&rows))
}

async fn get_tag(id: Uuid, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let tag = tags::get_tag(id, &pool)
        .await
        .map_err(ApiError::reject)?
        .ok_or_else(|| ApiError::NotFound("No tag exists with specified id".to_string()).reject())?;

    Ok(warp::reply::json(&tag))
}
