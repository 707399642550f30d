use sqlx::{Pool, Postgres};
use warp::{reject::Rejection, Filter, Reply};

use crate::{actions::ingredients, error::ApiError, schema::Uuid};

use super::query::{with_pool, IngredientQuery};

pub fn routes(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("ingredients")
        .and(warp::get())
        .and(warp::query::<IngredientQuery>())
        .and(with_pool(pool.clone()))
        .and_then(list_ingredients);

    let detail = warp::path!("ingredients" / Uuid)
        .and(warp::get())
        .and(with_pool(pool))
        .and_then(get_ingredient);

    list.or(detail)
}

async fn list_ingredients(
    query: IngredientQuery,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let rows = ingredients::search_ingredients(query.name.as_deref(), &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::json(&rows))
}

async fn get_ingredient(id: Uuid, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let ingredient = ingredients::get_ingredient(id, &pool)
        .await
        .map_err(ApiError::reject)?
        .ok_or_else(|| {
            ApiError::NotFound("No ingredient exists with specified id".to_string()).reject()
        })?;

    Ok(warp::reply::json(&ingredient))
}
