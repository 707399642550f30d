use sqlx::{Pool, Postgres};
use warp::{reject::Rejection, Filter, Reply};

use crate::{actions::recipes, error::ApiError};

use super::query::with_pool;
use super::{ingredients, recipes as recipe_routes, tags, users};

/// The full route tree: the versioned REST surface under `/api` plus the
/// short-link resolver, with rejections recovered into structured JSON.
pub fn routes(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let api = users::routes(pool.clone())
        .or(tags::routes(pool.clone()))
        .or(ingredients::routes(pool.clone()))
        .or(recipe_routes::routes(pool.clone()));

    warp::path("api")
        .and(api)
        .or(short_link(pool))
        .recover(crate::error::handle_rejection)
}

fn short_link(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("s" / String)
        .and(warp::get())
        .and(with_pool(pool))
        .and_then(resolve)
}

async fn resolve(code: String, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let recipe = recipes::resolve_short_link(&code, &pool)
        .await
        .map_err(ApiError::reject)?;

    let uri = format!("/recipes/{}", recipe.id)
        .parse::<warp::http::Uri>()
        .map_err(|e| ApiError::Internal(format!("{e}")).reject())?;

    Ok(warp::redirect::temporary(uri))
}
