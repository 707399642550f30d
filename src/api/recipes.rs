use serde_json::json;
use sqlx::{Pool, Postgres};
use warp::{http::StatusCode, reject::Rejection, Filter, Reply};

use crate::{
    actions::{recipes, shopping_list},
    authentication::permissions::ActionType,
    error::ApiError,
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    schema::{RecipePayload, Uuid},
};

use super::query::{query_pairs, raw_query, with_pool, RecipeListParams};
use super::users::json_body;

pub fn routes(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("recipes")
        .and(warp::get())
        .and(with_possible_session())
        .and(raw_query())
        .and(with_pool(pool.clone()))
        .and_then(list_recipes);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session())
        .and(json_body::<RecipePayload>())
        .and(with_pool(pool.clone()))
        .and_then(create_recipe);

    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(download_shopping_cart);

    let detail = warp::path!("recipes" / Uuid)
        .and(warp::get())
        .and(with_possible_session())
        .and(with_pool(pool.clone()))
        .and_then(get_recipe);

    let update = warp::path!("recipes" / Uuid)
        .and(warp::patch())
        .and(with_session())
        .and(json_body::<RecipePayload>())
        .and(with_pool(pool.clone()))
        .and_then(update_recipe);

    let delete = warp::path!("recipes" / Uuid)
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(delete_recipe);

    let favorite_add = warp::path!("recipes" / Uuid / "favorite")
        .and(warp::post())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(add_favorite);

    let favorite_remove = warp::path!("recipes" / Uuid / "favorite")
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(remove_favorite);

    let cart_add = warp::path!("recipes" / Uuid / "shopping_cart")
        .and(warp::post())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(add_to_cart);

    let cart_remove = warp::path!("recipes" / Uuid / "shopping_cart")
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(remove_from_cart);

    let get_link = warp::path!("recipes" / Uuid / "get-link")
        .and(warp::get())
        .and(with_pool(pool))
        .and_then(get_link);

    list.or(create)
        .or(download)
        .or(detail)
        .or(update)
        .or(delete)
        .or(favorite_add)
        .or(favorite_remove)
        .or(cart_add)
        .or(cart_remove)
        .or(get_link)
}

async fn list_recipes(
    session: Option<SessionData>,
    raw: String,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let params = RecipeListParams::from_pairs(&query_pairs(&raw));
    let viewer = session.map(|s| s.user_id);
    let page = recipes::fetch_recipes(&params.filter, viewer, params.page, params.limit, &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::json(&page))
}

async fn get_recipe(
    id: Uuid,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let recipe = recipes::get_recipe(id, &pool)
        .await
        .map_err(ApiError::reject)?
        .ok_or_else(|| {
            ApiError::NotFound("No recipe exists with specified id".to_string()).reject()
        })?;

    let viewer = session.map(|s| s.user_id);
    let full = recipes::build_recipe_full(recipe, viewer, &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::json(&full))
}

async fn create_recipe(
    session: SessionData,
    payload: RecipePayload,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::CreateRecipes)
        .map_err(ApiError::reject)?;
    let recipe = recipes::create_recipe(&payload, session.user_id, &pool)
        .await
        .map_err(ApiError::reject)?;
    let full = recipes::build_recipe_full(recipe, Some(session.user_id), &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&full),
        StatusCode::CREATED,
    ))
}

async fn update_recipe(
    id: Uuid,
    session: SessionData,
    payload: RecipePayload,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let recipe = recipes::update_recipe(id, &payload, &session, &pool)
        .await
        .map_err(ApiError::reject)?;
    let full = recipes::build_recipe_full(recipe, Some(session.user_id), &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::json(&full))
}

async fn delete_recipe(
    id: Uuid,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    recipes::delete_recipe(id, &session, &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

async fn add_favorite(
    id: Uuid,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::ManageOwnMembership)
        .map_err(ApiError::reject)?;
    let short = recipes::add_to_favorites(id, session.user_id, &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&short),
        StatusCode::CREATED,
    ))
}

async fn remove_favorite(
    id: Uuid,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::ManageOwnMembership)
        .map_err(ApiError::reject)?;
    recipes::remove_from_favorites(id, session.user_id, &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

async fn add_to_cart(
    id: Uuid,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::ManageOwnMembership)
        .map_err(ApiError::reject)?;
    let short = recipes::add_to_shopping_cart(id, session.user_id, &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&short),
        StatusCode::CREATED,
    ))
}

async fn remove_from_cart(
    id: Uuid,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::ManageOwnMembership)
        .map_err(ApiError::reject)?;
    recipes::remove_from_shopping_cart(id, session.user_id, &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

async fn download_shopping_cart(
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let bytes = shopping_list::export_shopping_list(session.user_id, &pool)
        .await
        .map_err(ApiError::reject)?;

    let response = warp::http::Response::builder()
        .header("content-type", "application/pdf")
        .header(
            "content-disposition",
            "attachment; filename=\"shopping_cart.pdf\"",
        )
        .body(bytes)
        .map_err(|e| ApiError::Internal(format!("{e}")).reject())?;

    Ok(response)
}

async fn get_link(id: Uuid, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let link = recipes::get_or_create_short_link(id, &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::json(&json!({ "short-link": link })))
}
