use serde::de::DeserializeOwned;
use serde_json::json;
use sqlx::{Pool, Postgres};
use warp::{http::StatusCode, reject::Rejection, Filter, Reply};

use crate::{
    actions::{follows, users},
    authentication::permissions::ActionType,
    constants::MAX_BODY_BYTES,
    error::ApiError,
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    schema::{AvatarPayload, LoginPayload, RegisterPayload, UserProfile, Uuid},
};

use super::query::{with_pool, PageQuery};

pub fn json_body<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

pub fn routes(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("users")
        .and(warp::get())
        .and(with_possible_session())
        .and(warp::query::<PageQuery>())
        .and(with_pool(pool.clone()))
        .and_then(list_users);

    let register = warp::path!("users")
        .and(warp::post())
        .and(json_body::<RegisterPayload>())
        .and(with_pool(pool.clone()))
        .and_then(register);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(me);

    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(with_session())
        .and(warp::query::<PageQuery>())
        .and(with_pool(pool.clone()))
        .and_then(subscriptions);

    let put_avatar = warp::path!("users" / "me" / "avatar")
        .and(warp::put())
        .and(with_session())
        .and(json_body::<AvatarPayload>())
        .and(with_pool(pool.clone()))
        .and_then(put_avatar);

    let delete_avatar = warp::path!("users" / "me" / "avatar")
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(delete_avatar);

    let detail = warp::path!("users" / Uuid)
        .and(warp::get())
        .and(with_possible_session())
        .and(with_pool(pool.clone()))
        .and_then(detail);

    let subscribe = warp::path!("users" / Uuid / "subscribe")
        .and(warp::post())
        .and(with_session())
        .and(warp::query::<PageQuery>())
        .and(with_pool(pool.clone()))
        .and_then(subscribe);

    let unsubscribe = warp::path!("users" / Uuid / "subscribe")
        .and(warp::delete())
        .and(with_session())
        .and(with_pool(pool.clone()))
        .and_then(unsubscribe);

    let login = warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(json_body::<LoginPayload>())
        .and(with_pool(pool))
        .and_then(login);

    let logout = warp::path!("auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session())
        .and_then(logout);

    list.or(register)
        .or(me)
        .or(subscriptions)
        .or(put_avatar)
        .or(delete_avatar)
        .or(subscribe)
        .or(unsubscribe)
        .or(detail)
        .or(login)
        .or(logout)
}

async fn list_users(
    session: Option<SessionData>,
    query: PageQuery,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.map(|s| s.user_id);
    let page = users::fetch_users(viewer, query.page(), query.limit(), &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::json(&page))
}

async fn register(
    payload: RegisterPayload,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let user = users::register_user(&payload, &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&UserProfile::from_user(&user, false)),
        StatusCode::CREATED,
    ))
}

async fn me(session: SessionData, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let profile = users::get_profile(session.user_id, None, &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::json(&profile))
}

async fn detail(
    id: Uuid,
    session: Option<SessionData>,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let viewer = session.map(|s| s.user_id);
    let profile = users::get_profile(id, viewer, &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::json(&profile))
}

async fn put_avatar(
    session: SessionData,
    payload: AvatarPayload,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::ManageOwnProfile)
        .map_err(ApiError::reject)?;
    let data = payload
        .avatar
        .ok_or_else(|| ApiError::validation("avatar", "This field is required").reject())?;

    let url = users::set_avatar(session.user_id, &data, &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::json(&json!({ "avatar": url })))
}

async fn delete_avatar(
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::ManageOwnProfile)
        .map_err(ApiError::reject)?;
    users::clear_avatar(session.user_id, &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

async fn subscribe(
    author_id: Uuid,
    session: SessionData,
    query: PageQuery,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::ManageOwnSubscriptions)
        .map_err(ApiError::reject)?;
    let profile = follows::subscribe(session.user_id, author_id, query.recipes_limit, &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&profile),
        StatusCode::CREATED,
    ))
}

async fn unsubscribe(
    author_id: Uuid,
    session: SessionData,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    session
        .authenticate(ActionType::ManageOwnSubscriptions)
        .map_err(ApiError::reject)?;
    follows::unsubscribe(session.user_id, author_id, &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}

async fn subscriptions(
    session: SessionData,
    query: PageQuery,
    pool: Pool<Postgres>,
) -> Result<impl Reply, Rejection> {
    let page = follows::fetch_subscriptions(
        session.user_id,
        query.page(),
        query.limit(),
        query.recipes_limit,
        &pool,
    )
    .await
    .map_err(ApiError::reject)?;

    Ok(warp::reply::json(&page))
}

async fn login(payload: LoginPayload, pool: Pool<Postgres>) -> Result<impl Reply, Rejection> {
    let token = users::login_user(&payload.email, &payload.password, &pool)
        .await
        .map_err(ApiError::reject)?;

    Ok(warp::reply::json(&json!({ "auth_token": token })))
}

async fn logout(_session: SessionData) -> Result<impl Reply, Rejection> {
    // Tokens are stateless; logout is the client discarding its token.
    Ok(warp::reply::with_status(
        warp::reply(),
        StatusCode::NO_CONTENT,
    ))
}
