use sqlx::{Pool, Postgres};

use crate::{
    authentication::cryptography::{hash_password, verify_password},
    error::{ApiError, QueryError},
    jwt::generate_jwt_session,
    media,
    pagination::{page_offset, PageContext},
    schema::{RegisterPayload, User, UserProfile, UserRow, Uuid},
};

pub async fn get_user_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn get_user_by_id(
    pool: &Pool<Postgres>,
    user_id: Uuid,
) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Creates a user from a validated payload; the password is stored hashed.
/// Duplicate email/username surfaces as a field-tagged validation error,
/// with the unique constraints arbitrating concurrent registrations.
pub async fn register_user(
    payload: &RegisterPayload,
    pool: &Pool<Postgres>,
) -> Result<User, ApiError> {
    payload.validate()?;

    if get_user_by_email(pool, &payload.email).await?.is_some() {
        return Err(ApiError::validation("email", "Email is already taken"));
    }
    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE username = $1")
        .bind(&payload.username)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;
    if existing.is_some() {
        return Err(ApiError::validation("username", "Username is already taken"));
    }

    let password = hash_password(&payload.password)
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {e}")))?;

    let user: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(&payload.email)
    .bind(&payload.username)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(password)
    .fetch_optional(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    user.ok_or_else(|| ApiError::Conflict("User already exists".to_string()))
}

pub async fn login_user(
    email: &str,
    password: &str,
    pool: &Pool<Postgres>,
) -> Result<String, ApiError> {
    let user = get_user_by_email(pool, email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    let authenticated = verify_password(password, &user.password)
        .map_err(|e| ApiError::Internal(format!("Failed to verify password: {e}")))?;
    if !authenticated {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    Ok(generate_jwt_session(&user))
}

pub async fn is_subscribed(
    user_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let result: Option<(Uuid,)> = sqlx::query_as(
        "
        SELECT author_id FROM follows WHERE user_id = $1 AND author_id = $2
    ",
    )
    .bind(user_id)
    .bind(author_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(result.is_some())
}

pub async fn get_profile(
    user_id: Uuid,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<UserProfile, ApiError> {
    let user = get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user exists with specified id".to_string()))?;

    let subscribed = match viewer {
        Some(viewer) => is_subscribed(viewer, user.id, pool).await?,
        None => false,
    };

    Ok(UserProfile::from_user(&user, subscribed))
}

pub async fn fetch_users(
    viewer: Option<Uuid>,
    page: i64,
    limit: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<UserProfile>, ApiError> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "SELECT u.*, COUNT(*) OVER() AS count FROM users u ORDER BY u.id LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(page_offset(page, limit))
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);

    let mut profiles = Vec::with_capacity(rows.len());
    for row in rows {
        let user = User::from(row);
        let subscribed = match viewer {
            Some(viewer) => is_subscribed(viewer, user.id, pool).await?,
            None => false,
        };
        profiles.push(UserProfile::from_user(&user, subscribed));
    }

    Ok(PageContext::from_rows(profiles, total_count, limit, page))
}

/// Stores a new avatar from a base64 data URI and returns its public URL.
pub async fn set_avatar(
    user_id: Uuid,
    data: &str,
    pool: &Pool<Postgres>,
) -> Result<String, ApiError> {
    let previous = get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user exists with specified id".to_string()))?
        .avatar;

    let path = media::store_image("users", data).await?;

    sqlx::query("UPDATE users SET avatar = $1 WHERE id = $2")
        .bind(&path)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if let Some(previous) = previous {
        media::remove_media(&previous).await;
    }

    Ok(media::media_url(Some(&path)).unwrap_or_default())
}

pub async fn clear_avatar(user_id: Uuid, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    let user = get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user exists with specified id".to_string()))?;

    sqlx::query("UPDATE users SET avatar = NULL WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if let Some(avatar) = user.avatar {
        media::remove_media(&avatar).await;
    }

    Ok(())
}
