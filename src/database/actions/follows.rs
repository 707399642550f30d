use sqlx::{Pool, Postgres};

use crate::{
    error::{ApiError, QueryError},
    pagination::{page_offset, PageContext},
    schema::{FollowProfile, Recipe, RecipeShort, User, UserProfile, UserRow, Uuid},
};

use super::users;

pub fn ensure_not_self(user_id: Uuid, author_id: Uuid) -> Result<(), ApiError> {
    if user_id == author_id {
        return Err(ApiError::validation(
            "author",
            "You cannot subscribe to yourself",
        ));
    }
    Ok(())
}

/// The followed author's profile augmented with their recipes (optionally
/// truncated) and the total recipe count.
pub async fn follow_profile(
    author: &User,
    is_subscribed: bool,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<FollowProfile, ApiError> {
    let recipes: Vec<Recipe> = match recipes_limit {
        Some(limit) => sqlx::query_as(
            "SELECT * FROM recipes WHERE author_id = $1 ORDER BY pub_date DESC, id DESC LIMIT $2",
        )
        .bind(author.id)
        .bind(limit.max(0))
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?,
        None => sqlx::query_as(
            "SELECT * FROM recipes WHERE author_id = $1 ORDER BY pub_date DESC, id DESC",
        )
        .bind(author.id)
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?,
    };

    let (recipes_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
            .bind(author.id)
            .fetch_one(pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    Ok(FollowProfile {
        profile: UserProfile::from_user(author, is_subscribed),
        recipes: recipes.iter().map(RecipeShort::from_recipe).collect(),
        recipes_count,
    })
}

pub async fn subscribe(
    user_id: Uuid,
    author_id: Uuid,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<FollowProfile, ApiError> {
    let author = users::get_user_by_id(pool, author_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No user exists with specified id".to_string()))?;
    ensure_not_self(user_id, author_id)?;

    let result = sqlx::query(
        "INSERT INTO follows (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::Conflict(
            "You are already subscribed to this user".to_string(),
        ));
    }

    follow_profile(&author, true, recipes_limit, pool).await
}

pub async fn unsubscribe(
    user_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(
            "You are not subscribed to this user".to_string(),
        ));
    }

    Ok(())
}

pub async fn fetch_subscriptions(
    user_id: Uuid,
    page: i64,
    limit: i64,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<FollowProfile>, ApiError> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.*, COUNT(*) OVER() AS count
        FROM follows f
        INNER JOIN users u ON u.id = f.author_id
        WHERE f.user_id = $1
        ORDER BY u.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(limit)
    .bind(page_offset(page, limit))
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);

    let mut profiles = Vec::with_capacity(rows.len());
    for row in rows {
        let author = User::from(row);
        profiles.push(follow_profile(&author, true, recipes_limit, pool).await?);
    }

    Ok(PageContext::from_rows(profiles, total_count, limit, page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_follow_is_always_rejected() {
        let err = ensure_not_self(4, 4).unwrap_err();
        assert_eq!(err.field(), Some("author"));
        assert!(ensure_not_self(4, 5).is_ok());
    }
}
