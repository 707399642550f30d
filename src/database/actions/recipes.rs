use rand::{distributions::Alphanumeric, Rng};
use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    authentication::permissions::ActionType,
    constants::{SHORT_CODE_LEN, SHORT_LINK_PREFIX},
    error::{ApiError, QueryError},
    jwt::SessionData,
    media,
    pagination::{page_offset, PageContext},
    schema::{
        IngredientAmountPayload, Recipe, RecipeFull, RecipeIngredientRow, RecipePayload,
        RecipeRow, RecipeShort, Tag, Uuid,
    },
};

use super::users;

/// Explicit filter object for the recipe collection. Predicates compose
/// conjunctively; the tag list is disjunctive inside its own predicate.
#[derive(Debug, Default, Clone)]
pub struct RecipeFilter {
    pub author: Option<Uuid>,
    pub tags: Vec<String>,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
}

impl RecipeFilter {
    /// True when a membership flag is requested that only makes sense for an
    /// authenticated viewer. Anonymous callers asking for it get an empty
    /// page; a `false` flag from an anonymous caller is ignored.
    pub fn requires_viewer(&self) -> bool {
        self.is_favorited == Some(true) || self.is_in_shopping_cart == Some(true)
    }

    fn build_query(
        &self,
        viewer: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> QueryBuilder<'static, Postgres> {
        let mut query: QueryBuilder<'static, Postgres> =
            QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

        if let Some(author) = self.author {
            query.push(" AND r.author_id = ");
            query.push_bind(author);
        }
        if !self.tags.is_empty() {
            // EXISTS collapses multi-tag matches to one row per recipe
            query.push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            );
            query.push_bind(self.tags.clone());
            query.push("))");
        }
        if let Some(viewer) = viewer {
            if self.is_favorited == Some(true) {
                query.push(
                    " AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ",
                );
                query.push_bind(viewer);
                query.push(")");
            }
            if self.is_in_shopping_cart == Some(true) {
                query.push(
                    " AND EXISTS (SELECT 1 FROM shopping_cart sc WHERE sc.recipe_id = r.id AND sc.user_id = ",
                );
                query.push_bind(viewer);
                query.push(")");
            }
        }

        query.push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);

        query
    }
}

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<Uuid>,
    page: i64,
    limit: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeFull>, ApiError> {
    if viewer.is_none() && filter.requires_viewer() {
        return Ok(PageContext::no_rows());
    }

    let mut query = filter.build_query(viewer, limit, page_offset(page, limit));
    let rows: Vec<RecipeRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);

    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        results.push(build_recipe_full(Recipe::from(row), viewer, pool).await?);
    }

    Ok(PageContext::from_rows(results, total_count, limit, page))
}

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, ApiError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Fetches a recipe for mutation. Authors may change their own recipes,
/// admins anyone's; everyone else gets a permission error.
pub async fn get_recipe_mut(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ApiError> {
    let recipe = get_recipe(id, pool).await?;
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match recipe {
        Some(recipe) => match session.authenticate(ActionType::ManageAllRecipes) {
            Ok(_) => Ok(recipe),
            Err(_) => {
                if recipe.author_id != session.user_id {
                    Err(ApiError::PermissionDenied(
                        "Only the author can modify this recipe".to_string(),
                    ))
                } else {
                    Ok(recipe)
                }
            }
        },
        None => Err(ApiError::NotFound(
            "No recipe exists with specified id".to_string(),
        )),
    }
}

pub async fn list_recipe_ingredients(
    pool: &Pool<Postgres>,
    recipe_id: Uuid,
) -> Result<Vec<RecipeIngredientRow>, ApiError> {
    let rows: Vec<RecipeIngredientRow> = sqlx::query_as(
        "
        SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY i.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

pub async fn list_recipe_tags(
    pool: &Pool<Postgres>,
    recipe_id: Uuid,
) -> Result<Vec<Tag>, ApiError> {
    let rows: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.* FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

pub async fn is_favorite(
    id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let result: Option<(Uuid,)> = sqlx::query_as(
        "
        SELECT recipe_id FROM favorites WHERE recipe_id = $1 AND user_id = $2
    ",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(result.is_some())
}

pub async fn in_shopping_cart(
    id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, ApiError> {
    let result: Option<(Uuid,)> = sqlx::query_as(
        "
        SELECT recipe_id FROM shopping_cart WHERE recipe_id = $1 AND user_id = $2
    ",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(result.is_some())
}

pub async fn build_recipe_full(
    recipe: Recipe,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<RecipeFull, ApiError> {
    let tags = list_recipe_tags(pool, recipe.id).await?;
    let ingredients = list_recipe_ingredients(pool, recipe.id).await?;
    let author = users::get_profile(recipe.author_id, viewer, pool).await?;

    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(viewer) => (
            is_favorite(recipe.id, viewer, pool).await?,
            in_shopping_cart(recipe.id, viewer, pool).await?,
        ),
        None => (false, false),
    };

    Ok(RecipeFull {
        id: recipe.id,
        tags,
        author,
        ingredients,
        is_favorited,
        is_in_shopping_cart,
        name: recipe.name,
        image: media::media_url(Some(&recipe.image)),
        text: recipe.text,
        cooking_time: recipe.cooking_time,
    })
}

async fn ensure_ingredients_exist(
    ingredients: &[IngredientAmountPayload],
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let ids: Vec<Uuid> = ingredients.iter().map(|i| i.id).collect();
    let found: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(ids.clone())
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if found.len() != ids.len() {
        return Err(ApiError::validation(
            "ingredients",
            "Unknown ingredient reference",
        ));
    }
    Ok(())
}

async fn ensure_tags_exist(tags: &[Uuid], pool: &Pool<Postgres>) -> Result<(), ApiError> {
    if tags.is_empty() {
        return Ok(());
    }
    let found: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(tags.to_vec())
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if found.len() != tags.len() {
        return Err(ApiError::validation("tags", "Unknown tag reference"));
    }
    Ok(())
}

async fn insert_recipe_ingredients(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    ingredients: &[IngredientAmountPayload],
) -> Result<(), ApiError> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    query.push_values(ingredients, |mut row, ingredient| {
        row.push_bind(recipe_id)
            .push_bind(ingredient.id)
            .push_bind(ingredient.amount);
    });
    query
        .build()
        .execute(&mut **tx)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

async fn insert_recipe_tags(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    tags: &[Uuid],
) -> Result<(), ApiError> {
    if tags.is_empty() {
        return Ok(());
    }
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    query.push_values(tags, |mut row, tag_id| {
        row.push_bind(recipe_id).push_bind(*tag_id);
    });
    query
        .build()
        .execute(&mut **tx)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

/// Validates the whole payload before any write, then inserts the recipe
/// row, its ingredient rows and its tag set in one transaction.
pub async fn create_recipe(
    payload: &RecipePayload,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ApiError> {
    payload.validate(true)?;
    ensure_ingredients_exist(&payload.ingredients, pool).await?;
    ensure_tags_exist(&payload.tags, pool).await?;

    let data = payload
        .image
        .as_deref()
        .ok_or_else(|| ApiError::validation("image", "This field is required"))?;
    let image = media::store_image("recipes", data).await?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    let recipe: Recipe = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(author_id)
    .bind(&payload.name)
    .bind(&payload.text)
    .bind(&image)
    .bind(payload.cooking_time)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    insert_recipe_ingredients(&mut tx, recipe.id, &payload.ingredients).await?;
    insert_recipe_tags(&mut tx, recipe.id, &payload.tags).await?;

    tx.commit()
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(recipe)
}

/// Full replacement update: the old ingredient rows and tag set are deleted
/// and the new ones inserted along with the scalar changes, atomically.
pub async fn update_recipe(
    id: Uuid,
    payload: &RecipePayload,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, ApiError> {
    let previous = get_recipe_mut(id, session, pool).await?;
    payload.validate(false)?;
    ensure_ingredients_exist(&payload.ingredients, pool).await?;
    ensure_tags_exist(&payload.tags, pool).await?;

    let image = match payload.image.as_deref() {
        Some(data) => media::store_image("recipes", data).await?,
        None => previous.image.to_owned(),
    };

    let mut tx = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()).into())?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| QueryError::from(e).into())?;
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    insert_recipe_ingredients(&mut tx, id, &payload.ingredients).await?;
    insert_recipe_tags(&mut tx, id, &payload.tags).await?;

    let recipe: Recipe = sqlx::query_as(
        "
        UPDATE recipes SET name = $1, text = $2, image = $3, cooking_time = $4
        WHERE id = $5
        RETURNING *
    ",
    )
    .bind(&payload.name)
    .bind(&payload.text)
    .bind(&image)
    .bind(payload.cooking_time)
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    tx.commit()
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if payload.image.is_some() && previous.image != recipe.image {
        media::remove_media(&previous.image).await;
    }

    Ok(recipe)
}

pub async fn delete_recipe(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let recipe = get_recipe_mut(id, session, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    media::remove_media(&recipe.image).await;

    Ok(())
}

/* favorites and shopping cart membership */

pub async fn add_to_favorites(
    id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, ApiError> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("No recipe exists with specified id".to_string()))?;

    let result = sqlx::query(
        "INSERT INTO favorites (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::Conflict(
            "Recipe is already in favorites".to_string(),
        ));
    }

    Ok(RecipeShort::from_recipe(&recipe))
}

pub async fn remove_from_favorites(
    id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(
            "Recipe is not in favorites".to_string(),
        ));
    }

    Ok(())
}

pub async fn add_to_shopping_cart(
    id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, ApiError> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("No recipe exists with specified id".to_string()))?;

    let result = sqlx::query(
        "INSERT INTO shopping_cart (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::Conflict(
            "Recipe is already in shopping cart".to_string(),
        ));
    }

    Ok(RecipeShort::from_recipe(&recipe))
}

pub async fn remove_from_shopping_cart(
    id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM shopping_cart WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(
            "Recipe is not in shopping cart".to_string(),
        ));
    }

    Ok(())
}

/* short links */

pub fn generate_short_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHORT_CODE_LEN)
        .map(char::from)
        .collect()
}

/// Returns the short link for a recipe, allocating and persisting a code on
/// first request. The unique constraint arbitrates concurrent allocations.
pub async fn get_or_create_short_link(
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<String, ApiError> {
    let recipe = get_recipe(recipe_id, pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("No recipe exists with specified id".to_string()))?;

    if let Some(code) = recipe.short_code {
        return Ok(format!("{SHORT_LINK_PREFIX}{code}"));
    }

    for _ in 0..3 {
        let code = generate_short_code();
        let result =
            sqlx::query("UPDATE recipes SET short_code = $1 WHERE id = $2 AND short_code IS NULL")
                .bind(&code)
                .bind(recipe_id)
                .execute(pool)
                .await;

        match result {
            Ok(r) if r.rows_affected() > 0 => return Ok(format!("{SHORT_LINK_PREFIX}{code}")),
            Ok(_) => {
                // a concurrent request allocated first, reuse its code
                let row: Option<(String,)> = sqlx::query_as(
                    "SELECT short_code FROM recipes WHERE id = $1 AND short_code IS NOT NULL",
                )
                .bind(recipe_id)
                .fetch_optional(pool)
                .await
                .map_err(|e| QueryError::from(e).into())?;
                if let Some((code,)) = row {
                    return Ok(format!("{SHORT_LINK_PREFIX}{code}"));
                }
            }
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23505") => continue,
            Err(e) => return Err(QueryError::from(e).into()),
        }
    }

    Err(ApiError::Internal(
        "Failed to allocate a short code".to_string(),
    ))
}

pub async fn resolve_short_link(code: &str, pool: &Pool<Postgres>) -> Result<Recipe, ApiError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE short_code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    row.ok_or_else(|| ApiError::NotFound("Unknown short link".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_flags_require_a_viewer() {
        let mut filter = RecipeFilter::default();
        assert!(!filter.requires_viewer());

        filter.is_favorited = Some(true);
        assert!(filter.requires_viewer());

        filter.is_favorited = Some(false);
        filter.is_in_shopping_cart = Some(false);
        assert!(!filter.requires_viewer());

        filter.is_in_shopping_cart = Some(true);
        assert!(filter.requires_viewer());
    }

    #[test]
    fn filter_predicates_compose() {
        let filter = RecipeFilter {
            author: Some(3),
            tags: vec!["breakfast".to_string(), "vegan".to_string()],
            is_favorited: Some(true),
            is_in_shopping_cart: None,
        };
        let mut query = filter.build_query(Some(9), 6, 0);
        let sql = query.sql();
        assert!(sql.contains("r.author_id ="));
        assert!(sql.contains("t.slug = ANY("));
        assert!(sql.contains("FROM favorites f"));
        assert!(!sql.contains("FROM shopping_cart"));
        assert!(sql.contains("ORDER BY r.pub_date DESC"));
    }

    #[test]
    fn anonymous_flags_are_not_pushed_into_sql() {
        let filter = RecipeFilter {
            is_favorited: Some(false),
            ..Default::default()
        };
        let mut query = filter.build_query(None, 6, 0);
        assert!(!query.sql().contains("favorites"));
    }

    #[test]
    fn short_codes_are_alphanumeric() {
        let code = generate_short_code();
        assert_eq!(code.len(), SHORT_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_short_code(), generate_short_code());
    }
}
