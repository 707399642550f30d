use sqlx::{Pool, Postgres};

use crate::{
    error::{ApiError, QueryError},
    schema::{Ingredient, Uuid},
};

/// Case-insensitive containment search. Matches come back name-ordered from
/// the database and are re-ranked so prefix matches precede mere
/// containment, keeping the relative order inside each rank.
pub async fn search_ingredients(
    name: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, ApiError> {
    let rows: Vec<Ingredient> = match name {
        Some(name) if !name.is_empty() => {
            let pattern = format!("%{}%", escape_like(name));
            let rows: Vec<Ingredient> =
                sqlx::query_as("SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY name")
                    .bind(pattern)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| QueryError::from(e).into())?;

            rank_prefix_first(rows, name)
        }
        _ => sqlx::query_as("SELECT * FROM ingredients ORDER BY name")
            .fetch_all(pool)
            .await
            .map_err(|e| QueryError::from(e).into())?,
    };

    Ok(rows)
}

pub async fn get_ingredient(
    id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<Ingredient>, ApiError> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

fn escape_like(value: &str) -> String {
    value.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Stable partition: names starting with the query first, then the rest.
pub fn rank_prefix_first(rows: Vec<Ingredient>, query: &str) -> Vec<Ingredient> {
    let query = query.to_lowercase();
    let (mut prefixed, containing): (Vec<_>, Vec<_>) = rows
        .into_iter()
        .partition(|row| row.name.to_lowercase().starts_with(&query));

    prefixed.extend(containing);
    prefixed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingredient(id: Uuid, name: &str) -> Ingredient {
        Ingredient {
            id,
            name: name.to_string(),
            measurement_unit: "g".to_string(),
        }
    }

    #[test]
    fn prefix_matches_come_first() {
        let rows = vec![
            ingredient(1, "sea salt"),
            ingredient(2, "salted butter"),
            ingredient(3, "salt"),
        ];
        let ranked = rank_prefix_first(rows, "salt");
        let ids: Vec<Uuid> = ranked.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn ranking_is_case_insensitive_for_cyrillic() {
        let rows = vec![
            ingredient(1, "сливки ванильные"),
            ingredient(2, "Ваниль"),
            ingredient(3, "ванилин"),
        ];
        let ranked = rank_prefix_first(rows, "Ва");
        let ids: Vec<Uuid> = ranked.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn relative_order_is_preserved_inside_ranks() {
        let rows = vec![
            ingredient(1, "salt"),
            ingredient(2, "salt flakes"),
            ingredient(3, "rock salt"),
            ingredient(4, "sea salt"),
        ];
        let ranked = rank_prefix_first(rows, "salt");
        let ids: Vec<Uuid> = ranked.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }
}
