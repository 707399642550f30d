use std::convert::Infallible;

use serde::Deserialize;
use sqlx::{Pool, Postgres};
use warp::{reject::Rejection, Filter};

use crate::actions::recipes::RecipeFilter;
use crate::constants::PAGE_SIZE;

pub fn with_pool(
    pool: Pool<Postgres>,
) -> impl Filter<Extract = (Pool<Postgres>,), Error = Infallible> + Clone {
    warp::any().map(move || pool.clone())
}

/// The raw query string, or "" when the request has none.
pub fn raw_query() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::query::raw().or_else(|_| async { Ok::<(String,), Rejection>((String::new(),)) })
}

pub fn query_pairs(raw: &str) -> Vec<(String, String)> {
    serde_urlencoded::from_str(raw).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub recipes_limit: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(PAGE_SIZE).max(1)
    }
}

#[derive(Debug, Deserialize)]
pub struct IngredientQuery {
    pub name: Option<String>,
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "True" => Some(true),
        "0" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Recipe collection parameters. `tags` repeats, so this parses the raw
/// pair list instead of going through a serde struct.
#[derive(Debug)]
pub struct RecipeListParams {
    pub page: i64,
    pub limit: i64,
    pub filter: RecipeFilter,
}

impl RecipeListParams {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut page = 1;
        let mut limit = PAGE_SIZE;
        let mut filter = RecipeFilter::default();

        for (key, value) in pairs {
            match key.as_str() {
                "page" => page = value.parse().unwrap_or(1),
                "limit" => limit = value.parse().unwrap_or(PAGE_SIZE),
                "author" => filter.author = value.parse().ok(),
                "tags" => filter.tags.push(value.to_owned()),
                "is_favorited" => filter.is_favorited = parse_flag(value),
                "is_in_shopping_cart" => filter.is_in_shopping_cart = parse_flag(value),
                _ => {}
            }
        }

        Self {
            page: page.max(1),
            limit: limit.max(1),
            filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &str) -> Vec<(String, String)> {
        query_pairs(raw)
    }

    #[test]
    fn defaults_apply() {
        let params = RecipeListParams::from_pairs(&pairs(""));
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, PAGE_SIZE);
        assert!(params.filter.author.is_none());
        assert!(params.filter.tags.is_empty());
    }

    #[test]
    fn repeated_tags_accumulate() {
        let params =
            RecipeListParams::from_pairs(&pairs("tags=breakfast&tags=vegan&author=3&page=2"));
        assert_eq!(params.filter.tags, vec!["breakfast", "vegan"]);
        assert_eq!(params.filter.author, Some(3));
        assert_eq!(params.page, 2);
    }

    #[test]
    fn membership_flags_parse_both_spellings() {
        let params = RecipeListParams::from_pairs(&pairs("is_favorited=1&is_in_shopping_cart=false"));
        assert_eq!(params.filter.is_favorited, Some(true));
        assert_eq!(params.filter.is_in_shopping_cart, Some(false));
    }

    #[test]
    fn unknown_params_are_ignored() {
        let params = RecipeListParams::from_pairs(&pairs("foo=bar&limit=12"));
        assert_eq!(params.limit, 12);
    }

    #[test]
    fn percent_encoded_values_are_decoded() {
        let decoded = pairs("name=%D0%92%D0%B0");
        assert_eq!(decoded[0].1, "Ва");
    }
}
