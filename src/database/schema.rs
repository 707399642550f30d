use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    MAX_LEN_EMAIL, MAX_LEN_NAME_RECIPE, MAX_LEN_USERNAME, RESERVED_USERNAMES,
};
use crate::error::ApiError;
use crate::media::media_url;

pub type Uuid = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub avatar: Option<String>,
    pub role: UserRole,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub avatar: Option<String>,
    pub role: UserRole,

    pub count: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            password: row.password,
            avatar: row.avatar,
            role: row.role,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub short_code: Option<String>,
    pub pub_date: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
    pub short_code: Option<String>,
    pub pub_date: DateTime<Utc>,

    pub count: i64,
}

impl From<RecipeRow> for Recipe {
    fn from(row: RecipeRow) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            name: row.name,
            text: row.text,
            image: row.image,
            cooking_time: row.cooking_time,
            short_code: row.short_code,
            pub_date: row.pub_date,
        }
    }
}

/// One ingredient entry of a recipe, joined with the ingredient row.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeIngredientRow {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct CartIngredientRow {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/* wire representations */

#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub is_subscribed: bool,
}

impl UserProfile {
    pub fn from_user(user: &User, is_subscribed: bool) -> Self {
        Self {
            id: user.id,
            email: user.email.to_owned(),
            username: user.username.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            avatar: media_url(user.avatar.as_deref()),
            is_subscribed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeShort {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i32,
}

impl RecipeShort {
    pub fn from_recipe(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.to_owned(),
            image: media_url(Some(&recipe.image)),
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeFull {
    pub id: Uuid,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipeIngredientRow>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct FollowProfile {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: i64,
}

/* request payloads */

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterPayload {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl RegisterPayload {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.email.is_empty() || self.email.len() > MAX_LEN_EMAIL {
            return Err(ApiError::validation("email", "Invalid email"));
        }
        match self.email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(ApiError::validation("email", "Invalid email")),
        }
        validate_username(&self.username)?;
        if self.first_name.is_empty() {
            return Err(ApiError::validation("first_name", "This field is required"));
        }
        if self.last_name.is_empty() {
            return Err(ApiError::validation("last_name", "This field is required"));
        }
        if self.password.is_empty() {
            return Err(ApiError::validation("password", "This field is required"));
        }
        Ok(())
    }
}

pub fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() || username.len() > MAX_LEN_USERNAME {
        return Err(ApiError::validation("username", "Invalid username"));
    }
    if RESERVED_USERNAMES.contains(&username) {
        return Err(ApiError::validation(
            "username",
            "This username is reserved",
        ));
    }
    let valid = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'));
    if !valid {
        return Err(ApiError::validation(
            "username",
            "Username may only contain letters, digits and _.@+-",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvatarPayload {
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientAmountPayload {
    pub id: Uuid,
    pub amount: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipePayload {
    pub ingredients: Vec<IngredientAmountPayload>,
    pub tags: Vec<Uuid>,
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
}

impl RecipePayload {
    /// All checks run before any write. `image_required` is true on create;
    /// updates keep the stored image when the field is absent.
    pub fn validate(&self, image_required: bool) -> Result<(), ApiError> {
        if self.name.is_empty() || self.name.len() > MAX_LEN_NAME_RECIPE {
            return Err(ApiError::validation("name", "Invalid recipe name"));
        }
        if self.text.is_empty() {
            return Err(ApiError::validation("text", "This field is required"));
        }
        if self.cooking_time < 1 {
            return Err(ApiError::validation(
                "cooking_time",
                "Cooking time must be at least one minute",
            ));
        }
        if image_required && self.image.is_none() {
            return Err(ApiError::validation("image", "This field is required"));
        }
        if self.ingredients.is_empty() {
            return Err(ApiError::validation(
                "ingredients",
                "At least one ingredient is required",
            ));
        }
        let distinct: HashSet<Uuid> = self.ingredients.iter().map(|i| i.id).collect();
        if distinct.len() != self.ingredients.len() {
            return Err(ApiError::validation(
                "ingredients",
                "Ingredients must be unique",
            ));
        }
        if self.ingredients.iter().any(|i| i.amount < 1) {
            return Err(ApiError::validation(
                "ingredients",
                "Amount must be greater than zero",
            ));
        }
        let distinct_tags: HashSet<Uuid> = self.tags.iter().copied().collect();
        if distinct_tags.len() != self.tags.len() {
            return Err(ApiError::validation("tags", "Tags must not repeat"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> RecipePayload {
        RecipePayload {
            ingredients: vec![
                IngredientAmountPayload { id: 1, amount: 5 },
                IngredientAmountPayload { id: 2, amount: 3 },
            ],
            tags: vec![1, 2],
            image: Some("data:image/png;base64,aGVsbG8=".to_string()),
            name: "Borscht".to_string(),
            text: "Chop and simmer".to_string(),
            cooking_time: 45,
        }
    }

    #[test]
    fn valid_payload_passes() {
        assert!(payload().validate(true).is_ok());
    }

    #[test]
    fn repeated_ingredient_is_rejected() {
        let mut p = payload();
        p.ingredients.push(IngredientAmountPayload { id: 1, amount: 2 });
        let err = p.validate(true).unwrap_err();
        assert_eq!(err.field(), Some("ingredients"));
    }

    #[test]
    fn empty_ingredient_list_is_rejected() {
        let mut p = payload();
        p.ingredients.clear();
        assert!(p.validate(true).is_err());
    }

    #[test]
    fn zero_amount_is_rejected() {
        let mut p = payload();
        p.ingredients[0].amount = 0;
        assert!(p.validate(true).is_err());
    }

    #[test]
    fn repeated_tag_is_rejected() {
        let mut p = payload();
        p.tags = vec![3, 3];
        let err = p.validate(true).unwrap_err();
        assert_eq!(err.field(), Some("tags"));
    }

    #[test]
    fn missing_image_only_matters_on_create() {
        let mut p = payload();
        p.image = None;
        assert!(p.validate(true).is_err());
        assert!(p.validate(false).is_ok());
    }

    #[test]
    fn zero_cooking_time_is_rejected() {
        let mut p = payload();
        p.cooking_time = 0;
        let err = p.validate(true).unwrap_err();
        assert_eq!(err.field(), Some("cooking_time"));
    }

    #[test]
    fn reserved_username_is_rejected() {
        assert!(validate_username("me").is_err());
        assert!(validate_username("me2").is_ok());
    }

    #[test]
    fn username_charset() {
        assert!(validate_username("user.name+tag@host-1").is_ok());
        assert!(validate_username("user name").is_err());
        assert!(validate_username("").is_err());
    }
}
