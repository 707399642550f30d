use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::schema::{User, UserRole, Uuid};
use crate::error::ApiError;

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    pub user_role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Uuid, email: String, username: String, role: UserRole) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(24)).timestamp();

        Self {
            user_id: id,
            email,
            username,
            user_role: role,
            iat,
            exp,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    pub user_role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), ApiError> {
        if !action.authenticate(self) {
            return Err(ApiError::PermissionDenied(
                "You don't have permission to perform this action".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(data: JwtSessionData) -> Self {
        SessionData {
            user_id: data.user_id,
            email: data.email,
            username: data.username,
            is_admin: data.user_role == UserRole::Admin,
            user_role: data.user_role,
        }
    }
}

fn jwt_key() -> Hmac<Sha256> {
    let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| String::from("secret"));
    Hmac::new_from_slice(secret.as_bytes()).unwrap()
}

pub fn generate_jwt_session(user: &User) -> String {
    let claims = JwtSessionData::new(
        user.id,
        user.email.to_owned(),
        user.username.to_owned(),
        user.role.to_owned(),
    );

    claims.sign_with_key(&jwt_key()).unwrap()
}

pub fn verify_jwt_session(token: &str) -> Result<JwtSessionData, ApiError> {
    token
        .verify_with_key(&jwt_key())
        .map_err(|_| ApiError::Unauthorized("Invalid session token".to_string()))
        .map(|session: JwtSessionData| {
            let now = Local::now().timestamp();

            if (session.exp - now).is_negative() {
                return Err(ApiError::Unauthorized("Session token expired".to_string()));
            }
            Ok(session)
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            email: "cook@example.com".to_string(),
            username: "cook".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            password: String::new(),
            avatar: None,
            role: UserRole::User,
        }
    }

    #[test]
    fn sign_then_verify_roundtrip() {
        let token = generate_jwt_session(&user());
        let claims = verify_jwt_session(&token).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.email, "cook@example.com");
        assert_eq!(claims.user_role, UserRole::User);
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(verify_jwt_session("not-a-token").is_err());
    }

    #[test]
    fn session_data_carries_admin_flag() {
        let mut u = user();
        u.role = UserRole::Admin;
        let claims = verify_jwt_session(&generate_jwt_session(&u)).unwrap();
        let session: SessionData = claims.into();
        assert!(session.is_admin);
    }
}
