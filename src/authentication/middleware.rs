use warp::{reject::Rejection, Filter};

use crate::error::ApiError;

use super::jwt::{verify_jwt_session, SessionData};

/// Pulls the raw session token from the `authorization` header
/// (`Bearer`/`Token` schemes) or the `session` cookie.
pub fn bearer_token(header: Option<&str>, cookie: Option<String>) -> Option<String> {
    match header {
        Some(value) => {
            let value = value.trim();
            let token = value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("Token "))
                .unwrap_or(value);
            Some(token.to_string())
        }
        None => cookie,
    }
}

fn with_token() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Copy {
    warp::header::optional::<String>("authorization")
        .and(warp::cookie::optional::<String>("session"))
        .map(|header: Option<String>, cookie: Option<String>| {
            bearer_token(header.as_deref(), cookie)
        })
}

pub fn with_session() -> impl Filter<Extract = (SessionData,), Error = Rejection> + Copy {
    with_token().and_then(|token: Option<String>| async move {
        match token {
            Some(token) => verify_jwt_session(&token)
                .map(SessionData::from)
                .map_err(ApiError::reject),
            None => Err(ApiError::Unauthorized(
                "Authentication credentials were not provided".to_string(),
            )
            .reject()),
        }
    })
}

pub fn with_possible_session(
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Copy {
    with_token().map(|token: Option<String>| {
        token
            .and_then(|token| verify_jwt_session(&token).ok())
            .map(SessionData::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_schemes_are_stripped() {
        assert_eq!(bearer_token(Some("Bearer abc"), None).as_deref(), Some("abc"));
        assert_eq!(bearer_token(Some("Token abc"), None).as_deref(), Some("abc"));
        assert_eq!(bearer_token(Some("abc"), None).as_deref(), Some("abc"));
    }

    #[test]
    fn cookie_is_a_fallback() {
        assert_eq!(
            bearer_token(None, Some("xyz".to_string())).as_deref(),
            Some("xyz")
        );
        assert_eq!(
            bearer_token(Some("Bearer abc"), Some("xyz".to_string())).as_deref(),
            Some("abc")
        );
        assert_eq!(bearer_token(None, None), None);
    }
}
