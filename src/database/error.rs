use std::fmt::{self, Display};

use serde_json::json;
use warp::http::StatusCode;
use warp::reject::{Reject, Rejection};
use warp::reply::{Json, Reply, WithStatus};

pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(format!("{e}")),
            sqlx::Error::RowNotFound => Self::new(format!("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("{e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::AnyDriverError(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(format!("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(format!("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(format!("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(format!("Unknown error")),
        }
    }
}

impl Into<ApiError> for QueryError {
    fn into(self) -> ApiError {
        ApiError::Internal(self.info)
    }
}

/// User-facing error taxonomy. Every failure leaving an action function is
/// one of these; the HTTP layer recovers them into structured JSON.
#[derive(Debug, Clone)]
pub enum ApiError {
    Validation { field: String, info: String },
    Conflict(String),
    NotFound(String),
    PermissionDenied(String),
    Unauthorized(String),
    Internal(String),
}

impl ApiError {
    pub fn validation(field: &str, info: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            info: info.to_string(),
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_reply(&self) -> WithStatus<Json> {
        let body = match self {
            Self::Validation { field, info } => {
                let mut map = serde_json::Map::new();
                map.insert(
                    field.to_owned(),
                    serde_json::Value::String(info.to_owned()),
                );
                serde_json::Value::Object(map)
            }
            Self::Conflict(info)
            | Self::NotFound(info)
            | Self::PermissionDenied(info)
            | Self::Unauthorized(info) => json!({ "detail": info }),
            Self::Internal(_) => json!({ "detail": "Internal server error" }),
        };
        warp::reply::with_status(warp::reply::json(&body), self.status())
    }

    pub fn reject(self) -> Rejection {
        if let Self::Internal(info) = &self {
            log::error!("{info}");
        }
        warp::reject::custom(self)
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { field, info } => write!(f, "{field}: {info}"),
            Self::Conflict(info)
            | Self::NotFound(info)
            | Self::PermissionDenied(info)
            | Self::Unauthorized(info)
            | Self::Internal(info) => write!(f, "{info}"),
        }
    }
}

impl std::error::Error for ApiError {}
impl Reject for ApiError {}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(e) = err.find::<ApiError>() {
        return Ok(e.to_reply());
    }
    if err.is_not_found() {
        return Ok(ApiError::NotFound("Not found".to_string()).to_reply());
    }
    if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        return Ok(
            ApiError::validation("non_field_errors", "Malformed request body").to_reply(),
        );
    }
    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        let body = json!({ "detail": "Method not allowed" });
        return Ok(warp::reply::with_status(
            warp::reply::json(&body),
            StatusCode::METHOD_NOT_ALLOWED,
        ));
    }
    if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        let body = json!({ "detail": "Payload too large" });
        return Ok(warp::reply::with_status(
            warp::reply::json(&body),
            StatusCode::PAYLOAD_TOO_LARGE,
        ));
    }

    log::error!("Unhandled rejection: {err:?}");
    Ok(ApiError::Internal(format!("{err:?}")).to_reply())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            ApiError::validation("name", "required").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Conflict("exists".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("missing".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::PermissionDenied("no".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::Unauthorized("no".into()).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn validation_errors_are_field_tagged() {
        let err = ApiError::validation("ingredients", "must be unique");
        assert_eq!(err.field(), Some("ingredients"));
        assert_eq!(ApiError::Conflict("x".into()).field(), None);
    }
}
