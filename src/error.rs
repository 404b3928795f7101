use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Fatal startup errors. The process must not serve traffic after any of
/// these; `main` reports the message and exits non-zero.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid URL for {field}: {value:?}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("API prefix must start with '/': {0:?}")]
    InvalidApiPrefix(String),

    #[error("DATABASE_URL is not configured")]
    MissingDatabaseUrl,

    #[error("unsupported JWT signing algorithm: {0:?}")]
    InvalidAlgorithm(String),
}

/// Request-scoped errors. `Database` is the persistence error surfaced out
/// of a unit of work; handlers never see a committed transaction alongside
/// one of these.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid credentials")]
    Unauthorized,

    #[error("insufficient permissions")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Database(_) => "database_error",
            ApiError::Validation(_) => "validation_error",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // 5xx details stay in the logs, not in the response body.
        let message = match self {
            ApiError::Database(e) => {
                tracing::error!(error = %e, "persistence failure");
                "internal server error".to_string()
            }
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "internal failure");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": self.code(),
            "message": message,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_errors_map_to_500_without_detail() {
        let err = ApiError::Database(sqlx::Error::PoolClosed);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn client_errors_keep_their_message() {
        let err = ApiError::Conflict("user already exists".to_string());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "user already exists");
    }

    #[test]
    fn configuration_errors_are_descriptive() {
        let err = ConfigurationError::InvalidUrl {
            field: "server.host",
            value: "nope".to_string(),
        };
        assert!(err.to_string().contains("server.host"));
        assert!(err.to_string().contains("nope"));
    }
}
