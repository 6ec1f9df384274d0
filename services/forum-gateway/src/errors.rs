use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use economy_core::ErrorKind;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Economy(#[from] economy_core::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("NATS error: {0}")]
    Nats(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for GatewayError {
    fn from(err: validator::ValidationErrors) -> Self {
        GatewayError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Internal(format!("JSON serialization error: {}", err))
    }
}

impl ResponseError for GatewayError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        // Store failures are logged in full but never echoed to clients
        let error_message = if status_code.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": error_message,
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Economy(err) => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Precondition => StatusCode::CONFLICT,
                ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
            },
            GatewayError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Nats(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl GatewayError {
    pub fn error_type(&self) -> &str {
        match self {
            GatewayError::Economy(err) => err.code(),
            GatewayError::Database(_) => "database_error",
            GatewayError::Nats(_) => "messaging_error",
            GatewayError::Validation(_) => "validation_error",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::Unauthorized => "unauthorized",
            GatewayError::Internal(_) => "internal_error",
        }
    }
}
