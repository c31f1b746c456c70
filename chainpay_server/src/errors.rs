use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use chainpay_engine::{InventoryError, ReconciliationError, SignatureError};
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request conflicts with the current state. {0}")]
    Conflict(String),
    #[error("The request could not be completed in time. Please try again. {0}")]
    ServiceUnavailable(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<ReconciliationError> for ServerError {
    fn from(e: ReconciliationError) -> Self {
        match e {
            ReconciliationError::OrderNotFound(_) => Self::NoRecordFound(e.to_string()),
            ReconciliationError::Conflict(_) | ReconciliationError::InsufficientStock { .. } => {
                Self::Conflict(e.to_string())
            },
            ReconciliationError::ItemNotFound(_) |
            ReconciliationError::InvalidOrder(_) |
            ReconciliationError::UnsupportedAsset(_) |
            ReconciliationError::MalformedPayload(_) => Self::InvalidRequestBody(e.to_string()),
            ReconciliationError::Contention(_) => Self::ServiceUnavailable(e.to_string()),
            ReconciliationError::DatabaseError(s) => {
                error!("💻️ Storage failure: {s}");
                Self::BackendError("Storage is unavailable".into())
            },
        }
    }
}

impl From<InventoryError> for ServerError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::InvalidItem(_) => Self::InvalidRequestBody(e.to_string()),
            InventoryError::ItemNotFound(_) => Self::NoRecordFound(e.to_string()),
            InventoryError::InsufficientStock { .. } => Self::Conflict(e.to_string()),
            InventoryError::DatabaseError(s) => {
                error!("💻️ Storage failure: {s}");
                Self::BackendError("Storage is unavailable".into())
            },
        }
    }
}

impl From<SignatureError> for ServerError {
    fn from(e: SignatureError) -> Self {
        Self::AuthenticationError(e.to_string())
    }
}
