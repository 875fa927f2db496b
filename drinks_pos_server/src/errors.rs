use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use drinks_pos_engine::{CatalogApiError, ReaderApiError, ReconcileError, SettlementError, UserApiError};
use log::error;
use thiserror::Error;

const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred. Please try again later.";

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
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Conflict. {0}")]
    Conflict(String),
    #[error("Payment gateway error. {0}")]
    PaymentGatewayError(String),
    #[error("The card reader is not ready. {0}")]
    ReaderNotReady(String),
    #[error("The request was cancelled. {0}")]
    Cancelled(String),
}

impl ServerError {
    fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::ForbiddenPeer => StatusCode::FORBIDDEN,
                AuthError::InvalidSignature(_) => StatusCode::FORBIDDEN,
                AuthError::TokenCreationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
                AuthError::InvalidCredentials |
                AuthError::MissingSession |
                AuthError::ValidationError(_) |
                AuthError::AccountNotFound => StatusCode::UNAUTHORIZED,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentGatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::ReaderNotReady(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = if self.is_internal() {
            error!("💻️ {self}");
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": message }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Invalid username or password.")]
    InvalidCredentials,
    #[error("No session token was provided.")]
    MissingSession,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Session token is invalid. {0}")]
    ValidationError(String),
    #[error("Could not issue a session token. {0}")]
    TokenCreationError(String),
    #[error("User account not found.")]
    AccountNotFound,
    #[error("Requests from this address are not allowed.")]
    ForbiddenPeer,
    #[error("The request signature could not be verified. {0}")]
    InvalidSignature(String),
}

impl From<CatalogApiError> for ServerError {
    fn from(e: CatalogApiError) -> Self {
        match e {
            CatalogApiError::DatabaseError(s) => Self::BackendError(s),
            CatalogApiError::InvalidRequest(s) => Self::InvalidRequestBody(s),
            CatalogApiError::ItemNotFound(_) => Self::NoRecordFound(e.to_string()),
            CatalogApiError::DuplicateName(_) => Self::Conflict(e.to_string()),
        }
    }
}

impl From<UserApiError> for ServerError {
    fn from(e: UserApiError) -> Self {
        match e {
            UserApiError::DatabaseError(s) => Self::BackendError(s),
            UserApiError::PasswordHashError(s) => Self::BackendError(s),
            UserApiError::InvalidRequest(s) => Self::InvalidRequestBody(s),
            UserApiError::UserNotFound(_) => Self::NoRecordFound(e.to_string()),
            UserApiError::UserAlreadyExists(_) => Self::Conflict(e.to_string()),
            UserApiError::InvalidCredentials => Self::AuthenticationError(AuthError::InvalidCredentials),
            UserApiError::Forbidden(s) => Self::InsufficientPermissions(s),
        }
    }
}

impl From<SettlementError> for ServerError {
    fn from(e: SettlementError) -> Self {
        match e {
            SettlementError::DatabaseError(s) => Self::BackendError(s),
            SettlementError::InvalidRequest(s) => Self::InvalidRequestBody(s),
            SettlementError::Forbidden(s) => Self::InsufficientPermissions(s),
            SettlementError::Restricted(_) => Self::InsufficientPermissions(e.to_string()),
            SettlementError::UserNotFound(_) |
            SettlementError::ItemNotFound(_) |
            SettlementError::PurchaseNotFound(_) => Self::NoRecordFound(e.to_string()),
            SettlementError::PaymentGatewayError(s) => Self::PaymentGatewayError(s),
        }
    }
}

impl From<ReconcileError> for ServerError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::DatabaseError(s) => Self::BackendError(s),
            ReconcileError::StatusRegression { .. } => Self::Conflict(e.to_string()),
        }
    }
}

impl From<ReaderApiError> for ServerError {
    fn from(e: ReaderApiError) -> Self {
        match e {
            ReaderApiError::DatabaseError(s) => Self::BackendError(s),
            ReaderApiError::InvalidRequest(s) => Self::InvalidRequestBody(s),
            ReaderApiError::ReaderNotFound(_) => Self::NoRecordFound(e.to_string()),
            ReaderApiError::ReaderNotReady { .. } => Self::ReaderNotReady(e.to_string()),
            ReaderApiError::Cancelled(_) => Self::Cancelled(e.to_string()),
            ReaderApiError::PaymentGatewayError(s) => Self::PaymentGatewayError(s),
        }
    }
}
