use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use residue_engine::OrderFlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Invalid query string: {0}")]
    InvalidQuery(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("{0}")]
    OrderFlowError(#[from] OrderFlowError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) | Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::BAD_REQUEST,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::ForbiddenPeer => StatusCode::FORBIDDEN,
            },
            Self::OrderFlowError(e) => order_flow_status(e),
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("💻️ {self}");
        }
        HttpResponse::build(status)
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

fn order_flow_status(e: &OrderFlowError) -> StatusCode {
    match e {
        OrderFlowError::ValidationError(_) => StatusCode::BAD_REQUEST,
        OrderFlowError::OrderNotFound(_) | OrderFlowError::DeliveryNotFound(_) | OrderFlowError::HubNotFound(_) => {
            StatusCode::NOT_FOUND
        },
        OrderFlowError::HubAlreadyExists(_) => StatusCode::CONFLICT,
        OrderFlowError::Forbidden(_) => StatusCode::FORBIDDEN,
        OrderFlowError::InvalidState(_) | OrderFlowError::PreconditionFailed(_) => StatusCode::CONFLICT,
        OrderFlowError::InvalidSignature => StatusCode::UNAUTHORIZED,
        OrderFlowError::OrderMismatch { .. } => StatusCode::BAD_REQUEST,
        OrderFlowError::AlreadyPaid(_) | OrderFlowError::AlreadyProcessed(_) => StatusCode::CONFLICT,
        OrderFlowError::GatewayError(_) => StatusCode::BAD_GATEWAY,
        OrderFlowError::ConcurrentModification(_) => StatusCode::CONFLICT,
        OrderFlowError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token was provided.")]
    MissingToken,
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Access token is invalid. {0}")]
    ValidationError(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Requests from this address are not accepted.")]
    ForbiddenPeer,
}
