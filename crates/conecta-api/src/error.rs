use axum::{
    Json,
    extract::rejection::{BytesRejection, JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use conecta_db::RoleChangeError;
use conecta_types::api::ErrorBody;
use conecta_types::workflow::TransitionError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Every failure a handler can report. Rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Missing or invalid authorization token")]
    Unauthorized,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Upload exceeds the size limit")]
    PayloadTooLarge,

    #[error("Unsupported content type `{0}`")]
    UnsupportedMediaType(String),

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        let message = err.to_string();
        match err {
            TransitionError::SelfRequest | TransitionError::OwnOpportunity => {
                ApiError::Validation(message)
            }
            TransitionError::NotAddressee
            | TransitionError::NotParticipant
            | TransitionError::NotCreator
            | TransitionError::NotApplicant => ApiError::Forbidden(message),
            TransitionError::AlreadyPending
            | TransitionError::AlreadyConnected
            | TransitionError::AlreadyInterested
            | TransitionError::OpportunityClosed
            | TransitionError::InvalidState { .. } => ApiError::Conflict(message),
        }
    }
}

impl From<RoleChangeError> for ApiError {
    fn from(err: RoleChangeError) -> Self {
        let message = err.to_string();
        match err {
            RoleChangeError::AlreadyAssigned(_) => ApiError::Conflict(message),
            RoleChangeError::NotAssigned(_) => ApiError::NotFound("Role assignment"),
            RoleChangeError::SelfDemotion => ApiError::Validation(message),
        }
    }
}

/// The DB layer reports rule violations as typed errors inside `anyhow`,
/// and blocking closures may raise an `ApiError` directly. Anything else is
/// an unexpected failure.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<ApiError>() {
            Ok(api) => return api,
            Err(err) => err,
        };
        if let Some(e) = err.downcast_ref::<TransitionError>() {
            return e.clone().into();
        }
        if let Some(e) = err.downcast_ref::<RoleChangeError>() {
            return e.clone().into();
        }
        ApiError::Internal(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected JSON body: {}", rejection.body_text());
        ApiError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::Validation(rejection.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(err) = &self {
            error!("Internal error: {:#}", err);
        }
        let status = self.status();
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
