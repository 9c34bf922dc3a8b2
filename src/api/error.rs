//! Maps service errors onto HTTP responses.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

use crate::attendance::AttendanceError;
use crate::model::zone::ZoneError;
use crate::services::users::IdentityError;
use crate::storage::StorageError;

#[derive(Debug, Display)]
pub enum ApiError {
    #[display(fmt = "{}", _0)]
    Identity(IdentityError),
    #[display(fmt = "{}", _0)]
    Attendance(AttendanceError),
    #[display(fmt = "{}", _0)]
    Storage(StorageError),
    #[display(fmt = "{}", _0)]
    Zone(ZoneError),
    #[display(fmt = "{}", _0)]
    Forbidden(&'static str),
    #[display(fmt = "{}", _0)]
    NotFound(&'static str),
    #[display(fmt = "{}", _0)]
    BadRequest(String),
    #[display(fmt = "Internal Server Error")]
    Internal,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Identity(e) => match e {
                IdentityError::Storage(_) | IdentityError::Hashing(_) => StatusCode::INTERNAL_SERVER_ERROR,
                IdentityError::Validation(_) | IdentityError::InvalidInvitation => StatusCode::BAD_REQUEST,
                IdentityError::EmailTaken
                | IdentityError::AlreadyAdmin
                | IdentityError::CooldownActive { .. }
                | IdentityError::NoPendingRequest => StatusCode::CONFLICT,
                IdentityError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                IdentityError::NotFound => StatusCode::NOT_FOUND,
            },
            ApiError::Attendance(e) => match e {
                AttendanceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                AttendanceError::PermissionDenied | AttendanceError::NotAnEmployee => StatusCode::FORBIDDEN,
                AttendanceError::Clock { .. } | AttendanceError::InvalidTransition(_) => StatusCode::CONFLICT,
            },
            ApiError::Storage(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Zone(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            return HttpResponse::build(status).json(json!({"error": "Internal Server Error"}));
        }
        HttpResponse::build(status).json(json!({"error": self.to_string()}))
    }
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        ApiError::Identity(e)
    }
}

impl From<AttendanceError> for ApiError {
    fn from(e: AttendanceError) -> Self {
        ApiError::Attendance(e)
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::Storage(e)
    }
}

impl From<ZoneError> for ApiError {
    fn from(e: ZoneError) -> Self {
        ApiError::Zone(e)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
