//! Mapping of module errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::{protocol::ErrorResponse, ServiceError};
use tracing::warn;

use crate::auth::TokenError;
use crate::crypto::CipherError;
use crate::directory::DirectoryError;
use crate::geo::GeoError;
use crate::otp::OtpError;
use crate::persist::{PersistError, RecordError};
use crate::profile::ProfileError;

/// Handler error: a [`ServiceError`] rendered as the standard JSON error body.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(ServiceError::BadRequest(message.into()))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self(ServiceError::Unauthorized(message.into()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse::new(self.0.code(), self.0.message());
        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl From<OtpError> for ApiError {
    fn from(e: OtpError) -> Self {
        match e {
            OtpError::InvalidPhone => Self::bad_request("invalid phone"),
            OtpError::NotFound | OtpError::Expired | OtpError::Mismatch => {
                Self::unauthorized("invalid or expired code")
            }
            OtpError::TooManyAttempts => Self(ServiceError::TooManyRequests(
                "too many attempts; request a new code".into(),
            )),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => Self::unauthorized("token expired"),
            TokenError::Malformed | TokenError::BadSignature => {
                Self::unauthorized("invalid token")
            }
            TokenError::InvalidSecret | TokenError::Encode => {
                warn!(error = %e, "session token signing failed");
                Self(ServiceError::Internal("token signing failed".into()))
            }
        }
    }
}

impl From<GeoError> for ApiError {
    fn from(e: GeoError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl From<DirectoryError> for ApiError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::UnknownHospital(_) | DirectoryError::UnknownNgo(_) => {
                Self(ServiceError::NotFound("not found".into()))
            }
            DirectoryError::InvalidSubmission(_) => Self::bad_request(e.to_string()),
            DirectoryError::DuplicateId { .. } => Self(ServiceError::Internal(e.to_string())),
        }
    }
}

impl From<CipherError> for ApiError {
    fn from(e: CipherError) -> Self {
        warn!(error = %e, "field encryption failed");
        Self(ServiceError::Internal("encryption failed".into()))
    }
}

impl From<PersistError> for ApiError {
    fn from(e: PersistError) -> Self {
        warn!(error = %e, "record storage failed");
        Self(ServiceError::Internal("storage failed".into()))
    }
}

impl From<RecordError> for ApiError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::NotFound => Self(ServiceError::NotFound("not found".into())),
            RecordError::Invalid(message) => Self::bad_request(message),
            RecordError::Persist(e) => e.into(),
        }
    }
}

impl From<ProfileError> for ApiError {
    fn from(e: ProfileError) -> Self {
        match e {
            ProfileError::Cipher(e) => e.into(),
            ProfileError::Persist(e) => e.into(),
        }
    }
}
