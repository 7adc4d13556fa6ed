//! Erreurs renvoyées aux clients, sous la forme `{"error": "<message>"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde_json::json;
use thiserror::Error;

use crate::services::ServiceError;
use crate::utils::error_messages::{
    ACCESS_DENIED, ANALYSIS_FAILED, AUTH_FAILED, INTERNAL_ERROR, INVALID_CREATOR, LOGIN_ERROR,
    MISSING_IMAGE, MISSING_PATIENT_EMAIL, PATIENT_NOT_FOUND, REGISTRATION_ERROR, REPORT_NOT_FOUND,
    USER_EXISTS,
};
use crate::utils::token::TokenError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::AccessDenied(_) => ApiError::Forbidden(ACCESS_DENIED),
            ServiceError::Validation(message) => ApiError::Validation(message),
            ServiceError::UserAlreadyExists => ApiError::Conflict(USER_EXISTS),
            ServiceError::InvalidCreator => ApiError::Validation(INVALID_CREATOR.to_string()),
            ServiceError::InvalidCredentials => ApiError::Unauthorized(LOGIN_ERROR),
            ServiceError::MissingImage => ApiError::Validation(MISSING_IMAGE.to_string()),
            ServiceError::NoSuchReport => ApiError::NotFound(REPORT_NOT_FOUND),
            ServiceError::NoSuchPatient => ApiError::NotFound(PATIENT_NOT_FOUND),
            ServiceError::MissingPatientEmail => {
                ApiError::Validation(MISSING_PATIENT_EMAIL.to_string())
            }
            ServiceError::Token(TokenError::Signing) => {
                error!("Token signing failed");
                ApiError::Internal(INTERNAL_ERROR.to_string())
            }
            ServiceError::Token(_) => ApiError::Unauthorized(AUTH_FAILED),
            ServiceError::Mail(ref mail) => {
                error!("{e}");
                ApiError::Internal(format!("Failed to send email: {mail}"))
            }
            ServiceError::RegistrationFailed(_) => {
                error!("{e}");
                ApiError::Internal(REGISTRATION_ERROR.to_string())
            }
            ServiceError::Analysis(_) => {
                error!("{e}");
                ApiError::Internal(ANALYSIS_FAILED.to_string())
            }
            ServiceError::Store(_) | ServiceError::Hashing(_) | ServiceError::Blocking(_) => {
                error!("{e}");
                ApiError::Internal(INTERNAL_ERROR.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::AccessDenied;
    use crate::database::StoreError;
    use crate::email::MailError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ServiceError::AccessDenied(AccessDenied), StatusCode::FORBIDDEN),
            (ServiceError::Validation("x".to_string()), StatusCode::BAD_REQUEST),
            (ServiceError::UserAlreadyExists, StatusCode::CONFLICT),
            (ServiceError::InvalidCreator, StatusCode::BAD_REQUEST),
            (ServiceError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (ServiceError::MissingImage, StatusCode::BAD_REQUEST),
            (ServiceError::NoSuchReport, StatusCode::NOT_FOUND),
            (ServiceError::NoSuchPatient, StatusCode::NOT_FOUND),
            (ServiceError::MissingPatientEmail, StatusCode::BAD_REQUEST),
            (ServiceError::Token(TokenError::Expired), StatusCode::UNAUTHORIZED),
            (ServiceError::Token(TokenError::Signing), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ServiceError::Store(StoreError::Backend("down".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (service_error, status) in cases {
            let label = service_error.to_string();
            assert_eq!(ApiError::from(service_error).status(), status, "{label}");
        }
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let leak = StoreError::Backend("secret host".to_string());
        let api = ApiError::from(ServiceError::Store(leak));
        assert_eq!(api, ApiError::Internal(INTERNAL_ERROR.to_string()));

        let down = StoreError::Backend("x".to_string());
        let api = ApiError::from(ServiceError::RegistrationFailed(down));
        assert_eq!(api.to_string(), REGISTRATION_ERROR);
    }

    #[test]
    fn test_mail_failures_carry_the_reason() {
        let refused = MailError::Relay("connection refused".to_string());
        let api = ApiError::from(ServiceError::Mail(refused));
        assert_eq!(api.to_string(), "Failed to send email: connection refused");
    }
}
