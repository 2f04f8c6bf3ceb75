use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::LifecycleError;

/// Error response structure sent to clients
///
/// Every failing endpoint answers with the same JSON shape:
/// ```
/// {
///   "status": "fail",
///   "message": "Request is not pending"
/// }
/// ```
///
/// `HttpError` is what handlers return; this struct is only the wire format,
/// so internal context never leaks into responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Messages shared by several handlers and the middleware
///
/// Messages used by a single handler stay inline in that handler.
#[derive(Debug, PartialEq)]
pub enum ErrorMessage {
    // Password validation errors
    EmptyPassword,
    ExceededMaxPasswordLength(usize),
    InvalidHashFormat,
    HashingError,

    // Authentication errors
    InvalidToken,
    TokenNotProvided,
    UserNoLongerExist,

    // Lookups
    ProfileNotFound,
    RequestNotFound,
    NotificationNotFound,

    //Else
    ServerError,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessage::UserNoLongerExist => {
                "User belonging to this token no longer exists".to_string()
            }
            ErrorMessage::EmptyPassword => "Password cannot be empty".to_string(),
            ErrorMessage::HashingError => "Error while hashing password".to_string(),
            ErrorMessage::InvalidHashFormat => "Invalid password hash format".to_string(),
            ErrorMessage::ExceededMaxPasswordLength(max_length) => {
                format!("Password must not be more than {} characters", max_length)
            }
            ErrorMessage::InvalidToken => "Token is invalid or expired".to_string(),
            ErrorMessage::TokenNotProvided => {
                "You are not logged in, please provide a token".to_string()
            }
            ErrorMessage::ProfileNotFound => "Profile not found".to_string(),
            ErrorMessage::RequestNotFound => "Request not found with this ID".to_string(),
            ErrorMessage::NotificationNotFound => "Notification not found".to_string(),
            ErrorMessage::ServerError => "Server Error. Please try again later".to_string(),
        };
        write!(f, "{}", message)
    }
}

/// Internal HTTP error type used throughout the application
///
/// Handlers return `Result<T, HttpError>`; axum turns the error into a response
/// through the `IntoResponse` impl below. The status code travels with the
/// message so the two can never disagree.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub message: String,
    pub status: StatusCode,
}

impl HttpError {
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        HttpError {
            message: message.into(),
            status,
        }
    }

    /// 500 for persistence, mail and hashing failures.
    pub fn server_error(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// 400 for invalid input, duplicates and illegal transitions.
    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::BAD_REQUEST)
    }

    /// 401: the caller is not authenticated (or supplied wrong credentials).
    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::UNAUTHORIZED)
    }

    /// 403: authenticated, but not the party allowed to act.
    pub fn forbidden(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::FORBIDDEN)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        HttpError::new(message, StatusCode::NOT_FOUND)
    }

    /// Body: {"status": "fail", "message": "..."}
    pub fn into_http_response(self) -> Response {
        let json_response = Json(ErrorResponse {
            status: "fail".to_string(),
            message: self.message.clone(),
        });

        (self.status, json_response).into_response()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HttpError: message: {}, status: {}",
            self.message, self.status
        )
    }
}

impl std::error::Error for HttpError {}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}

impl From<LifecycleError> for HttpError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::NotParty { .. } => HttpError::forbidden(err.to_string()),
            LifecycleError::InvalidState { .. }
            | LifecycleError::DonorUnavailable
            | LifecycleError::SelfRequest
            | LifecycleError::DuplicatePending => HttpError::bad_request(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request_flow::RequestAction;
    use crate::models::RequestStatus;
    use http_body_util::BodyExt;

    #[test]
    fn lifecycle_errors_map_to_status_codes() {
        let forbidden: HttpError = LifecycleError::NotParty {
            action: RequestAction::Reject,
        }
        .into();
        assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

        let invalid: HttpError = LifecycleError::InvalidState {
            action: RequestAction::Accept,
            status: RequestStatus::Accepted,
        }
        .into();
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
        assert_eq!(invalid.message, "Request is not pending");

        let unavailable: HttpError = LifecycleError::DonorUnavailable.into();
        assert_eq!(unavailable.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn error_body_uses_fail_status() {
        let response = HttpError::not_found(ErrorMessage::ProfileNotFound.to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.status, "fail");
        assert_eq!(body.message, "Profile not found");
    }
}
