//! HTTP error rendering.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use mockva_common::MockvaError;

/// Error body returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_message: String,
    pub error_code: String,
}

/// A domain error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub MockvaError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            MockvaError::InvalidRequest(_)
            | MockvaError::AccountNotFound(_)
            | MockvaError::AccountAlreadyExists(_)
            | MockvaError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
            MockvaError::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
            MockvaError::StorageError(_) | MockvaError::ConfigurationError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn body(&self) -> ErrorBody {
        let error_message = match &self.0 {
            // Storage details stay in the logs.
            MockvaError::StorageError(_) | MockvaError::ConfigurationError(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        ErrorBody {
            error_message,
            error_code: self.0.error_code().to_string(),
        }
    }
}

impl From<MockvaError> for ApiError {
    fn from(e: MockvaError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(MockvaError::invalid(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, code = self.0.error_code(), "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockva_common::AccountId;

    #[test]
    fn test_business_errors_are_bad_requests() {
        let err = ApiError(MockvaError::AccountNotFound(AccountId::new("X1")));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.body(),
            ErrorBody {
                error_message: "Account with ID X1 not found".to_string(),
                error_code: "76".to_string(),
            }
        );
    }

    #[test]
    fn test_storage_errors_are_masked() {
        let err = ApiError(MockvaError::storage("relation account_balances does not exist"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body().error_message, "internal server error");
        assert_eq!(err.body().error_code, "96");
    }

    #[test]
    fn test_cancelled_is_unavailable() {
        let err = ApiError(MockvaError::Cancelled("transfer deadline exceeded".into()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.body().error_code, "91");
    }
}
