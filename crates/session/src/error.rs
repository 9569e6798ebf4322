//! Session operation errors.

use thiserror::Error;

use crate::api::ApiError;
use crate::forms::FormError;
use crate::normalize::NormalizeError;
use crate::storage::StorageError;

/// Errors returned by [`SessionContext`](crate::SessionContext) operations.
///
/// Each variant tells the caller what happened to the session:
/// `Authentication` has already torn it down, everything else left it as it
/// was.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The API rejected the credential. The session is now anonymous.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The request was refused with a human-readable reason.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The API could not be reached or failed. The session is unchanged.
    #[error("Network error: {0}")]
    Network(String),

    /// The API answered with a user record this client cannot read.
    #[error("Malformed user payload: {0}")]
    MalformedUser(String),

    /// The signed-in user's role does not allow the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A newer session operation started before this one finished; its
    /// result was discarded.
    #[error("Superseded by a newer session operation")]
    Superseded,

    /// The credential store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The client is set up wrong, e.g. an API path that is not a valid URL.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SessionError {
    /// Text suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Authentication(_) => "Invalid email or password, or your session has expired. Please sign in again.".to_string(),
            Self::Validation(message) => message.clone(),
            Self::Network(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            Self::MalformedUser(_) => {
                "The server sent an unexpected response. Please try again later.".to_string()
            }
            Self::Forbidden(message) => message.clone(),
            Self::Superseded => "This action was replaced by a newer one.".to_string(),
            Self::Storage(_) => "Could not save your session on this device.".to_string(),
            Self::Configuration(_) => {
                "The client is misconfigured. Check the API settings.".to_string()
            }
        }
    }

    /// Whether retrying later could succeed without user action.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized(message) => Self::Authentication(message),
            ApiError::Rejected { message, .. } => Self::Validation(message),
            ApiError::Http(e) if e.is_decode() => Self::MalformedUser(e.to_string()),
            ApiError::Http(e) => Self::Network(e.to_string()),
            ApiError::Server { status, message } => {
                Self::Network(format!("server returned {status}: {message}"))
            }
            ApiError::UnexpectedResponse(message) => Self::MalformedUser(message),
            ApiError::Url(e) => Self::Configuration(format!("bad endpoint URL: {e}")),
        }
    }
}

impl From<NormalizeError> for SessionError {
    fn from(err: NormalizeError) -> Self {
        Self::MalformedUser(err.to_string())
    }
}

impl From<FormError> for SessionError {
    fn from(err: FormError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_mapping() {
        assert!(matches!(
            SessionError::from(ApiError::Unauthorized("bad token".to_string())),
            SessionError::Authentication(_)
        ));
        assert!(matches!(
            SessionError::from(ApiError::Rejected {
                status: 409,
                message: "Pedido já submetido".to_string()
            }),
            SessionError::Validation(m) if m == "Pedido já submetido"
        ));
        assert!(matches!(
            SessionError::from(ApiError::Server {
                status: 503,
                message: "down".to_string()
            }),
            SessionError::Network(_)
        ));
        assert!(matches!(
            SessionError::from(ApiError::UnexpectedResponse("x".to_string())),
            SessionError::MalformedUser(_)
        ));
    }

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = SessionError::Validation("Email já registado".to_string());
        assert_eq!(err.user_message(), "Email já registado");
        assert_eq!(err.to_string(), "Validation failed: Email já registado");
    }

    #[test]
    fn test_form_error_becomes_validation() {
        let err = SessionError::from(FormError::PasswordMismatch);
        assert_eq!(err.user_message(), "passwords do not match");
    }

    #[test]
    fn test_only_network_errors_are_transient() {
        assert!(SessionError::Network("timeout".to_string()).is_transient());
        assert!(!SessionError::Authentication("x".to_string()).is_transient());
        assert!(!SessionError::Superseded.is_transient());
    }

    #[test]
    fn test_bad_endpoint_url_is_not_transient() {
        let err = SessionError::from(ApiError::Url(url::ParseError::EmptyHost));
        assert!(matches!(err, SessionError::Configuration(_)));
        assert!(!err.is_transient());
    }
}
