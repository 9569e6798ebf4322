//! Marketplace REST API access.
//!
//! The session layer talks to the API only through the [`IdentityBackend`]
//! and [`OwnerReviewBackend`] traits. [`ApiClient`] is the HTTP
//! implementation; tests substitute scripted backends.
//!
//! # Endpoints
//!
//! - `POST /api/auth/login`, `POST /api/auth/register`, `POST /api/auth/logout`
//! - `GET /api/users/me`, `PUT /api/users/me`
//! - `POST /api/users/upgrade` (path configurable)
//! - `GET /api/admin/requests/pending`, `PUT /api/admin/requests/{id}/approve|reject`

pub mod client;

use std::future::Future;

use minefornow_core::{UserId, UserRole};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use crate::forms::{OwnerUpgradeForm, ProfileUpdate, RegistrationForm};

pub use client::ApiClient;

/// Errors that can occur when calling the marketplace API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never got a usable response (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API rejected the credential (401/403).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The API refused the request with a 4xx and a message.
    #[error("Rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Server-supplied message, or a generic one.
        message: String,
    },

    /// The API failed with a 5xx.
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body text, truncated.
        message: String,
    },

    /// A response body did not have the expected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// An endpoint URL could not be built from the configured base URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// A pending owner upgrade request, as listed for admin review.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRequest {
    /// Id of the requesting user; also the id used to approve or reject.
    pub id: UserId,
    #[serde(alias = "full_name", default)]
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(alias = "citizen_card_number", default)]
    pub citizen_card_number: Option<String>,
    #[serde(alias = "driving_license", default)]
    pub driving_license: Option<String>,
    #[serde(default)]
    pub motivation: Option<String>,
    #[serde(default)]
    pub role: Option<UserRole>,
}

/// Identity endpoints used by the session context.
///
/// User-returning calls hand back the raw JSON payload; shaping it is the
/// normalizer's job.
pub trait IdentityBackend: Send + Sync {
    /// Exchange email and password for a bearer credential.
    fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> impl Future<Output = Result<SecretString, ApiError>> + Send;

    /// Create an account. Returns the created-user payload.
    fn register(
        &self,
        form: &RegistrationForm,
    ) -> impl Future<Output = Result<serde_json::Value, ApiError>> + Send;

    /// Tell the API the credential is no longer in use.
    fn logout(&self, token: &SecretString) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Fetch the current user for `token`.
    fn fetch_current_user(
        &self,
        token: &SecretString,
    ) -> impl Future<Output = Result<serde_json::Value, ApiError>> + Send;

    /// Update the current user's profile. Returns the updated payload.
    fn update_profile(
        &self,
        token: &SecretString,
        update: &ProfileUpdate,
    ) -> impl Future<Output = Result<serde_json::Value, ApiError>> + Send;

    /// Ask to be promoted to owner.
    fn request_owner_upgrade(
        &self,
        token: &SecretString,
        form: &OwnerUpgradeForm,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Admin review of owner upgrade requests.
pub trait OwnerReviewBackend: Send + Sync {
    /// List requests waiting for review.
    fn pending_owner_requests(
        &self,
        token: &SecretString,
    ) -> impl Future<Output = Result<Vec<OwnerRequest>, ApiError>> + Send;

    /// Approve the request of `user_id`. Returns the server's message.
    fn approve_owner_request(
        &self,
        token: &SecretString,
        user_id: UserId,
    ) -> impl Future<Output = Result<String, ApiError>> + Send;

    /// Reject the request of `user_id`. Returns the server's message.
    fn reject_owner_request(
        &self,
        token: &SecretString,
        user_id: UserId,
    ) -> impl Future<Output = Result<String, ApiError>> + Send;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::Rejected {
            status: 409,
            message: "Request already submitted".to_string(),
        };
        assert_eq!(err.to_string(), "Rejected (409): Request already submitted");

        let err = ApiError::Unauthorized("Invalid credentials".to_string());
        assert_eq!(err.to_string(), "Unauthorized: Invalid credentials");
    }

    #[test]
    fn test_owner_request_deserializes_both_spellings() {
        let camel: OwnerRequest = serde_json::from_value(serde_json::json!({
            "id": 9,
            "fullName": "Rui Costa",
            "email": "rui@example.com",
            "phone": "912345678",
            "citizenCardNumber": "12345678",
            "drivingLicense": "AB123456",
            "motivation": "Extra income",
            "role": "PENDING_OWNER"
        }))
        .unwrap();
        let snake: OwnerRequest = serde_json::from_value(serde_json::json!({
            "id": 9,
            "full_name": "Rui Costa",
            "email": "rui@example.com",
            "phone": "912345678",
            "citizen_card_number": "12345678",
            "driving_license": "AB123456",
            "motivation": "Extra income",
            "role": "PENDING_OWNER"
        }))
        .unwrap();

        assert_eq!(camel, snake);
        assert_eq!(camel.role, Some(UserRole::PendingOwner));
    }
}
