//! HTTP implementation of the marketplace API traits.

use std::sync::Arc;

use minefornow_core::UserId;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use super::{ApiError, IdentityBackend, OwnerRequest, OwnerReviewBackend};
use crate::config::ClientConfig;
use crate::forms::{OwnerUpgradeForm, ProfileUpdate, RegistrationForm};

/// Longest server error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Marketplace REST API client.
///
/// Cheap to clone; clones share one connection pool. Every request is
/// bounded by the configured timeout, and a timeout surfaces as
/// `ApiError::Http`.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    upgrade_path: String,
}

/// Request body for `POST /api/auth/login`.
#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Response from `POST /api/auth/login`. Other fields are ignored.
#[derive(Deserialize)]
struct LoginResponse {
    #[serde(alias = "accessToken", alias = "access_token")]
    token: String,
}

/// Request body for `POST /api/auth/register`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    full_name: &'a str,
    email: &'a str,
    password: &'a str,
    confirm_password: &'a str,
}

/// Request body for `PUT /api/users/me`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest<'a> {
    phone: Option<&'a str>,
    driving_license: Option<&'a str>,
}

/// Request body for the owner upgrade endpoint.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpgradeOwnerRequest<'a> {
    phone: &'a str,
    citizen_card_number: &'a str,
    driving_license: &'a str,
    motivation: &'a str,
}

/// Error body shape used by the API: `{"message": ...}`, sometimes `{"error": ...}`.
#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// `{"message": ...}` acknowledgement from the admin review endpoints.
#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

impl ApiClient {
    /// Create a client for the API described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("minefornow-session/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.clone(),
                upgrade_path: config.upgrade_path.trim_start_matches('/').to_owned(),
            }),
        })
    }

    /// Base URL every endpoint is resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path)?)
    }

    /// Send `request` and turn non-success statuses into `ApiError`s.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(|e| e.message.or(e.error))
            .filter(|m| !m.trim().is_empty());

        tracing::debug!(status = status.as_u16(), "API request failed");

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            Err(ApiError::Unauthorized(
                message.unwrap_or_else(|| "Invalid credentials".to_string()),
            ))
        } else if status.is_client_error() {
            Err(ApiError::Rejected {
                status: status.as_u16(),
                message: message.unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Request rejected")
                        .to_string()
                }),
            })
        } else {
            Err(ApiError::Server {
                status: status.as_u16(),
                message: message.unwrap_or_else(|| truncate(&body, MAX_ERROR_BODY)),
            })
        }
    }

    async fn json_value(response: reqwest::Response) -> Result<serde_json::Value, ApiError> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::UnexpectedResponse(e.to_string()))
    }

    async fn acknowledgement(response: reqwest::Response) -> String {
        response
            .json::<MessageResponse>()
            .await
            .ok()
            .and_then(|m| m.message)
            .unwrap_or_default()
    }
}

impl IdentityBackend for ApiClient {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn login(&self, email: &str, password: &SecretString) -> Result<SecretString, ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint("api/auth/login")?)
            .json(&LoginRequest {
                email,
                password: password.expose_secret(),
            });

        let response = self.send(request).await?;
        let body = response.text().await?;
        let login: LoginResponse = serde_json::from_str(&body)
            .map_err(|e| ApiError::UnexpectedResponse(format!("login response: {e}")))?;

        if login.token.is_empty() {
            return Err(ApiError::UnexpectedResponse(
                "login response has an empty token".to_string(),
            ));
        }

        Ok(SecretString::from(login.token))
    }

    #[instrument(skip(self, form), fields(email = %form.email.trim()))]
    async fn register(&self, form: &RegistrationForm) -> Result<serde_json::Value, ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint("api/auth/register")?)
            .json(&RegisterRequest {
                full_name: form.full_name.trim(),
                email: form.email.trim(),
                password: form.password.expose_secret(),
                confirm_password: form.confirm_password.expose_secret(),
            });

        let response = self.send(request).await?;
        Self::json_value(response).await
    }

    #[instrument(skip(self, token))]
    async fn logout(&self, token: &SecretString) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint("api/auth/logout")?)
            .bearer_auth(token.expose_secret());

        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn fetch_current_user(&self, token: &SecretString) -> Result<serde_json::Value, ApiError> {
        let request = self
            .inner
            .client
            .get(self.endpoint("api/users/me")?)
            .bearer_auth(token.expose_secret());

        let response = self.send(request).await?;
        Self::json_value(response).await
    }

    #[instrument(skip(self, token, update))]
    async fn update_profile(
        &self,
        token: &SecretString,
        update: &ProfileUpdate,
    ) -> Result<serde_json::Value, ApiError> {
        let request = self
            .inner
            .client
            .put(self.endpoint("api/users/me")?)
            .bearer_auth(token.expose_secret())
            .json(&UpdateProfileRequest {
                phone: update.phone.as_deref().map(str::trim),
                driving_license: update.driving_license.as_deref().map(str::trim),
            });

        let response = self.send(request).await?;
        Self::json_value(response).await
    }

    #[instrument(skip(self, token, form))]
    async fn request_owner_upgrade(
        &self,
        token: &SecretString,
        form: &OwnerUpgradeForm,
    ) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .post(self.endpoint(&self.inner.upgrade_path)?)
            .bearer_auth(token.expose_secret())
            .json(&UpgradeOwnerRequest {
                phone: form.phone.trim(),
                citizen_card_number: form.citizen_card_number.trim(),
                driving_license: form.driving_license.trim(),
                motivation: form.motivation.trim(),
            });

        self.send(request).await?;
        Ok(())
    }
}

impl OwnerReviewBackend for ApiClient {
    #[instrument(skip(self, token))]
    async fn pending_owner_requests(
        &self,
        token: &SecretString,
    ) -> Result<Vec<OwnerRequest>, ApiError> {
        let request = self
            .inner
            .client
            .get(self.endpoint("api/admin/requests/pending")?)
            .bearer_auth(token.expose_secret());

        let response = self.send(request).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::UnexpectedResponse(e.to_string()))
    }

    #[instrument(skip(self, token), fields(user_id = %user_id))]
    async fn approve_owner_request(
        &self,
        token: &SecretString,
        user_id: UserId,
    ) -> Result<String, ApiError> {
        let request = self
            .inner
            .client
            .put(self.endpoint(&format!("api/admin/requests/{user_id}/approve"))?)
            .bearer_auth(token.expose_secret());

        let response = self.send(request).await?;
        Ok(Self::acknowledgement(response).await)
    }

    #[instrument(skip(self, token), fields(user_id = %user_id))]
    async fn reject_owner_request(
        &self,
        token: &SecretString,
        user_id: UserId,
    ) -> Result<String, ApiError> {
        let request = self
            .inner
            .client
            .put(self.endpoint(&format!("api/admin/requests/{user_id}/reject"))?)
            .bearer_auth(token.expose_secret());

        let response = self.send(request).await?;
        Ok(Self::acknowledgement(response).await)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("upgrade_path", &self.inner.upgrade_path)
            .finish_non_exhaustive()
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", text.get(..idx).unwrap_or(text)),
        None => text.to_owned(),
    }
}
