//! Integration tests for the Minefornow session client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p minefornow-integration-tests
//! ```
//!
//! Tests drive a real [`SessionContext`] over the real reqwest-based
//! [`ApiClient`] against [`StubApi`], an in-process axum server that speaks
//! the marketplace's REST contract on an ephemeral port. No external
//! services are needed.
//!
//! # Test Categories
//!
//! - `session_flows` - initialize, login, register, refresh, logout
//! - `owner_requests` - owner upgrade and admin review
//! - `persistence` - file-backed sessions across restarts

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use minefornow_core::UserId;
use minefornow_session::{ApiClient, ClientConfig, KeyValueStorage, SessionContext};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// How the stub spells user payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadStyle {
    /// `{id, fullName, email, role: "OWNER"}`
    CamelCase,
    /// `{user_id, full_name, email, user_role: "owner"}`
    SnakeCase,
}

#[derive(Debug, Clone)]
struct StubUser {
    id: i64,
    full_name: String,
    email: String,
    password: String,
    role: String,
    phone: Option<String>,
    driving_license: Option<String>,
    citizen_card_number: Option<String>,
    motivation: Option<String>,
}

impl StubUser {
    fn payload(&self, style: PayloadStyle) -> Value {
        match style {
            PayloadStyle::CamelCase => json!({
                "id": self.id,
                "fullName": self.full_name,
                "email": self.email,
                "phone": self.phone,
                "drivingLicense": self.driving_license,
                "role": self.role,
            }),
            PayloadStyle::SnakeCase => json!({
                "user_id": self.id.to_string(),
                "full_name": self.full_name,
                "email": self.email,
                "phone": self.phone,
                "driving_license": self.driving_license,
                "user_role": self.role.to_lowercase(),
            }),
        }
    }

    fn owner_request(&self) -> Value {
        json!({
            "id": self.id,
            "fullName": self.full_name,
            "email": self.email,
            "phone": self.phone,
            "citizenCardNumber": self.citizen_card_number,
            "drivingLicense": self.driving_license,
            "motivation": self.motivation,
            "role": self.role,
        })
    }
}

#[derive(Debug)]
struct StubState {
    users: Vec<StubUser>,
    /// Issued bearer token -> user id.
    tokens: HashMap<String, i64>,
    issued: u64,
    online: bool,
    /// Delay before every response.
    latency: Duration,
    style: PayloadStyle,
    logouts: usize,
}

impl StubState {
    fn issue_token(&mut self, user_id: i64) -> String {
        self.issued += 1;
        let token = format!("stub-token-{user_id}-{}", self.issued);
        self.tokens.insert(token.clone(), user_id);
        token
    }

    fn user_for(&self, headers: &HeaderMap) -> Option<usize> {
        let token = headers
            .get("authorization")?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?;
        let id = *self.tokens.get(token)?;
        self.users.iter().position(|u| u.id == id)
    }
}

type Shared = Arc<Mutex<StubState>>;

fn lock(state: &Shared) -> MutexGuard<'_, StubState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

fn unauthorized() -> Response {
    message(StatusCode::UNAUTHORIZED, "Token inválido ou expirado")
}

/// In-process stand-in for the marketplace REST API.
///
/// Dropping it stops the server.
#[derive(Debug)]
pub struct StubApi {
    addr: SocketAddr,
    state: Shared,
    task: JoinHandle<()>,
}

impl StubApi {
    /// Start the stub on an ephemeral local port.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state: Shared = Arc::new(Mutex::new(StubState {
            users: Vec::new(),
            tokens: HashMap::new(),
            issued: 0,
            online: true,
            latency: Duration::ZERO,
            style: PayloadStyle::CamelCase,
            logouts: 0,
        }));

        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/register", post(register))
            .route("/api/auth/logout", post(logout))
            .route("/api/users/me", get(current_user).put(update_profile))
            .route("/api/users/upgrade", post(request_upgrade))
            .route("/api/admin/requests/pending", get(pending_requests))
            .route("/api/admin/requests/{id}/approve", put(approve_request))
            .route("/api/admin/requests/{id}/reject", put(reject_request))
            .layer(middleware::from_fn_with_state(state.clone(), availability))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { addr, state, task })
    }

    /// Base URL of the stub, with a trailing slash.
    #[must_use]
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr))
            .unwrap_or_else(|_| unreachable!("socket address is a valid host"))
    }

    /// Client configuration pointing at the stub.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            api_url: self.url(),
            ..ClientConfig::default()
        }
    }

    /// A fresh session over `storage`, talking to the stub.
    ///
    /// # Errors
    ///
    /// Returns the client construction error, if any.
    pub fn session(
        &self,
        storage: Arc<dyn KeyValueStorage>,
    ) -> Result<SessionContext<ApiClient>, minefornow_session::ApiError> {
        Ok(SessionContext::new(ApiClient::new(&self.config())?, storage))
    }

    /// Create an account directly, bypassing registration.
    pub fn add_user(&self, full_name: &str, email: &str, password: &str, role: &str) -> UserId {
        let mut state = lock(&self.state);
        let id = i64::try_from(state.users.len()).unwrap_or(i64::MAX - 1) + 1;
        state.users.push(StubUser {
            id,
            full_name: full_name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: role.to_string(),
            phone: None,
            driving_license: None,
            citizen_card_number: None,
            motivation: None,
        });
        UserId::new(id)
    }

    /// Answer every request with 503 while `false`.
    pub fn set_online(&self, online: bool) {
        lock(&self.state).online = online;
    }

    /// Hold every response back by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.state).latency = latency;
    }

    pub fn set_payload_style(&self, style: PayloadStyle) {
        lock(&self.state).style = style;
    }

    /// Invalidate every issued token, as a server-side session purge would.
    pub fn revoke_tokens(&self) {
        lock(&self.state).tokens.clear();
    }

    /// Number of logout calls received.
    #[must_use]
    pub fn logouts(&self) -> usize {
        lock(&self.state).logouts
    }

    /// Role currently stored for `email`.
    #[must_use]
    pub fn role_of(&self, email: &str) -> Option<String> {
        lock(&self.state)
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.role.clone())
    }
}

impl Drop for StubApi {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A local address nothing listens on, for "server down" scenarios.
///
/// # Errors
///
/// Returns an I/O error if a probe listener cannot be bound.
pub async fn unreachable_config() -> std::io::Result<ClientConfig> {
    let probe = TcpListener::bind("127.0.0.1:0").await?;
    let addr = probe.local_addr()?;
    drop(probe);

    Ok(ClientConfig {
        api_url: Url::parse(&format!("http://{addr}/"))
            .unwrap_or_else(|_| unreachable!("socket address is a valid host")),
        request_timeout: Duration::from_secs(2),
        ..ClientConfig::default()
    })
}

// =============================================================================
// Handlers
// =============================================================================

async fn availability(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let (online, latency) = {
        let state = lock(&state);
        (state.online, state.latency)
    };
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
    if !online {
        return (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response();
    }
    next.run(request).await
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(State(state): State<Shared>, Json(body): Json<LoginBody>) -> Response {
    let mut state = lock(&state);
    let Some(user) = state
        .users
        .iter()
        .find(|u| u.email == body.email && u.password == body.password)
        .cloned()
    else {
        return message(StatusCode::UNAUTHORIZED, "Credenciais inválidas");
    };

    let token = state.issue_token(user.id);
    Json(json!({
        "token": token,
        "type": "Bearer",
        "userId": user.id,
        "email": user.email,
        "role": user.role,
    }))
    .into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody {
    full_name: String,
    email: String,
    password: String,
    confirm_password: String,
}

async fn register(State(state): State<Shared>, Json(body): Json<RegisterBody>) -> Response {
    if body.password != body.confirm_password {
        return message(StatusCode::BAD_REQUEST, "As passwords não coincidem");
    }

    let mut state = lock(&state);
    if state.users.iter().any(|u| u.email == body.email) {
        return message(StatusCode::BAD_REQUEST, "Email já registado");
    }

    let id = i64::try_from(state.users.len()).unwrap_or(i64::MAX - 1) + 1;
    state.users.push(StubUser {
        id,
        full_name: body.full_name,
        email: body.email.clone(),
        password: body.password,
        role: "RENTER".to_string(),
        phone: None,
        driving_license: None,
        citizen_card_number: None,
        motivation: None,
    });

    (
        StatusCode::CREATED,
        Json(json!({
            "message": "Utilizador registado com sucesso",
            "userId": id,
            "email": body.email,
            "role": "RENTER",
        })),
    )
        .into_response()
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = lock(&state);
    state.logouts += 1;
    if let Some(token) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        state.tokens.remove(token);
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn current_user(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    match state.user_for(&headers).and_then(|i| state.users.get(i)) {
        Some(user) => Json(user.payload(state.style)).into_response(),
        None => unauthorized(),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileBody {
    phone: Option<String>,
    driving_license: Option<String>,
}

async fn update_profile(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<ProfileBody>,
) -> Response {
    let mut state = lock(&state);
    let style = state.style;
    let Some(index) = state.user_for(&headers) else {
        return unauthorized();
    };
    let Some(user) = state.users.get_mut(index) else {
        return unauthorized();
    };

    if body.phone.is_some() {
        user.phone = body.phone;
    }
    if body.driving_license.is_some() {
        user.driving_license = body.driving_license;
    }
    Json(user.payload(style)).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpgradeBody {
    phone: String,
    citizen_card_number: String,
    driving_license: String,
    motivation: String,
}

async fn request_upgrade(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<UpgradeBody>,
) -> Response {
    let mut state = lock(&state);
    let Some(index) = state.user_for(&headers) else {
        return unauthorized();
    };
    let Some(user) = state.users.get_mut(index) else {
        return unauthorized();
    };

    if user.role != "RENTER" {
        return message(StatusCode::CONFLICT, "Pedido já submetido");
    }

    user.role = "PENDING_OWNER".to_string();
    user.phone = Some(body.phone);
    user.citizen_card_number = Some(body.citizen_card_number);
    user.driving_license = Some(body.driving_license);
    user.motivation = Some(body.motivation);
    message(StatusCode::OK, "Pedido submetido")
}

/// Index of the calling user if they are an admin, or the error response.
fn require_admin(state: &StubState, headers: &HeaderMap) -> Result<usize, Response> {
    let index = state.user_for(headers).ok_or_else(unauthorized)?;
    match state.users.get(index) {
        Some(user) if user.role == "ADMIN" => Ok(index),
        _ => Err(message(StatusCode::FORBIDDEN, "Acesso negado")),
    }
}

async fn pending_requests(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = lock(&state);
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }

    let pending: Vec<Value> = state
        .users
        .iter()
        .filter(|u| u.role == "PENDING_OWNER")
        .map(StubUser::owner_request)
        .collect();
    Json(pending).into_response()
}

fn review(state: &Shared, headers: &HeaderMap, id: i64, approve: bool) -> Response {
    let mut state = lock(state);
    if let Err(response) = require_admin(&state, headers) {
        return response;
    }

    let Some(user) = state
        .users
        .iter_mut()
        .find(|u| u.id == id && u.role == "PENDING_OWNER")
    else {
        return message(StatusCode::NOT_FOUND, "Pedido não encontrado");
    };

    if approve {
        user.role = "OWNER".to_string();
        message(StatusCode::OK, "Pedido aprovado")
    } else {
        user.role = "RENTER".to_string();
        message(StatusCode::OK, "Pedido rejeitado")
    }
}

async fn approve_request(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    review(&state, &headers, id, true)
}

async fn reject_request(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    review(&state, &headers, id, false)
}
