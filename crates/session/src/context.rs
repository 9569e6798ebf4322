//! The process-wide session state machine.
//!
//! ```text
//! Uninitialized ─initialize()─▶ Loading ─┬─▶ Authenticated(user)
//!                                        └─▶ Anonymous
//! ```
//!
//! State is published through a [`tokio::sync::watch`] channel so any number
//! of views can [`subscribe`](SessionContext::subscribe) and re-render on
//! change. Every operation that may change state takes a ticket from a
//! generation counter; its completion is applied only if no newer operation
//! has started since. `logout()` and credential rejection advance the
//! generation, so a slow response can never bring a torn-down session back.
//!
//! The counter sits behind its own lock, held while the credential store is
//! written and the result published. Subscribers reading the channel never
//! wait on disk I/O.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use minefornow_core::{Email, SessionUser, UserId};
use secrecy::SecretString;
use tokio::sync::watch;
use tracing::instrument;

use crate::api::{IdentityBackend, OwnerRequest, OwnerReviewBackend};
use crate::error::SessionError;
use crate::forms::{OwnerUpgradeForm, ProfileUpdate, RegistrationForm};
use crate::normalize::normalize;
use crate::role_gate::{self, Capability, OwnerCallToAction};
use crate::storage::{KeyValueStorage, StorageError};
use crate::token::{TokenStore, UserHint, UserHintStore};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// `initialize()` has not run yet.
    #[default]
    Uninitialized,
    /// Startup is resolving the stored credential.
    Loading,
    /// A server-confirmed user is resident.
    Authenticated(SessionUser),
    /// Nobody is signed in.
    Anonymous,
}

/// What subscribers observe.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// An operation that keeps the current state visible (login, refresh,
    /// profile update) is in flight.
    pub busy: bool,
}

impl SessionSnapshot {
    /// The resident user, if authenticated.
    #[must_use]
    pub const fn user(&self) -> Option<&SessionUser> {
        match &self.state {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    /// Startup is resolving, or another operation is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.busy || matches!(self.state, SessionState::Loading)
    }
}

/// Generation number an operation started under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket(u64);

/// How an operation marks itself as in flight.
#[derive(Debug, Clone, Copy)]
enum Start {
    /// Replace the state with `Loading`.
    Loading,
    /// Keep the state, raise `busy`. Failing out of `Loading` ends
    /// anonymous.
    Busy,
}

/// Handle to the session. Clones share the same state.
pub struct SessionContext<B> {
    inner: Arc<Inner<B>>,
}

struct Inner<B> {
    backend: B,
    tokens: TokenStore,
    hints: UserHintStore,
    generation: Mutex<u64>,
    state: watch::Sender<SessionSnapshot>,
}

impl<B> Clone for SessionContext<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B> std::fmt::Debug for SessionContext<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("snapshot", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

impl<B> SessionContext<B> {
    /// Create an uninitialized session over `backend`, persisting to
    /// `storage`. Nothing is read until [`initialize`](Self::initialize).
    #[must_use]
    pub fn new(backend: B, storage: Arc<dyn KeyValueStorage>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                backend,
                tokens: TokenStore::new(Arc::clone(&storage)),
                hints: UserHintStore::new(storage),
                generation: Mutex::new(0),
                state,
            }),
        }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// A receiver that wakes on every snapshot change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().state.clone()
    }

    /// The server-confirmed user. This is the only authority for "signed in".
    #[must_use]
    pub fn current_user(&self) -> Option<SessionUser> {
        self.inner.state.borrow().user().cloned()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }

    /// The cached snapshot from a previous run, unconfirmed.
    #[must_use]
    pub fn user_hint(&self) -> Option<UserHint> {
        self.inner.hints.get()
    }

    /// Whether a credential is stored, confirmed or not.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the store cannot be read.
    pub fn has_credential(&self) -> Result<bool, SessionError> {
        Ok(self.inner.tokens.get()?.is_some())
    }

    fn generation(&self) -> MutexGuard<'_, u64> {
        self.inner
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, start: Start) -> Ticket {
        let mut generation = self.generation();
        *generation = generation.wrapping_add(1);
        self.inner.state.send_modify(|snap| match start {
            Start::Loading => snap.state = SessionState::Loading,
            Start::Busy => snap.busy = true,
        });
        Ticket(*generation)
    }

    fn observe(&self) -> Ticket {
        Ticket(*self.generation())
    }

    /// Apply `effect` to a copy of the state if `ticket` is still current and
    /// publish the result, otherwise report `Superseded` and leave
    /// everything alone.
    fn settle<R>(
        &self,
        ticket: Ticket,
        effect: impl FnOnce(&mut SessionState) -> Result<R, SessionError>,
    ) -> Result<R, SessionError> {
        let generation = self.generation();
        if *generation != ticket.0 {
            return Err(SessionError::Superseded);
        }

        let mut state = self.state();
        let outcome = effect(&mut state);
        self.inner.state.send_modify(|snap| {
            snap.state = state;
            snap.busy = false;
        });
        drop(generation);
        outcome
    }

    /// Close a failed operation that leaves state as it was. A `Loading`
    /// phase it displaced ends anonymous.
    fn finish(&self, ticket: Ticket) {
        let generation = self.generation();
        if *generation != ticket.0 {
            return;
        }
        self.inner.state.send_if_modified(|snap| {
            let was_loading = matches!(snap.state, SessionState::Loading);
            if !snap.busy && !was_loading {
                return false;
            }
            if was_loading {
                snap.state = SessionState::Anonymous;
            }
            snap.busy = false;
            true
        });
        drop(generation);
    }

    /// Make `user` resident and cache it as the hint.
    fn authenticate(
        &self,
        ticket: Ticket,
        token: Option<&SecretString>,
        user: SessionUser,
    ) -> Result<SessionUser, SessionError> {
        self.settle(ticket, |state| {
            if let Some(token) = token {
                self.inner.tokens.set(token)?;
            }
            if let Err(e) = self.inner.hints.set(&user) {
                tracing::warn!(error = %e, "Failed to cache user");
            }
            *state = SessionState::Authenticated(user.clone());
            Ok(user)
        })
    }

    /// Advance the generation, drop the credential and publish `Anonymous`.
    fn tear_down(&self, generation: &mut u64) -> Result<(), StorageError> {
        *generation = generation.wrapping_add(1);
        let cleared = self.clear_credentials();
        self.inner.state.send_modify(|snap| {
            snap.state = SessionState::Anonymous;
            snap.busy = false;
        });
        cleared
    }

    /// Tear the session down after the API rejected the credential.
    ///
    /// Applies only if no newer operation has started since `ticket`, and
    /// advances the generation so in-flight operations are discarded.
    fn expire(&self, ticket: Ticket, message: String) -> SessionError {
        let mut generation = self.generation();
        if *generation != ticket.0 {
            return SessionError::Superseded;
        }
        let cleared = self.tear_down(&mut generation);
        drop(generation);

        match cleared {
            Err(e) => e.into(),
            Ok(()) => {
                tracing::info!(reason = %message, "Session expired");
                SessionError::Authentication(message)
            }
        }
    }

    /// Route an API failure: rejection tears the session down, anything
    /// else passes through.
    fn fail(&self, ticket: Ticket, err: SessionError) -> SessionError {
        match err {
            SessionError::Authentication(message) => self.expire(ticket, message),
            other => other,
        }
    }

    fn clear_credentials(&self) -> Result<(), StorageError> {
        let token = self.inner.tokens.clear();
        let hint = self.inner.hints.clear();
        token.and(hint)
    }

    /// The stored credential; tears down if there is none.
    fn require_token(&self) -> Result<SecretString, SessionError> {
        match self.inner.tokens.get()? {
            Some(token) => Ok(token),
            None => Err(self.expire(self.observe(), "Not signed in".to_string())),
        }
    }
}

impl<B: IdentityBackend> SessionContext<B> {
    async fn resolve_user(&self, token: &SecretString) -> Result<SessionUser, SessionError> {
        let raw = self.inner.backend.fetch_current_user(token).await?;
        Ok(normalize(&raw)?)
    }

    /// Resolve the stored credential at startup.
    ///
    /// Returns the confirmed user, or `None` when no credential is stored.
    /// A rejected credential is cleared. On a network or payload failure
    /// the session becomes anonymous but the credential is kept, so a
    /// later [`refresh`](Self::refresh) can still succeed.
    ///
    /// # Errors
    ///
    /// `Authentication`, `Network`, `MalformedUser` as described above;
    /// `Superseded` if another operation took over meanwhile.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<Option<SessionUser>, SessionError> {
        let ticket = self.begin(Start::Loading);

        let token = match self.inner.tokens.get() {
            Ok(token) => token,
            Err(e) => {
                return self.settle(ticket, |state| {
                    *state = SessionState::Anonymous;
                    Err(e.into())
                });
            }
        };

        let Some(token) = token else {
            tracing::debug!("No stored credential");
            return self.settle(ticket, |state| {
                *state = SessionState::Anonymous;
                Ok(None)
            });
        };

        match self.resolve_user(&token).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, role = %user.role, "Session restored");
                self.authenticate(ticket, None, user).map(Some)
            }
            Err(SessionError::Authentication(message)) => Err(self.expire(ticket, message)),
            Err(e) => {
                tracing::warn!(error = %e, "Could not confirm stored credential");
                self.settle(ticket, |state| {
                    *state = SessionState::Anonymous;
                    Err(e)
                })
            }
        }
    }

    /// Sign in with email and password.
    ///
    /// The credential is persisted only once the user behind it has been
    /// fetched and understood. On any failure nothing is stored and the
    /// previous state is kept.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed email, `Authentication` for wrong
    /// credentials, `Network`, `MalformedUser`, `Storage`, `Superseded`.
    #[instrument(skip(self, password), fields(email = %email.trim()))]
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<SessionUser, SessionError> {
        let email = Email::parse(email).map_err(|e| SessionError::Validation(e.to_string()))?;
        let ticket = self.begin(Start::Busy);

        let outcome = async {
            let token = self.inner.backend.login(email.as_str(), password).await?;
            let user = self.resolve_user(&token).await?;
            Ok::<_, SessionError>((token, user))
        }
        .await;

        match outcome {
            Ok((token, user)) => {
                let user = self.authenticate(ticket, Some(&token), user)?;
                tracing::info!(user_id = %user.id, role = %user.role, "Signed in");
                Ok(user)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Sign in failed");
                self.finish(ticket);
                Err(e)
            }
        }
    }

    /// Create an account, then sign in with the same credentials.
    ///
    /// # Errors
    ///
    /// `Validation` for a form the client or server refuses, plus anything
    /// [`login`](Self::login) returns.
    #[instrument(skip(self, form), fields(email = %form.email.trim()))]
    pub async fn register(&self, form: &RegistrationForm) -> Result<SessionUser, SessionError> {
        let email = form.validate()?;
        let created = self.inner.backend.register(form).await?;

        match normalize(&created) {
            Ok(user) => tracing::info!(user_id = %user.id, role = %user.role, "Account created"),
            Err(e) => tracing::debug!(error = %e, "Registration response has no user record"),
        }

        self.login(email.as_str(), &form.password).await
    }

    /// Re-fetch the current user and replace the resident one wholesale.
    ///
    /// A missing or rejected credential ends the session. A network or
    /// payload failure leaves the resident user in place.
    ///
    /// # Errors
    ///
    /// `Authentication`, `Network`, `MalformedUser`, `Storage`, `Superseded`.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<SessionUser, SessionError> {
        let ticket = self.begin(Start::Busy);

        let token = match self.inner.tokens.get() {
            Ok(Some(token)) => token,
            Ok(None) => return Err(self.expire(ticket, "Not signed in".to_string())),
            Err(e) => {
                self.finish(ticket);
                return Err(e.into());
            }
        };

        let result = self.resolve_user(&token).await;
        self.conclude(ticket, result)
    }

    fn conclude(
        &self,
        ticket: Ticket,
        result: Result<SessionUser, SessionError>,
    ) -> Result<SessionUser, SessionError> {
        match result {
            Ok(user) => self.authenticate(ticket, None, user),
            Err(SessionError::Authentication(message)) => Err(self.expire(ticket, message)),
            Err(e) => {
                tracing::warn!(error = %e, "Could not refresh user");
                self.finish(ticket);
                Err(e)
            }
        }
    }

    /// End the session.
    ///
    /// The local teardown happens first and always takes effect; the
    /// server is then told on a best-effort basis.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` only if the stored credential could
    /// not be removed. The in-memory session is anonymous regardless.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), SessionError> {
        let token = self.inner.tokens.get().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read credential during logout");
            None
        });

        let cleared = {
            let mut generation = self.generation();
            self.tear_down(&mut generation)
        };

        if let Some(token) = token {
            if let Err(e) = self.inner.backend.logout(&token).await {
                tracing::warn!(error = %e, "Server-side logout failed");
            }
        }

        tracing::info!("Signed out");
        cleared.map_err(Into::into)
    }

    /// Update phone and driving licence; the API's answer replaces the
    /// resident user.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed licence or a refused update, plus the
    /// errors of [`refresh`](Self::refresh).
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<SessionUser, SessionError> {
        update.validate()?;
        let token = self.require_token()?;
        let ticket = self.begin(Start::Busy);

        let result = match self.inner.backend.update_profile(&token, update).await {
            Ok(raw) => normalize(&raw).map_err(SessionError::from),
            Err(e) => Err(e.into()),
        };
        self.conclude(ticket, result)
    }

    /// Ask to become an owner, then refresh so the role reads
    /// `PENDING_OWNER`.
    ///
    /// # Errors
    ///
    /// `Validation` when the form is incomplete, when a request is already
    /// pending or the user already owns, or when the API refuses it (its
    /// message is kept). `Authentication` when nobody is signed in.
    #[instrument(skip(self, form))]
    pub async fn request_owner_upgrade(
        &self,
        form: &OwnerUpgradeForm,
    ) -> Result<SessionUser, SessionError> {
        match role_gate::owner_call_to_action(self.current_user().as_ref()) {
            OwnerCallToAction::Offer => {}
            OwnerCallToAction::PendingReview => {
                return Err(SessionError::Validation(
                    "Your owner request is already waiting for review".to_string(),
                ));
            }
            OwnerCallToAction::AlreadyOwner => {
                return Err(SessionError::Validation(
                    "You are already an owner".to_string(),
                ));
            }
            OwnerCallToAction::Hidden => {
                return Err(SessionError::Authentication("Not signed in".to_string()));
            }
        }
        form.validate()?;

        let token = self.require_token()?;
        let ticket = self.observe();
        self.inner
            .backend
            .request_owner_upgrade(&token, form)
            .await
            .map_err(|e| self.fail(ticket, e.into()))?;

        tracing::info!("Owner upgrade requested");
        self.refresh().await
    }
}

impl<B: IdentityBackend + OwnerReviewBackend> SessionContext<B> {
    fn require_admin(&self) -> Result<SecretString, SessionError> {
        let user = self.current_user();
        if !role_gate::has_capability(user.as_ref(), Capability::ReviewOwnerRequests) {
            return Err(SessionError::Forbidden(
                "Only administrators can review owner requests".to_string(),
            ));
        }
        self.require_token()
    }

    /// Owner upgrade requests waiting for review.
    ///
    /// # Errors
    ///
    /// `Forbidden` unless the resident user is an admin; API errors
    /// otherwise, with a rejected credential ending the session.
    #[instrument(skip(self))]
    pub async fn pending_owner_requests(&self) -> Result<Vec<OwnerRequest>, SessionError> {
        let token = self.require_admin()?;
        let ticket = self.observe();
        self.inner
            .backend
            .pending_owner_requests(&token)
            .await
            .map_err(|e| self.fail(ticket, e.into()))
    }

    /// Promote `user_id` to owner. Returns the server's message.
    ///
    /// # Errors
    ///
    /// As for [`pending_owner_requests`](Self::pending_owner_requests).
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn approve_owner_request(&self, user_id: UserId) -> Result<String, SessionError> {
        let token = self.require_admin()?;
        let ticket = self.observe();
        let message = self
            .inner
            .backend
            .approve_owner_request(&token, user_id)
            .await
            .map_err(|e| self.fail(ticket, e.into()))?;
        tracing::info!("Owner request approved");
        Ok(message)
    }

    /// Turn down the request of `user_id`. Returns the server's message.
    ///
    /// # Errors
    ///
    /// As for [`pending_owner_requests`](Self::pending_owner_requests).
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn reject_owner_request(&self, user_id: UserId) -> Result<String, SessionError> {
        let token = self.require_admin()?;
        let ticket = self.observe();
        let message = self
            .inner
            .backend
            .reject_owner_request(&token, user_id)
            .await
            .map_err(|e| self.fail(ticket, e.into()))?;
        tracing::info!("Owner request rejected");
        Ok(message)
    }
}
