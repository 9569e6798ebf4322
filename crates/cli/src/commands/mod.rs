//! Command implementations.
//!
//! Every command drives one [`SessionContext`](minefornow_session::SessionContext)
//! operation against the configured API and reports the outcome through
//! `tracing`.

pub mod account;
pub mod dashboard;
pub mod requests;

use minefornow_core::SessionUser;
use minefornow_session::{ApiClient, ApiError, SessionContext, SessionError};
use thiserror::Error;

/// The session handle every command works with.
pub type Session = SessionContext<ApiClient>;

/// Errors that end a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// A session operation failed; shown with its user-facing message.
    #[error("{}", .0.user_message())]
    Session(#[from] SessionError),

    /// The API client could not be created.
    #[error("Could not set up the API client: {0}")]
    Client(#[from] ApiError),

    /// The command needs a signed-in user.
    #[error("Not signed in. Run `mfn login` first.")]
    NotSignedIn,
}

/// Resolve the stored credential, requiring a confirmed user.
async fn signed_in_user(session: &Session) -> Result<SessionUser, CliError> {
    session.initialize().await?.ok_or(CliError::NotSignedIn)
}

fn log_user(user: &SessionUser) {
    tracing::info!(
        "{} <{}> (id {}, role {})",
        user.full_name,
        user.email,
        user.id,
        user.role
    );
}
