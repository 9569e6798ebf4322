//! Admin review of owner upgrade requests.

use minefornow_core::UserId;

use super::{CliError, Session, signed_in_user};

pub async fn list(session: &Session) -> Result<(), CliError> {
    signed_in_user(session).await?;
    let requests = session.pending_owner_requests().await?;

    if requests.is_empty() {
        tracing::info!("No pending owner requests");
        return Ok(());
    }

    tracing::info!("{} pending owner request(s):", requests.len());
    for request in &requests {
        tracing::info!(
            "  #{} {} <{}> licence {} - {}",
            request.id,
            request.full_name,
            request.email,
            request.driving_license.as_deref().unwrap_or("-"),
            request.motivation.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub async fn approve(session: &Session, user_id: UserId) -> Result<(), CliError> {
    signed_in_user(session).await?;
    let message = session.approve_owner_request(user_id).await?;
    tracing::info!("Approved request of user {user_id}. {message}");
    Ok(())
}

pub async fn reject(session: &Session, user_id: UserId) -> Result<(), CliError> {
    signed_in_user(session).await?;
    let message = session.reject_owner_request(user_id).await?;
    tracing::info!("Rejected request of user {user_id}. {message}");
    Ok(())
}
