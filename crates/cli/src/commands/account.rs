//! Sign-in, sign-out and profile commands.

use minefornow_session::{OwnerUpgradeForm, ProfileUpdate, RegistrationForm, SessionError};
use secrecy::SecretString;

use super::{CliError, Session, log_user, signed_in_user};

/// Sign in, replacing any stored credential on success.
pub async fn login(session: &Session, email: &str, password: &SecretString) -> Result<(), CliError> {
    let user = session.login(email, password).await?;
    tracing::info!("Signed in");
    log_user(&user);
    Ok(())
}

/// Create an account and sign in with it.
pub async fn register(
    session: &Session,
    full_name: String,
    email: String,
    password: SecretString,
    confirm_password: SecretString,
) -> Result<(), CliError> {
    let form = RegistrationForm {
        full_name,
        email,
        password,
        confirm_password,
    };
    let user = session.register(&form).await?;
    tracing::info!("Account created");
    log_user(&user);
    Ok(())
}

pub async fn logout(session: &Session) -> Result<(), CliError> {
    session.logout().await?;
    tracing::info!("Signed out");
    Ok(())
}

/// Show the confirmed user, or the cached one when the server is unreachable.
pub async fn whoami(session: &Session) -> Result<(), CliError> {
    match session.initialize().await {
        Ok(Some(user)) => log_user(&user),
        Ok(None) => tracing::info!("Not signed in"),
        Err(e) if e.is_transient() => {
            if let Some(hint) = session.user_hint() {
                tracing::warn!(
                    "Server unreachable; last confirmed as {} <{}> on {}",
                    hint.user.full_name,
                    hint.user.email,
                    hint.cached_at.format("%Y-%m-%d %H:%M UTC")
                );
            }
            return Err(e.into());
        }
        Err(SessionError::Authentication(_)) => {
            tracing::info!("Stored session has expired");
            return Err(CliError::NotSignedIn);
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Re-confirm the stored credential against the server.
pub async fn refresh(session: &Session) -> Result<(), CliError> {
    let user = session.refresh().await?;
    log_user(&user);
    Ok(())
}

pub async fn update_profile(
    session: &Session,
    phone: Option<String>,
    driving_license: Option<String>,
) -> Result<(), CliError> {
    signed_in_user(session).await?;
    let user = session
        .update_profile(&ProfileUpdate {
            phone,
            driving_license,
        })
        .await?;
    tracing::info!("Profile updated");
    log_user(&user);
    Ok(())
}

/// Submit an owner application; the role moves to `PENDING_OWNER`.
pub async fn become_owner(
    session: &Session,
    phone: String,
    citizen_card_number: String,
    driving_license: String,
    motivation: String,
) -> Result<(), CliError> {
    signed_in_user(session).await?;
    let form = OwnerUpgradeForm {
        phone,
        citizen_card_number,
        driving_license,
        motivation,
    };
    let user = session.request_owner_upgrade(&form).await?;
    tracing::info!("Owner request submitted; an administrator will review it");
    log_user(&user);
    Ok(())
}
