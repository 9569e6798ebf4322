//! Minefornow CLI - Account and session management from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password may also come from MINEFORNOW_PASSWORD)
//! mfn login -e maria@example.com -p 'Secret123'
//!
//! # Show the signed-in user
//! mfn whoami
//!
//! # Apply to list cars
//! mfn become-owner --phone 912345678 --citizen-card 12345678 \
//!     --driving-license AB123456 --motivation "Weekend car sits idle"
//!
//! # Review owner applications (admins)
//! mfn requests list
//! mfn requests approve 42
//! ```
//!
//! # Commands
//!
//! - `login`, `register`, `logout` - Start and end a session
//! - `whoami`, `refresh` - Show or re-confirm the current user
//! - `profile` - Update phone and driving licence
//! - `become-owner` - Request the owner role
//! - `tabs` - Show dashboard tabs and route access for the current role
//! - `requests` - Review owner upgrade requests

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use clap::{Parser, Subcommand};
use minefornow_core::UserId;
use minefornow_session::{ApiClient, ClientConfig, FileStorage, SessionContext};
use secrecy::SecretString;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "mfn")]
#[command(author, version, about = "Minefornow account tools")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "MINEFORNOW_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        /// Full name shown to other users
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "MINEFORNOW_PASSWORD", hide_env_values = true)]
        password: String,

        /// Password confirmation (defaults to the password)
        #[arg(long)]
        confirm_password: Option<String>,
    },
    /// Sign out and forget the stored credential
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Re-fetch the signed-in user from the server
    Refresh,
    /// Update profile details
    Profile {
        #[arg(long)]
        phone: Option<String>,

        /// Driving licence number, e.g. `AB123456`
        #[arg(long)]
        driving_license: Option<String>,
    },
    /// Ask to become a car owner
    BecomeOwner {
        #[arg(long)]
        phone: String,

        #[arg(long)]
        citizen_card: String,

        #[arg(long)]
        driving_license: String,

        #[arg(long)]
        motivation: String,
    },
    /// Show dashboard tabs and route access for the current role
    Tabs,
    /// Review owner upgrade requests (admins only)
    Requests {
        #[command(subcommand)]
        action: RequestsAction,
    },
}

#[derive(Subcommand)]
enum RequestsAction {
    /// List requests waiting for review
    List,
    /// Approve a user's request
    Approve {
        /// Id of the requesting user
        user_id: UserId,
    },
    /// Reject a user's request
    Reject {
        /// Id of the requesting user
        user_id: UserId,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Warnings and errors become Sentry events; info and debug become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mfn=info,minefornow_session=warn".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer().without_time()))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(cli.json);
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing(cli.json);

    if let Err(e) = run(cli, &config).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &ClientConfig) -> Result<(), CliError> {
    let api = ApiClient::new(config)?;
    let session = SessionContext::new(api, Arc::new(FileStorage::new(config.state_file.clone())));

    match cli.command {
        Commands::Login { email, password } => {
            commands::account::login(&session, &email, &SecretString::from(password)).await?;
        }
        Commands::Register {
            name,
            email,
            password,
            confirm_password,
        } => {
            let confirm_password = confirm_password.unwrap_or_else(|| password.clone());
            commands::account::register(
                &session,
                name,
                email,
                SecretString::from(password),
                SecretString::from(confirm_password),
            )
            .await?;
        }
        Commands::Logout => commands::account::logout(&session).await?,
        Commands::Whoami => commands::account::whoami(&session).await?,
        Commands::Refresh => commands::account::refresh(&session).await?,
        Commands::Profile {
            phone,
            driving_license,
        } => commands::account::update_profile(&session, phone, driving_license).await?,
        Commands::BecomeOwner {
            phone,
            citizen_card,
            driving_license,
            motivation,
        } => {
            commands::account::become_owner(
                &session,
                phone,
                citizen_card,
                driving_license,
                motivation,
            )
            .await?;
        }
        Commands::Tabs => commands::dashboard::tabs(&session).await?,
        Commands::Requests { action } => match action {
            RequestsAction::List => commands::requests::list(&session).await?,
            RequestsAction::Approve { user_id } => {
                commands::requests::approve(&session, user_id).await?;
            }
            RequestsAction::Reject { user_id } => {
                commands::requests::reject(&session, user_id).await?;
            }
        },
    }
    Ok(())
}
