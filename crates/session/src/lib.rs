//! Session and role state for the Minefornow rental client.
//!
//! A [`SessionContext`] owns the signed-in identity: it resolves a stored
//! bearer credential at startup, signs users in and out, keeps the resident
//! [`SessionUser`](minefornow_core::SessionUser) fresh and publishes every
//! change to subscribers. The [`role_gate`] functions turn that user into
//! navigation and dashboard decisions.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use minefornow_session::{ApiClient, ClientConfig, FileStorage, SessionContext};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let api = ApiClient::new(&config)?;
//! let session = SessionContext::new(api, Arc::new(FileStorage::new(config.state_file.clone())));
//!
//! if let Some(user) = session.initialize().await? {
//!     println!("Welcome back, {}", user.full_name);
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod forms;
pub mod normalize;
pub mod role_gate;
pub mod storage;
pub mod token;

pub use api::{ApiClient, ApiError, IdentityBackend, OwnerRequest, OwnerReviewBackend};
pub use config::{ClientConfig, ConfigError};
pub use context::{SessionContext, SessionSnapshot, SessionState};
pub use error::SessionError;
pub use forms::{FormError, OwnerUpgradeForm, ProfileUpdate, RegistrationForm};
pub use normalize::{NormalizeError, normalize};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};
pub use token::{TokenStore, UserHint, UserHintStore};
