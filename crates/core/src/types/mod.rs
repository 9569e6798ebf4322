//! Core types for Minefornow.
//!
//! This module provides type-safe wrappers for identity concepts.

pub mod email;
pub mod id;
pub mod role;
pub mod user;

pub use email::{Email, EmailError};
pub use id::*;
pub use role::{RoleParseError, UserRole};
pub use user::SessionUser;
