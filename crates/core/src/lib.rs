//! Minefornow Core - Shared identity types.
//!
//! This crate provides the types every Minefornow client component agrees on:
//! - `session` - Session state, token storage and role gating
//! - `cli` - The `mfn` terminal client
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for user IDs, emails, roles and the session user

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
