//! Backend user payload → [`SessionUser`].
//!
//! The marketplace API has shipped several spellings of the same user record
//! over time:
//!
//! | field | accepted keys, first match wins |
//! |-------|---------------------------------|
//! | id | `id`, `userId`, `user_id` |
//! | email | `email` |
//! | name | `fullName`, `full_name`, `name` |
//! | role | `role`, `userRole`, `user_role` |
//!
//! This module is the only place that knows about them.

use minefornow_core::{Email, EmailError, RoleParseError, SessionUser, UserId, UserRole};
use serde_json::{Map, Value};
use thiserror::Error;

const ID_KEYS: &[&str] = &["id", "userId", "user_id"];
const NAME_KEYS: &[&str] = &["fullName", "full_name", "name"];
const ROLE_KEYS: &[&str] = &["role", "userRole", "user_role"];

/// Why a payload could not be turned into a [`SessionUser`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// The payload is not a JSON object.
    #[error("user payload is not an object")]
    NotAnObject,

    /// A required field is absent or null under every known spelling.
    #[error("user payload has no {0}")]
    MissingField(&'static str),

    /// The id is present but not a positive integer.
    #[error("user payload has an unusable id: {0}")]
    InvalidId(String),

    /// The email is present but not a valid address.
    #[error("user payload has an invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The role is present but unknown.
    #[error("user payload has an unknown role: {0}")]
    InvalidRole(#[from] RoleParseError),
}

/// Reduce a raw user payload to the canonical shape.
///
/// Missing names fall back to the email's local part.
///
/// # Errors
///
/// Returns `NormalizeError` if no usable id, email and role can be extracted.
pub fn normalize(raw: &Value) -> Result<SessionUser, NormalizeError> {
    let fields = raw.as_object().ok_or(NormalizeError::NotAnObject)?;

    let id = parse_id(first_present(fields, ID_KEYS).ok_or(NormalizeError::MissingField("id"))?)?;

    let email = first_present(fields, &["email"])
        .and_then(Value::as_str)
        .ok_or(NormalizeError::MissingField("email"))?;
    let email = Email::parse(email)?;

    let role = first_present(fields, ROLE_KEYS)
        .and_then(Value::as_str)
        .ok_or(NormalizeError::MissingField("role"))?
        .parse::<UserRole>()?;

    let full_name = first_present(fields, NAME_KEYS)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map_or_else(|| email.local_part().to_owned(), ToOwned::to_owned);

    Ok(SessionUser {
        id,
        email,
        full_name,
        role,
    })
}

fn first_present<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| !value.is_null())
}

fn parse_id(value: &Value) -> Result<UserId, NormalizeError> {
    let id = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    id.filter(|id| *id > 0)
        .map(UserId::new)
        .ok_or_else(|| NormalizeError::InvalidId(value.to_string()))
}
