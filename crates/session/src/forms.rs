//! Client-side form validation.
//!
//! These checks mirror the API's own request validation, so an obviously
//! bad form is rejected before a round-trip. The server remains the
//! authority; its 4xx messages are surfaced verbatim.

use std::sync::LazyLock;

use minefornow_core::{Email, EmailError};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Portuguese driving licence number: two letters and six digits.
static DRIVING_LICENSE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}[0-9]{6}$").ok());

/// A form field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    /// A required field is blank.
    #[error("{0} is required")]
    Required(&'static str),

    /// The email address is malformed.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The password does not meet the strength rules.
    #[error("password must be at least 8 characters with upper and lower case letters and a digit")]
    WeakPassword,

    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Driving licence number has the wrong format.
    #[error("driving license must be two uppercase letters followed by six digits")]
    InvalidDrivingLicense,
}

/// Account registration form.
#[derive(Debug, Clone)]
pub struct RegistrationForm {
    pub full_name: String,
    pub email: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
}

impl RegistrationForm {
    /// Check the form and return the parsed email.
    ///
    /// # Errors
    ///
    /// Returns the first `FormError` found, in field order.
    pub fn validate(&self) -> Result<Email, FormError> {
        if self.full_name.trim().is_empty() {
            return Err(FormError::Required("full name"));
        }
        let email = Email::parse(&self.email)?;

        let password = self.password.expose_secret();
        if password.is_empty() {
            return Err(FormError::Required("password"));
        }
        if !is_strong_password(password) {
            return Err(FormError::WeakPassword);
        }
        if self.confirm_password.expose_secret().is_empty() {
            return Err(FormError::Required("password confirmation"));
        }
        if password != self.confirm_password.expose_secret() {
            return Err(FormError::PasswordMismatch);
        }

        Ok(email)
    }
}

/// Editable profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub phone: Option<String>,
    pub driving_license: Option<String>,
}

impl ProfileUpdate {
    /// Check the driving licence format when one is given.
    ///
    /// # Errors
    ///
    /// Returns `FormError::InvalidDrivingLicense` for a malformed licence.
    pub fn validate(&self) -> Result<(), FormError> {
        match self.driving_license.as_deref().map(str::trim) {
            Some(license) if !license.is_empty() && !is_driving_license(license) => {
                Err(FormError::InvalidDrivingLicense)
            }
            _ => Ok(()),
        }
    }
}

/// Request to be promoted from renter to owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerUpgradeForm {
    pub phone: String,
    pub citizen_card_number: String,
    pub driving_license: String,
    pub motivation: String,
}

impl OwnerUpgradeForm {
    /// Every field is required; the licence must match the national format.
    ///
    /// # Errors
    ///
    /// Returns the first `FormError` found, in field order.
    pub fn validate(&self) -> Result<(), FormError> {
        if self.phone.trim().is_empty() {
            return Err(FormError::Required("phone"));
        }
        if self.citizen_card_number.trim().is_empty() {
            return Err(FormError::Required("citizen card number"));
        }
        if self.driving_license.trim().is_empty() {
            return Err(FormError::Required("driving license"));
        }
        if !is_driving_license(self.driving_license.trim()) {
            return Err(FormError::InvalidDrivingLicense);
        }
        if self.motivation.trim().is_empty() {
            return Err(FormError::Required("motivation"));
        }
        Ok(())
    }
}

fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

fn is_driving_license(value: &str) -> bool {
    DRIVING_LICENSE
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registration(password: &str, confirm: &str) -> RegistrationForm {
        RegistrationForm {
            full_name: "Ana Silva".to_string(),
            email: "ana@example.com".to_string(),
            password: SecretString::from(password),
            confirm_password: SecretString::from(confirm),
        }
    }

    #[test]
    fn test_registration_accepts_valid_form() {
        let email = registration("Secret123", "Secret123").validate().unwrap();
        assert_eq!(email.as_str(), "ana@example.com");
    }

    #[test]
    fn test_registration_rules() {
        assert_eq!(
            registration("secret123", "secret123").validate(),
            Err(FormError::WeakPassword)
        );
        assert_eq!(
            registration("Short1", "Short1").validate(),
            Err(FormError::WeakPassword)
        );
        assert_eq!(
            registration("Secret123", "Secret124").validate(),
            Err(FormError::PasswordMismatch)
        );
        assert_eq!(
            registration("Secret123", "").validate(),
            Err(FormError::Required("password confirmation"))
        );

        let mut form = registration("Secret123", "Secret123");
        form.full_name = "  ".to_string();
        assert_eq!(form.validate(), Err(FormError::Required("full name")));

        let mut form = registration("Secret123", "Secret123");
        form.email = "ana".to_string();
        assert!(matches!(form.validate(), Err(FormError::InvalidEmail(_))));
    }

    #[test]
    fn test_owner_upgrade_rules() {
        let form = OwnerUpgradeForm {
            phone: "912345678".to_string(),
            citizen_card_number: "12345678".to_string(),
            driving_license: "AB123456".to_string(),
            motivation: "I have two cars I rarely use".to_string(),
        };
        assert!(form.validate().is_ok());

        let bad_license = OwnerUpgradeForm {
            driving_license: "ab123456".to_string(),
            ..form.clone()
        };
        assert_eq!(bad_license.validate(), Err(FormError::InvalidDrivingLicense));

        let no_motivation = OwnerUpgradeForm {
            motivation: String::new(),
            ..form
        };
        assert_eq!(no_motivation.validate(), Err(FormError::Required("motivation")));
    }

    #[test]
    fn test_profile_update_license_is_optional() {
        assert!(ProfileUpdate::default().validate().is_ok());
        assert!(
            ProfileUpdate {
                phone: Some("912345678".to_string()),
                driving_license: Some("PT654321".to_string()),
            }
            .validate()
            .is_ok()
        );
        assert_eq!(
            ProfileUpdate {
                phone: None,
                driving_license: Some("123".to_string()),
            }
            .validate(),
            Err(FormError::InvalidDrivingLicense)
        );
    }
}
