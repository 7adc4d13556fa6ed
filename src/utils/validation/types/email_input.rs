//! Represents a validated email address.
//!
//! Addresses are trimmed, checked against the HTML5 email grammar with the
//! validator crate, then lower-cased so that lookups by email are exact.

use anyhow::{bail, Result};
use std::fmt;
use validator::ValidateEmail;

use crate::utils::validation::MAX_EMAIL_LENGTH;

/// A validated, lower-cased email address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EmailInput {
    email: String,
}

impl EmailInput {
    /// Creates a new `EmailInput` after validating the provided email string.
    ///
    /// # Returns
    /// * `Ok(EmailInput)` if the email is valid
    /// * `Err` with a descriptive message if validation fails
    pub fn new(email: &str) -> Result<Self> {
        let email_trimmed = email.trim();

        if email_trimmed.is_empty() {
            bail!("Email address cannot be empty");
        }

        if email_trimmed.len() > MAX_EMAIL_LENGTH {
            bail!("Email address exceeds maximum length of {MAX_EMAIL_LENGTH} characters");
        }

        if !email_trimmed.validate_email() {
            bail!("Invalid email format");
        }

        Ok(Self {
            email: email_trimmed.to_lowercase(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.email
    }

    pub fn into_inner(self) -> String {
        self.email
    }
}

impl fmt::Display for EmailInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.email)
    }
}

impl AsRef<str> for EmailInput {
    fn as_ref(&self) -> &str {
        &self.email
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        let valid_emails = vec![
            "doctor@clinic.org",
            "first.last@hospital.example.com",
            "patient+xray@example.com",
            "CHEF@CLINIC.ORG",        // Normalized to lowercase
            "   nurse@clinic.org   ", // Trimmed
        ];

        for email in valid_emails {
            assert!(EmailInput::new(email).is_ok(), "Should accept valid email: {email}");
        }
    }

    #[test]
    fn test_invalid_emails() {
        let too_long = format!("{}@example.com", "a".repeat(MAX_EMAIL_LENGTH));
        let invalid_emails = vec![
            "",
            " ",
            "not-an-email",
            "@example.com",
            "user@",
            "user@.",
            "user@.com",
            "user name@example.com",
            &too_long,
        ];

        for email in invalid_emails {
            assert!(EmailInput::new(email).is_err(), "Should reject invalid email: {email}");
        }
    }

    #[test]
    fn test_email_normalization() {
        let email = EmailInput::new("   Dr.House@Example.COM   ").unwrap();
        assert_eq!(email.as_str(), "dr.house@example.com");
        assert_eq!(email.to_string(), "dr.house@example.com");
        assert_eq!(email.into_inner(), "dr.house@example.com");
    }
}
