//! Numéro de téléphone et âge d'un patient.

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::utils::validation::MAX_AGE;

static PHONE_REGEX: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 ().-]{5,23}$").ok());

/// Un numéro de téléphone au format libre: chiffres, espaces, points,
/// tirets et parenthèses, avec un `+` initial optionnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneInput(String);

impl PhoneInput {
    pub fn new(phone: &str) -> Result<Self> {
        let phone = phone.trim();
        let Some(regex) = PHONE_REGEX.as_ref() else {
            bail!("Phone number validation is unavailable");
        };
        if !regex.is_match(phone) {
            bail!("Invalid phone number");
        }
        Ok(Self(phone.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PhoneInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Vérifie l'âge d'un patient.
pub fn parse_age(age: u32) -> Result<u32> {
    if age > MAX_AGE {
        bail!("Age must be between 0 and {MAX_AGE}");
    }
    Ok(age)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_numbers() {
        for phone in ["+41 79 123 45 67", "021.555.12.12", "(555) 123-4567", " 0791234567 "] {
            assert!(PhoneInput::new(phone).is_ok(), "Should accept: {phone}");
        }
        for phone in ["", "abc", "12", "+41 79 123 45 67 ext 9", "<b>0791234567</b>"] {
            assert!(PhoneInput::new(phone).is_err(), "Should reject: {phone}");
        }
        assert_eq!(PhoneInput::new(" 0791234567 ").unwrap().as_str(), "0791234567");
    }

    #[test]
    fn test_age_bounds() {
        assert_eq!(parse_age(0).unwrap(), 0);
        assert_eq!(parse_age(42).unwrap(), 42);
        assert!(parse_age(MAX_AGE + 1).is_err());
    }
}
