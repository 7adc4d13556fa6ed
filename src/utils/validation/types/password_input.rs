//! Mot de passe en clair reçu d'un client, avant hachage.

use anyhow::{bail, Result};
use std::fmt;

use crate::utils::validation::MAX_PASSWORD_LENGTH;

/// Un mot de passe non vide et de longueur bornée.
///
/// La borne évite de faire travailler argon2 sur des entrées arbitrairement
/// longues. `Debug` ne montre jamais la valeur.
#[derive(Clone)]
pub struct PasswordInput(String);

impl PasswordInput {
    pub fn new(password: &str) -> Result<Self> {
        if password.is_empty() {
            bail!("Password cannot be empty");
        }
        if password.chars().count() > MAX_PASSWORD_LENGTH {
            bail!("Password exceeds maximum length of {MAX_PASSWORD_LENGTH} characters");
        }
        Ok(Self(password.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordInput(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_bounds() {
        assert!(PasswordInput::new("").is_err());
        assert!(PasswordInput::new("x").is_ok());
        assert!(PasswordInput::new(&"p".repeat(MAX_PASSWORD_LENGTH)).is_ok());
        assert!(PasswordInput::new(&"p".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let password = PasswordInput::new("hunter2-hunter2").unwrap();
        assert!(!format!("{password:?}").contains("hunter2"));
        assert_eq!(password.as_str(), "hunter2-hunter2");
    }
}
