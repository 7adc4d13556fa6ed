//! Utilitaires partagés: erreurs, validation des entrées, mots de passe,
//! jetons et nouvelles tentatives.

pub mod error_messages;
pub mod password_utils;
pub mod retry;
pub mod token;
pub mod validation;
