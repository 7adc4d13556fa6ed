//! Root module for the validation system.
//! Exposes the public API for input validation.

mod constants;
mod types;

pub use constants::*;
pub use types::{parse_age, EmailInput, FileInput, PasswordInput, PhoneInput, TextInput};
