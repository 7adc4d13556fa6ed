//! Constants used throughout the validation system

use crate::consts::MAX_UPLOAD_SIZE;

/// Maximum length for free-form notes
pub const MAX_CONTENT_LENGTH: usize = 2_000;
/// Maximum length for names and other short fields
pub const MAX_SHORT_CONTENT_LENGTH: usize = 250;
/// Maximum length accepted for a password before hashing
pub const MAX_PASSWORD_LENGTH: usize = 128;
/// Maximum length of an email address (RFC 5321)
pub const MAX_EMAIL_LENGTH: usize = 254;
/// Maximum size of an uploaded X-ray
pub const MAX_FILE_SIZE: usize = MAX_UPLOAD_SIZE;
/// Maximum accepted image dimensions, in pixels
pub const MAX_IMAGE_DIMENSIONS: (u32, u32) = (8192, 8192);
/// Oldest accepted patient age
pub const MAX_AGE: u32 = 150;
