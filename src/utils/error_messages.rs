//! Messages d'erreur renvoyés aux clients

pub const INVALID_BODY: &str = "Invalid request body";

pub const LOGIN_ERROR: &str = "Invalid credentials";

pub const REGISTRATION_ERROR: &str = "Failed to create user";

pub const INVALID_CREATOR: &str = "Invalid creator";

pub const USER_EXISTS: &str = "User already exists";

pub const MISSING_TOKEN: &str = "Authorization token required";

pub const AUTH_FAILED: &str = "Invalid or expired token";

pub const ACCESS_DENIED: &str = "Access denied";

pub const MISSING_IMAGE: &str = "Image file is required";

pub const INVALID_REPORT_ID: &str = "Invalid report ID";

pub const INVALID_PATIENT_ID: &str = "Invalid patient ID";

pub const REPORT_NOT_FOUND: &str = "Report not found";

pub const PATIENT_NOT_FOUND: &str = "Patient not found";

pub const MISSING_PATIENT_EMAIL: &str = "Patient has no email address";

pub const ANALYSIS_FAILED: &str = "Failed to analyze image";

pub const INTERNAL_ERROR: &str = "Internal server error";
