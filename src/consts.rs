//! Définition des constantes globales pour l'application.

pub const HTTP_PORT: u16 = 3000; // Port par défaut pour le serveur HTTP.
// Service d'analyse d'images.
pub const DEFAULT_ANALYSIS_URL: &str = "http://localhost:8000/analyze";
pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_MONGO_DB: &str = "fracture_detection_db";
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10; // Borne pour chaque appel sortant.

pub const USERS_COLLECTION: &str = "users";
pub const REPORTS_COLLECTION: &str = "reports";

pub const TOKEN_LIFETIME_HOURS: i64 = 24;
pub const MIN_SECRET_LENGTH: usize = 32; // Longueur minimale du secret HMAC, en octets.

pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024; // Taille maximale d'une radiographie.
// Marge pour les champs du formulaire.
pub const MAX_BODY_SIZE: usize = MAX_UPLOAD_SIZE + 1024 * 1024;

pub const RETRY_ATTEMPTS: u32 = 3;
pub const RETRY_BASE_DELAY_MS: u64 = 200;

pub const NOTIFICATION_SUBJECT: &str = "New X-ray Report Available";
