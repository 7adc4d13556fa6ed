//! Configuration du processus, chargée une seule fois au démarrage.
//!
//! Toutes les valeurs viennent de l'environnement (éventuellement d'un fichier
//! `.env`). Les secrets n'ont jamais de valeur par défaut.

use std::{env, fmt, path::PathBuf, time::Duration};

use thiserror::Error;
use url::Url;

use crate::consts;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Identifiants du relais SMTP
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration complète de l'application
#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub jwt_secret: Vec<u8>,
    pub analysis_url: Url,
    pub http_timeout: Duration,
    pub mongo_uri: String,
    pub mongo_db: String,
    pub data_path: Option<PathBuf>,
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    /// Lit la configuration depuis les variables d'environnement du processus.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construit la configuration à partir d'une fonction de lecture des clés.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                reason: format!("'{raw}' is not a port number"),
            })?,
            None => consts::HTTP_PORT,
        };

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < consts::MIN_SECRET_LENGTH {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET",
                reason: format!("must be at least {} bytes", consts::MIN_SECRET_LENGTH),
            });
        }

        let raw_url = get("PYTHON_SERVICE_URL")
            .unwrap_or_else(|| consts::DEFAULT_ANALYSIS_URL.to_string());
        let analysis_url = Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
            name: "PYTHON_SERVICE_URL",
            reason: e.to_string(),
        })?;
        if !matches!(analysis_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                name: "PYTHON_SERVICE_URL",
                reason: "scheme must be http or https".to_string(),
            });
        }

        let timeout_secs = match get("HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid {
                    name: "HTTP_TIMEOUT_SECS",
                    reason: format!("'{raw}' is not a positive number of seconds"),
                })?,
            None => consts::DEFAULT_HTTP_TIMEOUT_SECS,
        };

        let smtp = match (get("EMAIL_USER"), get("EMAIL_PASSWORD")) {
            (Some(username), Some(password)) => {
                let port = match get("SMTP_PORT") {
                    Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                        name: "SMTP_PORT",
                        reason: format!("'{raw}' is not a port number"),
                    })?,
                    None => consts::DEFAULT_SMTP_PORT,
                };
                Some(SmtpConfig {
                    host: get("SMTP_HOST").unwrap_or_else(|| consts::DEFAULT_SMTP_HOST.to_string()),
                    port,
                    username,
                    password,
                })
            }
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("EMAIL_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("EMAIL_USER")),
        };

        Ok(Self {
            port,
            jwt_secret: jwt_secret.into_bytes(),
            analysis_url,
            http_timeout: Duration::from_secs(timeout_secs),
            mongo_uri: get("MONGO_URI").unwrap_or_else(|| consts::DEFAULT_MONGO_URI.to_string()),
            mongo_db: get("MONGO_DB").unwrap_or_else(|| consts::DEFAULT_MONGO_DB.to_string()),
            data_path: get("DATA_PATH").map(PathBuf::from),
            smtp,
        })
    }
}
