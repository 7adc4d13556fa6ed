//! Envoi des notifications par email.
//!
//! Deux implémentations de [`Mailer`]: un relais SMTP réel et une boîte
//! d'envoi en mémoire, utilisée quand aucun identifiant SMTP n'est configuré.

use std::time::Duration;

use async_trait::async_trait;
use handlebars::Handlebars;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{self, authentication::Credentials},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use log::{error, info};
use once_cell::sync::Lazy;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::SmtpConfig;
use crate::consts::{RETRY_ATTEMPTS, RETRY_BASE_DELAY_MS};
use crate::utils::retry::with_backoff;

const NOTIFICATION_TEMPLATE: &str = include_str!("../templates/notification.hbs");

static HBS: Lazy<Handlebars<'static>> = Lazy::new(Handlebars::new);

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(String),

    #[error("could not build message: {0}")]
    Build(String),

    #[error("could not render message: {0}")]
    Render(String),

    #[error("{0}")]
    Relay(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError>;
}

/// Produit le corps HTML de la notification d'un nouveau rapport.
///
/// Les valeurs sont échappées par Handlebars.
pub fn render_notification(
    patient_name: &str,
    fracture_type: &str,
    recovery_time: &str,
) -> Result<String, MailError> {
    let fracture_type = if fracture_type.is_empty() { "None detected" } else { fracture_type };
    let recovery_time = if recovery_time.is_empty() { "N/A" } else { recovery_time };

    HBS.render_template(
        NOTIFICATION_TEMPLATE,
        &json!({
            "patient_name": patient_name,
            "fracture_type": fracture_type,
            "recovery_time": recovery_time,
        }),
    )
    .map_err(|e| MailError::Render(e.to_string()))
}

/// Relais SMTP authentifié (STARTTLS)
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, timeout: Duration) -> Result<Self, MailError> {
        let from: Mailbox = config
            .username
            .parse()
            .map_err(|e: lettre::address::AddressError| MailError::Address(e.to_string()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::Relay(e.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .timeout(Some(timeout))
            .build();

        Ok(Self { transport, from })
    }
}

/// Vrai pour une panne réseau, faux si le serveur a répondu
fn is_transport_failure(e: &smtp::Error) -> bool {
    e.is_timeout() || !(e.is_response() || e.is_transient() || e.is_permanent() || e.is_client())
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        let to: Mailbox = to
            .parse()
            .map_err(|e: lettre::address::AddressError| MailError::Address(e.to_string()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to.clone())
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .map_err(|e| MailError::Build(e.to_string()))?;

        with_backoff(
            RETRY_ATTEMPTS,
            Duration::from_millis(RETRY_BASE_DELAY_MS),
            is_transport_failure,
            || self.transport.send(message.clone()),
        )
        .await
        .map_err(|e| {
            error!("SMTP relay refused mail to {to}: {e}");
            MailError::Relay(e.to_string())
        })?;

        info!("Email sent to {to}");
        Ok(())
    }
}

/// Un message conservé par [`Outbox`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Boîte d'envoi en mémoire: rien ne quitte le processus.
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for Outbox {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        info!("Outbox: email to {to} with subject '{subject}' kept in memory");
        self.sent.lock().await.push(OutgoingEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_mentions_report_fields() {
        let html = render_notification("Jane Doe", "radius fracture", "30 days").unwrap();
        assert!(html.contains("Dear Jane Doe,"));
        assert!(html.contains("radius fracture"));
        assert!(html.contains("30 days"));
    }

    #[test]
    fn test_notification_escapes_html() {
        let html = render_notification("<script>x</script>", "", "").unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("None detected"));
        assert!(html.contains("N/A"));
    }

    #[tokio::test]
    async fn test_outbox_keeps_messages() {
        let outbox = Outbox::new();
        outbox.send("jane@example.com", "Hello", "<p>Hi</p>").await.unwrap();

        assert_eq!(
            outbox.sent().await,
            vec![OutgoingEmail {
                to: "jane@example.com".to_string(),
                subject: "Hello".to_string(),
                html: "<p>Hi</p>".to_string(),
            }]
        );
    }

    #[test]
    fn test_smtp_mailer_rejects_invalid_sender() {
        let config = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "not an address".to_string(),
            password: "secret".to_string(),
        };
        assert!(matches!(
            SmtpMailer::new(&config, Duration::from_secs(1)),
            Err(MailError::Address(_))
        ));
    }
}
