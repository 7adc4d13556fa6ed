//! Client du service externe d'analyse de radiographies.
//!
//! Le service reçoit l'image en multipart (champ `file`) et répond un
//! [`AnalysisResult`] en JSON. Seules les pannes de transport (connexion,
//! délai dépassé) sont retentées; une réponse reçue n'est jamais rejouée.

use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use log::{error, info};
use reqwest::multipart::{Form, Part};
use thiserror::Error;
use url::Url;

use crate::consts::{RETRY_ATTEMPTS, RETRY_BASE_DELAY_MS};
use crate::models::AnalysisResult;
use crate::utils::retry::with_backoff;
use crate::utils::validation::FileInput;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis service unreachable: {0}")]
    Transport(String),

    #[error("could not read analysis response: {0}")]
    Body(String),

    #[error("analysis service answered {0}")]
    UpstreamStatus(StatusCode),

    #[error("could not decode analysis response: {0}")]
    Decode(String),
}

/// Réponse du service: son code HTTP et le résultat décodé
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub status: StatusCode,
    pub result: AnalysisResult,
}

impl AnalysisOutcome {
    /// Exige un code 2xx.
    pub fn into_success(self) -> Result<AnalysisResult, AnalysisError> {
        if self.status.is_success() {
            Ok(self.result)
        } else {
            Err(AnalysisError::UpstreamStatus(self.status))
        }
    }
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, image: &FileInput) -> Result<AnalysisOutcome, AnalysisError>;
}

/// Analyseur qui appelle le service HTTP configuré
pub struct HttpAnalyzer {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpAnalyzer {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, endpoint })
    }

    async fn send_once(&self, image: &FileInput) -> Result<reqwest::Response, reqwest::Error> {
        let part = Part::bytes(image.content().to_vec())
            .file_name(image.filename().to_string())
            .mime_str(image.mime())?;
        let form = Form::new().part("file", part);

        self.client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
    }
}

#[async_trait]
impl Analyzer for HttpAnalyzer {
    async fn analyze(&self, image: &FileInput) -> Result<AnalysisOutcome, AnalysisError> {
        info!(
            "Sending {} ({} bytes) to {}",
            image.filename(),
            image.content().len(),
            self.endpoint
        );

        let response = with_backoff(
            RETRY_ATTEMPTS,
            Duration::from_millis(RETRY_BASE_DELAY_MS),
            |e: &reqwest::Error| e.is_connect() || e.is_timeout(),
            || self.send_once(image),
        )
        .await
        .map_err(|e| {
            error!("Analysis request failed: {e}");
            AnalysisError::Transport(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AnalysisError::Body(e.to_string()))?;

        let result: AnalysisResult =
            serde_json::from_slice(&body).map_err(|e| AnalysisError::Decode(e.to_string()))?;

        info!("Analysis answered {status} (detected: {})", result.detected);
        Ok(AnalysisOutcome { status, result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Multipart, http::StatusCode, routing::post, Json, Router};
    use image::ImageFormat;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    use crate::utils::validation::FileInput;

    fn xray() -> FileInput {
        let img = image::RgbImage::new(32, 32);
        let mut buffer = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png).unwrap();
        FileInput::new(&buffer, "wrist.png").unwrap()
    }

    /// Starts a stub analysis service and returns its endpoint
    async fn stub(router: Router) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/analyze")).unwrap()
    }

    async fn echo_upload(mut multipart: Multipart) -> (StatusCode, Json<Value>) {
        while let Some(field) = multipart.next_field().await.unwrap() {
            if field.name() == Some("file") {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.unwrap();
                let summary = format!(
                    "{} {} {}",
                    file_name.unwrap_or_default(),
                    content_type.unwrap_or_default(),
                    !bytes.is_empty()
                );
                return (
                    StatusCode::OK,
                    Json(json!({
                        "detected": true,
                        "type": summary,
                        "recovery_time": 42,
                        "confidence": 0.8
                    })),
                );
            }
        }
        (StatusCode::BAD_REQUEST, Json(json!({ "detected": false })))
    }

    fn analyzer(endpoint: Url) -> HttpAnalyzer {
        HttpAnalyzer::new(endpoint, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_image_is_sent_as_multipart_file_field() {
        let endpoint = stub(Router::new().route("/analyze", post(echo_upload))).await;

        let outcome = analyzer(endpoint).analyze(&xray()).await.unwrap();
        assert_eq!(outcome.status, StatusCode::OK);
        assert_eq!(outcome.result.fracture_type.as_deref(), Some("wrist.png image/png true"));
        assert_eq!(outcome.result.recovery_label(), "42 days");
        assert_eq!(outcome.result.image_base64, None);
    }

    #[tokio::test]
    async fn test_upstream_status_is_relayed() {
        let endpoint = stub(Router::new().route(
            "/analyze",
            post(|| async {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "detected": false })),
                )
            }),
        ))
        .await;

        let outcome = analyzer(endpoint).analyze(&xray()).await.unwrap();
        assert_eq!(outcome.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(matches!(
            outcome.into_success(),
            Err(AnalysisError::UpstreamStatus(StatusCode::UNPROCESSABLE_ENTITY))
        ));
    }

    #[tokio::test]
    async fn test_unparseable_body_is_a_decode_error() {
        let endpoint = stub(Router::new().route("/analyze", post(|| async { "not json" }))).await;

        let err = analyzer(endpoint).analyze(&xray()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Decode(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_a_transport_error() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = Url::parse(&format!("http://{addr}/analyze")).unwrap();
        let err = analyzer(endpoint).analyze(&xray()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Transport(_)), "{err:?}");
    }
}
