//! Point d'entrée principal de l'application.
//! Charge la configuration, construit le magasin, le client d'analyse et
//! l'expéditeur d'emails, puis démarre le serveur web avec Axum.

use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use dotenv::dotenv;
use log::{info, warn};

use fracture_api::{
    analysis::HttpAnalyzer,
    backend::{router::get_router, state::AppState},
    config::Config,
    database::Store,
    email::{Mailer, Outbox, SmtpMailer},
    services::Service,
    utils::token::TokenKeys,
};

#[cfg(feature = "mongo")]
async fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    use fracture_api::database::mongo::MongoStore;

    let store = MongoStore::connect(&config.mongo_uri, &config.mongo_db, config.http_timeout)
        .await
        .context("Could not connect to MongoDB")?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "mongo"))]
async fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    use fracture_api::database::memory::MemoryStore;

    match &config.data_path {
        Some(path) => {
            info!("Using in-process store persisted to {}", path.display());
            let store = MemoryStore::open(path)
                .await
                .with_context(|| format!("Could not open {}", path.display()))?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATA_PATH not set, data will be lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn mailer(config: &Config) -> Result<Arc<dyn Mailer>> {
    match &config.smtp {
        Some(smtp) => {
            info!("Sending emails through {}:{}", smtp.host, smtp.port);
            let mailer = SmtpMailer::new(smtp, config.http_timeout)
                .context("Invalid SMTP configuration")?;
            Ok(Arc::new(mailer))
        }
        None => {
            warn!("EMAIL_USER/EMAIL_PASSWORD not set, emails are only logged");
            Ok(Arc::new(Outbox::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger les variables d'environnement
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().context("Invalid configuration")?;

    let store = open_store(&config).await?;
    let analyzer = HttpAnalyzer::new(config.analysis_url.clone(), config.http_timeout)
        .context("Could not build the analysis client")?;
    let service = Service::new(
        store,
        Arc::new(analyzer),
        mailer(&config)?,
        TokenKeys::new(&config.jwt_secret),
    );

    let app = get_router(AppState::new(service));

    // Démarrer le serveur web
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to open listener on {addr}"))?;
    info!("Listening on {addr}, analysis service at {}", config.analysis_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

/// Se termine au premier Ctrl-C. Sans gestionnaire de signal, le serveur
/// tourne jusqu'à ce que le processus soit tué.
async fn shutdown_signal() {
    shutdown_on(tokio::signal::ctrl_c()).await
}

async fn shutdown_on(signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => info!("Shutting down"),
        Err(e) => {
            warn!("Cannot listen for Ctrl-C, graceful shutdown disabled: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_stops_the_server() {
        let signal = async { Ok(()) };
        let stopped = tokio::time::timeout(Duration::from_secs(1), shutdown_on(signal)).await;
        assert!(stopped.is_ok());
    }

    #[tokio::test]
    async fn test_missing_signal_handler_keeps_serving() {
        let failing = async { Err(std::io::Error::other("no signal handler")) };
        let stopped = tokio::time::timeout(Duration::from_millis(100), shutdown_on(failing)).await;
        assert!(stopped.is_err());
    }
}
