use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use conecta_api::mailer::{HttpMailer, LogMailer, Mailer};
use conecta_api::storage::Storage;
use conecta_api::{AppConfig, AppStateInner, build_router};
use conecta_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conecta=debug,tower_http=debug".into()),
        )
        .init();

    let config = AppConfig::from_env()?;

    let db = Database::open(&config.db_path)?;
    let storage = Storage::new(config.storage_dir.clone()).await?;

    let mailer: Arc<dyn Mailer> = match &config.email_api_key {
        Some(key) => {
            info!("Sending email through {}", config.email_api_url);
            Arc::new(HttpMailer::new(
                config.email_api_url.clone(),
                key.clone(),
                config.email_from.clone(),
            )?)
        }
        None => {
            warn!("CONECTA_EMAIL_API_KEY not set, emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    if config.admin_emails.is_empty() {
        warn!("CONECTA_ADMIN_EMAILS is empty, no account will be bootstrapped as admin");
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = AppStateInner::new(db, config, mailer, storage);
    let app = build_router(state);

    info!("Conecta server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
