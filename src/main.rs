use std::{io, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tokio::net::{TcpListener, UnixListener};

use config::{Backend, Config};
use handlers::AppState;
use ledger::Ledger;
use store::{memory::MemStore, postgres::PgStore, LedgerStore};

mod config;
mod error;
mod handlers;
mod ledger;
mod schema;
mod store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::parse();

    let store: Arc<dyn LedgerStore> = match config.backend {
        Backend::Postgres => {
            let settings = config.pool_settings()
                .context("DATABASE_URL is required for the postgres backend")?;
            let store = PgStore::connect(&settings, config.request_timeout()).await?;
            if config.init_schema {
                schema::mount(store.pool()).await?;
            }
            Arc::new(store)
        }
        Backend::Memory => {
            tracing::warn!("using in-memory balances; state is lost on exit and not shared between replicas");
            Arc::new(MemStore::with_accounts(&schema::SEED_ACCOUNTS))
        }
    };

    let app_state = Arc::new(AppState {
        ledger: Ledger::new(store, config.max_account_id),
        request_timeout: config.request_timeout(),
    });
    let app = handlers::router(app_state.clone());

    match &config.unix_socket {
        Some(socket_path) => {
            if let Err(e) = tokio::fs::remove_file(socket_path).await {
                tracing::warn!("unable to unlink path {}: {e}", socket_path.display());
            }
            let listener = UnixListener::bind(socket_path)
                .with_context(|| format!("error listening to socket {}", socket_path.display()))?;
            tracing::info!("listening on {}", socket_path.display());
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("error serving app")?;
        }
        None => {
            let listener = TcpListener::bind(config.listen).await
                .with_context(|| format!("error listening on {}", config.listen))?;
            tracing::info!("listening on {}", config.listen);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("error serving app")?;
        }
    }

    app_state.ledger.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("unable to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("unable to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
