mod cli;

use crate::cli::{StorageBackendArg, CLI};
use axum::http::header::HeaderName;
use clap::Parser;
use snip_core::Database;
use snip_gateway::{App, AppState};
use snip_generator::RandomGenerator;
use snip_shortener::{DeletionConfig, ShortenerConfig, ShortenerService};
use snip_storage::{FileRepository, InMemoryRepository, MySqlRepository};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CLI::try_parse()?;
    init_tracing(config.json_logs);

    info!(
        listen_addr = %config.listen_addr,
        base_url = %config.base_url,
        storage_backend = %config.storage,
        "starting gateway server"
    );

    match config.storage {
        StorageBackendArg::InMemory => {
            run_server(&config, InMemoryRepository::new()).await?;
        }
        StorageBackendArg::File => {
            let repository = FileRepository::open(&config.file_path).await?;
            run_server(&config, repository).await?;
        }
        StorageBackendArg::Mysql => {
            let mysql_dsn = config
                .mysql_dsn
                .as_deref()
                .ok_or("mysql dsn is required when storage backend is mysql")?;
            let repository = MySqlRepository::connect(mysql_dsn).await?;
            repository.ensure_schema().await?;
            run_server(&config, repository).await?;
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_server<D: Database>(
    config: &CLI,
    storage: D,
) -> Result<(), Box<dyn std::error::Error>> {
    let shortener_config = ShortenerConfig::builder()
        .max_attempts(config.max_attempts)
        .deletion(
            DeletionConfig::builder()
                .batch_size(config.delete_batch_size)
                .flush_timeout(config.delete_flush_timeout())
                .build(),
        )
        .build();

    let service = Arc::new(ShortenerService::with_config(
        storage,
        RandomGenerator::new(),
        shortener_config,
    ));

    let owner_header = HeaderName::try_from(config.owner_header.as_str())?;
    let mut state =
        AppState::new(service.clone(), config.base_url.clone()).with_owner_header(owner_header);
    match config.trusted_subnet {
        Some(subnet) => state = state.with_trusted_subnet(subnet),
        None => warn!("no trusted subnet configured, internal endpoints are closed"),
    }

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "gateway listening");

    axum::serve(listener, App::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("draining pending deletions");
    service.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
