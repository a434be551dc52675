use std::sync::Arc;

use anime_rec_api::{
    api::{cors_layer, create_router, AppState},
    cache::{create_redis_client, LookupCache},
    config::Config,
    services::{load_model, providers::JikanProvider, Enricher, RecommenderService},
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let (cache, cache_writer) = match &config.redis_url {
        Some(url) => {
            let (cache, writer) = LookupCache::new(create_redis_client(url)?);
            tracing::info!("Lookup cache enabled");
            (Some(cache), Some(writer))
        }
        None => (None, None),
    };

    let provider = JikanProvider::new(config.jikan_api_url.clone(), config.jikan_timeout(), cache)?;
    let enricher = Enricher::new(Arc::new(provider), config.enrichment_delay());
    let recommender = Arc::new(RecommenderService::new(enricher, config.candidate_pool));

    // Requests are served while the model builds; they see "not ready" until it lands.
    let loader = recommender.clone();
    let dataset = config.dataset();
    tokio::spawn(async move {
        match tokio::task::spawn_blocking(move || load_model(&dataset)).await {
            Ok(result) => loader.install(result),
            Err(e) => loader.mark_failed(format!("model build task failed: {}", e)),
        }
    });

    let state = AppState::new(recommender).with_defaults(config.request_defaults());
    let shutdown = state.shutdown.clone();
    let app = create_router(state).layer(cors_layer(&config.allowed_origins()));

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(host = %config.host, port = config.port, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    if let Some(writer) = cache_writer {
        writer.flush().await;
    }

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
    shutdown.cancel();
}
