use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod aws_clients;
mod config;
mod domain;
mod errors;
mod handlers;
mod models;
mod pipeline;
mod repositories;
mod routes;
mod startup;
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::domain::{GenerationRepository, MemeRepository};
use crate::pipeline::MemePipeline;
use crate::repositories::{DynamoDbGenerationRepository, DynamoDbMemeRepository};

/// AppState holds shared resources for the web server.
pub struct AppState {
    pub generation_repo: Arc<dyn GenerationRepository>,
    pub meme_repo: Arc<dyn MemeRepository>,
    pub pipeline: MemePipeline,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (logging)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "memeforge=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = Config::load()?;
    tracing::info!(?config, "Configuration loaded");

    // --- AWS Client Initialization ---
    tracing::info!("Initializing AWS DynamoDB client...");
    let sdk_config = aws_clients::create_sdk_config(&config).await;
    let db_client = aws_clients::create_dynamodb_client(&sdk_config);

    // --- Resource Creation ---
    // NOTE: Creating tables here isn't ideal for production; use IaC instead.
    startup::init_resources(&db_client, &config).await?;

    // --- Application State ---
    let state = Arc::new(AppState {
        generation_repo: Arc::new(DynamoDbGenerationRepository::new(
            db_client.clone(),
            config.generations_table.clone(),
        )),
        meme_repo: Arc::new(DynamoDbMemeRepository::new(
            db_client,
            config.memes_table.clone(),
        )),
        pipeline: MemePipeline::default(),
    });

    // --- Router Definition ---
    let app = routes::create_router(state);

    // --- Server Startup ---
    tracing::info!("Server listening on http://{}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
