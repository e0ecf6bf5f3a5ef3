use tracing_subscriber::EnvFilter;

use rag_search::api;
use rag_search::config::Config;
use rag_search::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!(
        "Embedding provider: {} (model {})",
        config.llm.base_url,
        config.llm.embedding_model
    );
    tracing::info!(
        "Ranking: semantic x{} + keyword x{}, similarity threshold {}",
        config.search.semantic_weight,
        config.search.keyword_weight,
        config.search.similarity_threshold
    );
    if config.llm.api_key.is_none() {
        tracing::warn!("No LLM_API_KEY / OPENAI_API_KEY set; embedding requests will be rejected");
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config)?;
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {bind_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
