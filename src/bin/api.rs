use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vmlmap_agent::{
    api::start_server,
    ingest::load_documents,
    retrieval::{build_embedder, InMemoryVectorStore, VectorStore},
    Config, RagAgentBuilder,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    info!("Product Q&A Agent - API Server");
    info!("Port: {}", config.api_port);
    info!("Model: {}", config.rag_model);

    let store = InMemoryVectorStore::new(build_embedder(&config)?);
    match &config.documents_path {
        Some(path) => {
            let documents = load_documents(path).await?;
            store.add_documents(documents).await?;
        }
        None => warn!("VMLMAP_DOCUMENTS not set; starting with an empty review index"),
    }
    info!("Indexed {} review documents", store.len().await);
    let store: Arc<dyn VectorStore> = Arc::new(store);

    let agent = Arc::new(RagAgentBuilder::new(store, &config)?.build_agent());

    info!("Agent initialized");

    start_server(agent, config.api_port).await?;

    Ok(())
}
