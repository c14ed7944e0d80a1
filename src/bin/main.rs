use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vmlmap_agent::{
    ingest::load_documents,
    retrieval::{build_embedder, InMemoryVectorStore, VectorStore},
    Config, RagAgentBuilder,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = Config::from_env()?;

    let store = InMemoryVectorStore::new(build_embedder(&config)?);
    match &config.documents_path {
        Some(path) => {
            let documents = load_documents(path).await?;
            store.add_documents(documents).await?;
        }
        None => warn!("VMLMAP_DOCUMENTS not set; the agent has no reviews to search"),
    }
    let store: Arc<dyn VectorStore> = Arc::new(store);

    let agent = RagAgentBuilder::new(store, &config)?.build_agent();
    let thread_id = uuid::Uuid::new_v4().to_string();

    info!(thread_id = %thread_id, model = %config.rag_model, "Chat session started");
    println!("Product Q&A ({}). Ask a question, or 'exit' to quit.", config.rag_model);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::Write::flush(&mut std::io::stdout())?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query, "exit" | "quit") {
            break;
        }

        match agent.invoke(&thread_id, query).await {
            Ok(response) => println!("{}\n", response.answer),
            Err(e) => eprintln!("Agent failed: {}\n", e),
        }
    }

    Ok(())
}
