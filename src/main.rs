use clap::Parser;
use dotenv::dotenv;
use std::sync::Arc;
use tokio::net::TcpListener;

use payslip_rag::api::{create_router, AppState};
use payslip_rag::config::{AppConfig, StoreBackend};
use payslip_rag::database::{InMemoryStore, QdrantStore, VectorStore};
use payslip_rag::payslip::preload_definitions;
use payslip_rag::providers::{CachedEmbeddings, EmbeddingProvider, OpenAIProvider};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Payslip question answering over a vector store", long_about = None)]
struct Args {
    /// Address to bind, overrides PAYSLIP_HOST
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overrides PAYSLIP_PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Vector store backend: qdrant or memory
    #[arg(long)]
    store: Option<StoreBackend>,

    /// Do not load the definitions directory at startup
    #[arg(long)]
    skip_definitions: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load environment variables
    dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(backend) = args.store {
        config.store.backend = backend;
    }

    let llm = Arc::new(OpenAIProvider::new(&config.openai));
    let embeddings: Arc<dyn EmbeddingProvider> =
        Arc::new(CachedEmbeddings::new(OpenAIProvider::new(&config.openai)));

    let store: Arc<dyn VectorStore> = match config.store.backend {
        StoreBackend::Qdrant => {
            let store = QdrantStore::connect(&config.store, embeddings).await?;
            log::info!(
                "Using Qdrant collection '{}' at {}",
                config.store.collection,
                config.store.qdrant_url
            );
            Arc::new(store)
        }
        StoreBackend::Memory => {
            log::warn!("Using the in-memory vector store, indexed payslips are lost on restart");
            Arc::new(InMemoryStore::new(embeddings))
        }
    };

    if args.skip_definitions {
        log::info!("Skipping definitions preload");
    } else {
        preload_definitions(store.as_ref(), &config.definitions_dir).await?;
    }

    let state = AppState::new(llm, store, Arc::new(config.prompts.clone()));
    let app = create_router(state, &config.server);

    let address = config.server.address();
    let listener = TcpListener::bind(&address).await?;
    log::info!("Payslip service listening on http://{}", address);

    axum::serve(listener, app).await?;
    Ok(())
}
