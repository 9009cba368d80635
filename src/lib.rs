use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

pub mod application;
pub mod domain;
pub mod infrastructure;
#[cfg(any(feature = "http-server", feature = "mcp-server"))]
pub mod interfaces;
pub mod settings;

use application::services::{embed_records, EmbeddingEngine, TermStore};
use application::{AlignmentService, EmbeddingProvider, ServiceConfig};
use domain::DomainError;
#[cfg(feature = "fastembed-engine")]
use infrastructure::FastEmbedEngine;
use infrastructure::{InMemoryIndex, JsonTermStore, SimpleEmbedEngine};
use settings::{ConfigManager, EmbeddingBackend};

/// Handles produced once at startup and shared by every query surface.
pub struct AppHandles {
    pub service: Arc<AlignmentService>,
    pub config: Arc<ConfigManager>,
    pub data_dir: PathBuf,
}

/// Load configuration from the environment, read every domain's terms, embed
/// them and build the index. Nothing is served until this returns.
pub fn build_environment() -> Result<AppHandles> {
    let config = Arc::new(ConfigManager::from_env());
    let active = config.current();
    let data_dir = active.data.dir.clone();

    info!(
        target: "semantic_mdm::bootstrap",
        config = %config.path().display(),
        data_dir = %data_dir.display(),
        backend = active.embedding.label(),
        model = active.embedding.model_name(),
        dimensions = ?active.embedding.expected_dimensions(),
        "bootstrapping"
    );

    let store = JsonTermStore::new(&data_dir, active.data.sources.clone());
    let provider = Arc::new(init_embedder(&active.embedding));
    let service = bootstrap_service(&store, provider, active.service_config())
        .context("failed to initialise term index")?;

    Ok(AppHandles {
        service: Arc::new(service),
        config,
        data_dir,
    })
}

/// Load, embed and index every term served by `store`.
pub fn bootstrap_service(
    store: &dyn TermStore,
    provider: Arc<EmbeddingProvider>,
    config: ServiceConfig,
) -> Result<AlignmentService, DomainError> {
    let records = store.load_all()?;
    let terms = embed_records(&provider, records)?;
    let index = Arc::new(InMemoryIndex::build(terms.iter().cloned()));

    let service = AlignmentService::new(provider, index, terms, config);
    let stats = service.stats();
    info!(
        target: "semantic_mdm::bootstrap",
        total = stats.total_terms,
        indexed = stats.indexed_terms,
        skipped = stats.skipped_terms,
        concepts = stats.concepts,
        "term index ready"
    );

    Ok(service)
}

/// Provider whose engine is created on first use from `backend`.
pub fn init_embedder(backend: &EmbeddingBackend) -> EmbeddingProvider {
    let label = backend.model_name().to_string();

    match backend.clone() {
        EmbeddingBackend::Simple { model, dimensions } => {
            EmbeddingProvider::new(label, move || {
                let engine = SimpleEmbedEngine::try_new(model.clone(), dimensions)?;
                Ok(Arc::new(engine) as Arc<dyn EmbeddingEngine>)
            })
        }
        #[cfg(feature = "fastembed-engine")]
        EmbeddingBackend::FastEmbed { model } => {
            EmbeddingProvider::new(label, move || {
                let engine = FastEmbedEngine::try_new(&model)?;
                Ok(Arc::new(engine) as Arc<dyn EmbeddingEngine>)
            })
        }
    }
}

/// Bootstrap the environment and serve MCP over stdin/stdout until the client
/// disconnects.
#[cfg(feature = "mcp-server")]
pub async fn run_mcp_stdio() -> Result<()> {
    init_tracing();

    let handles = tokio::task::spawn_blocking(build_environment)
        .await
        .context("bootstrap task panicked")?
        .context("failed to bootstrap semantic-mdm environment")?;

    info!(
        target: "semantic_mdm::mcp",
        "starting MCP stdio server (stdin/stdout transport)"
    );

    interfaces::mcp::run_mcp_stdio_server(handles.service)
        .await
        .context("MCP stdio server failed")?;

    Ok(())
}

/// Install the global tracing subscriber once. Logs go to stderr so stdio
/// transports keep stdout for protocol traffic.
pub fn init_tracing() {
    static INIT: std::sync::OnceLock<()> = std::sync::OnceLock::new();

    let _ = INIT.get_or_init(|| {
        let filter = std::env::var("SEMANTIC_MDM_LOG").unwrap_or_else(|_| "info".into());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .try_init();
    });
}
