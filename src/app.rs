//! Wires the storage, catalog, provider, controller and service together
//!
//! Everything is built once at startup and shared through `Arc`; request
//! handlers receive these handles instead of reaching for globals.

use crate::catalog::{CatalogReader, ProgressStore, SqliteCatalog};
use crate::config::Config;
use crate::embedding::{provider_from_config, EmbeddingProvider};
use crate::error::Result;
use crate::indexing::IndexingController;
use crate::recommend::RecommendationService;
use crate::storage::{Database, SqliteVectorStore, VectorStore};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct App {
    pub controller: Arc<IndexingController>,
    pub service: Arc<RecommendationService>,
    pub store: Arc<dyn VectorStore>,
    sync_on_startup: bool,
}

impl App {
    /// Open the configured database and build the configured provider
    pub fn from_config(config: &Config) -> Result<Self> {
        let db_path = config.database_path()?;
        tracing::debug!("Opening database at {}", db_path.display());
        let db = Arc::new(Database::new(&db_path, config.storage.pool_size)?);

        let provider = provider_from_config(&config.embedding)?;
        tracing::info!(
            "Using {} embedding model {} ({} dims)",
            config.embedding.mode,
            provider.model_name(),
            provider.dimension()
        );

        let catalog = Arc::new(SqliteCatalog::new(Arc::clone(&db)));
        let store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::new(db));

        Ok(Self::from_parts(
            store,
            catalog.clone(),
            catalog,
            provider,
            config,
        ))
    }

    /// Assemble from injected collaborators
    pub fn from_parts(
        store: Arc<dyn VectorStore>,
        catalog: Arc<dyn CatalogReader>,
        progress: Arc<dyn ProgressStore>,
        provider: Arc<dyn EmbeddingProvider>,
        config: &Config,
    ) -> Self {
        let controller = Arc::new(IndexingController::new(
            Arc::clone(&store),
            Arc::clone(&catalog),
            Arc::clone(&provider),
            config.embedding.batch_size,
        ));

        let service = RecommendationService::new(
            Arc::clone(&store),
            catalog,
            progress,
            provider,
            Arc::clone(&controller),
        )
        .with_exclude_completed(config.recommend.exclude_completed);

        Self {
            controller,
            service: Arc::new(service),
            store,
            sync_on_startup: config.indexing.sync_on_startup,
        }
    }

    /// Kick off the startup sync in the background, if enabled.
    ///
    /// Returns immediately; failures are logged by the task and never reach
    /// the caller.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        if !self.sync_on_startup {
            tracing::debug!("Startup sync disabled");
            return None;
        }
        tracing::info!("Checking embedding index in the background");
        Some(self.controller.spawn_sync())
    }
}
