use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService};
use crate::history::HistoryStore;
use crate::llm::LlmService;
use crate::rag::{InMemoryRagStore, RagStore};

pub mod error;

use error::InitializationError;

/// Global application state shared across all routes.
///
/// Contains references to:
/// - Configuration and paths
/// - In-memory chat history and vector indexes
/// - The LLM service that builds provider clients per request
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub history: HistoryStore,
    pub llm: LlmService,
    pub rag_store: Arc<dyn RagStore>,
}

impl AppState {
    /// Initializes the application state from the default paths.
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        Self::with_paths(AppPaths::new())
    }

    /// Builds state rooted at `paths`. Config values of the wrong type fail
    /// here rather than on the first request.
    pub fn with_paths(paths: AppPaths) -> Result<Arc<Self>, InitializationError> {
        std::fs::create_dir_all(&paths.log_dir)
            .map_err(|e| InitializationError::Paths(e.into()))?;

        let paths = Arc::new(paths);
        let config = ConfigService::new(paths.clone());
        let settings = config
            .settings()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let documents_dir = paths.resolve(&settings.rag.documents_dir);
        if !documents_dir.is_dir() {
            tracing::warn!(
                "Research documents directory {} does not exist yet",
                documents_dir.display()
            );
        }

        Ok(Arc::new(AppState {
            paths,
            config,
            history: HistoryStore::new(),
            llm: LlmService::new(),
            rag_store: Arc::new(InMemoryRagStore::new()),
        }))
    }
}
