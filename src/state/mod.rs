use std::path::Path;
use std::sync::Arc;

use crate::chat::{
    ChatPipeline, EntityDetector, FallbackResponder, PageScraper, PromptAssembler,
    RetrievalOrchestrator, SiteScraper,
};
use crate::core::config::{AppConfig, AppPaths, ConfigService};
use crate::core::security::AdminToken;
use crate::event::EventProfile;
use crate::interactions::InteractionLog;
use crate::knowledge::{open_pool, IngestService, KnowledgeStore, SqliteKnowledgeStore};
use crate::llm::{Embedder, GeminiEmbedder, LlmService};

pub mod error;

use error::InitializationError;

/// Shared state handed to every route.
///
/// Everything here is built once at startup; request handling only reads it.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: Arc<AppConfig>,
    pub admin_token: AdminToken,
    pub knowledge: Arc<dyn KnowledgeStore>,
    pub ingest: IngestService,
    pub pipeline: Arc<ChatPipeline>,
    pub interactions: InteractionLog,
}

/// Collaborators that talk to the outside world. Swapped for fakes in tests.
pub struct Backends {
    pub knowledge: Arc<dyn KnowledgeStore>,
    pub embedder: Arc<dyn Embedder>,
    pub scraper: Arc<dyn PageScraper>,
    pub llm: LlmService,
    pub interactions: InteractionLog,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// 1. Resolve paths and load `config.yml` + `secrets.yaml`
    /// 2. Load the event profile (embedded unless overridden)
    /// 3. Open the SQLite database (knowledge base + interaction log)
    /// 4. Build the embedding, LLM and scraper clients
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config = ConfigService::new(paths.clone())
            .load_config()
            .map_err(|e| InitializationError::Config(e.into()))?;
        Self::with_config(paths, config).await
    }

    pub async fn with_config(
        paths: Arc<AppPaths>,
        config: AppConfig,
    ) -> Result<Arc<Self>, InitializationError> {
        let profile = EventProfile::load(config.event.profile_path.as_deref().map(Path::new))
            .map_err(|e| InitializationError::Profile(e.into()))?;

        let db_path = paths.data_file(&config.storage.database_file);
        let pool = open_pool(&db_path)
            .await
            .map_err(|e| InitializationError::Knowledge(e.into()))?;
        tracing::info!("Using database {}", db_path.display());

        let knowledge = Arc::new(
            SqliteKnowledgeStore::with_pool(pool.clone(), config.embedding.dimensions)
                .await
                .map_err(|e| InitializationError::Knowledge(e.into()))?,
        );
        let interactions = InteractionLog::with_pool(pool)
            .await
            .map_err(|e| InitializationError::Interactions(e.into()))?;

        let embedder = Arc::new(
            GeminiEmbedder::new(&config.embedding).map_err(|e| InitializationError::Llm(e.into()))?,
        );
        let llm = LlmService::from_config(&config.llm).map_err(|e| InitializationError::Llm(e.into()))?;
        let scraper = Arc::new(
            SiteScraper::new(&config.scrape).map_err(|e| InitializationError::Scraper(e.into()))?,
        );

        let backends = Backends {
            knowledge,
            embedder,
            scraper,
            llm,
            interactions,
        };

        Ok(Arc::new(Self::assemble(paths, config, profile, backends)))
    }

    /// Wires the chat pipeline and ingestion service around `backends`.
    pub fn assemble(
        paths: Arc<AppPaths>,
        config: AppConfig,
        profile: EventProfile,
        backends: Backends,
    ) -> Self {
        let context_limit = config.retrieval.effective_context_limit();

        let retrieval = RetrievalOrchestrator::new(
            backends.embedder.clone(),
            backends.knowledge.clone(),
            backends.scraper,
            config.retrieval.clone(),
        )
        .with_site_host(profile.site_host());

        let pipeline = ChatPipeline::new(
            EntityDetector::new(&profile),
            retrieval,
            PromptAssembler::new(profile.clone(), context_limit),
            backends.llm,
            FallbackResponder::new(profile),
            context_limit,
            config.llm.history_turns,
        );

        let ingest = IngestService::new(backends.knowledge.clone(), backends.embedder);

        Self {
            paths,
            admin_token: AdminToken::new(config.admin.token.clone()),
            config: Arc::new(config),
            knowledge: backends.knowledge,
            ingest,
            pipeline: Arc::new(pipeline),
            interactions: backends.interactions,
        }
    }
}
