//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by the REST API.
//! Services are generic over repository/loader traits, but AppState pins
//! them to the SQLite and finance-engine implementations.

use std::sync::Arc;

use moneta_core::chat::service::ChatService;
use moneta_core::engine::EngineRegistry;
use moneta_infra::config::{load_global_config, resolve_data_dir};
use moneta_infra::engine::FinanceEngineLoader;
use moneta_infra::sqlite::conversation::SqliteConversationRepository;
use moneta_infra::sqlite::pool::DatabasePool;
use moneta_types::config::GlobalConfig;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteChatService = ChatService<SqliteConversationRepository, FinanceEngineLoader>;
pub type ConcreteEngineRegistry = EngineRegistry<FinanceEngineLoader>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ConcreteChatService>,
    pub engine_registry: Arc<ConcreteEngineRegistry>,
    pub db_pool: DatabasePool,
    pub config: GlobalConfig,
}

impl AppState {
    /// Initialize the application state: connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_global_config(&data_dir).await;

        // Initialize database
        let db_url = format!(
            "sqlite://{}?mode=rwc",
            data_dir.join("moneta.db").display()
        );
        let db_pool = DatabasePool::new(&db_url).await?;

        // One registry per process: the engine is a singleton across all
        // request handlers.
        let engine_registry = Arc::new(EngineRegistry::new(FinanceEngineLoader));

        let repo = SqliteConversationRepository::new(db_pool.clone());
        let chat_service = Arc::new(ChatService::new(repo, Arc::clone(&engine_registry)));

        Ok(Self {
            chat_service,
            engine_registry,
            db_pool,
            config,
        })
    }
}
