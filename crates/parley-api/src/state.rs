//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by the HTTP and
//! WebSocket handlers. Services are generic over the store trait, but
//! AppState pins them to the SQLite implementation.

use std::sync::Arc;
use std::time::Duration;

use parley_core::directory::SessionDirectory;
use parley_core::gateway::Gateway;
use parley_core::pipeline::PipelineAdapter;
use parley_infra::sqlite::{DatabasePool, SqliteSessionStore};
use parley_types::config::ServerConfig;

/// Concrete type aliases for the service generics pinned to the SQLite store.
pub type ConcreteGateway = Gateway<SqliteSessionStore>;
pub type ConcreteDirectory = SessionDirectory<SqliteSessionStore>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<ConcreteGateway>,
    pub directory: Arc<ConcreteDirectory>,
    pub store: Arc<SqliteSessionStore>,
    pub pipeline: PipelineAdapter,
    pub config: Arc<ServerConfig>,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: connect to the database, wire
    /// the store, gateway, and directory.
    ///
    /// The pipeline adapter starts uninitialized (degraded mode); the
    /// boot task in `main` installs the real backend once it is up.
    pub async fn init(config: ServerConfig) -> anyhow::Result<Self> {
        let database_url = match &config.database_url {
            Some(url) => url.clone(),
            None => {
                let data_dir = parley_infra::config::resolve_data_dir();
                tokio::fs::create_dir_all(&data_dir).await?;
                format!("sqlite://{}?mode=rwc", data_dir.join("parley.db").display())
            }
        };

        let db_pool = DatabasePool::new(&database_url).await?;
        let store = Arc::new(SqliteSessionStore::new(
            db_pool.clone(),
            Duration::from_secs(config.retention_secs),
        ));

        let pipeline = PipelineAdapter::uninitialized();
        let gateway = Gateway::new(
            store.clone(),
            pipeline.clone(),
            Duration::from_millis(config.escalation_ms),
        );
        let directory = SessionDirectory::new(store.clone());

        Ok(Self {
            gateway: Arc::new(gateway),
            directory: Arc::new(directory),
            store,
            pipeline,
            config: Arc::new(config),
            db_pool,
        })
    }
}
