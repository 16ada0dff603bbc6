/// Application context and dependency injection
use crate::{
    account::{AccountManager, TokenService},
    config::ServerConfig,
    content::ContentManager,
    db,
    error::{PlazaError, PlazaResult},
    graph::SocialGraph,
    groups::GroupManager,
    media::{DiskMediaStore, MediaStore},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub accounts: Arc<AccountManager>,
    pub tokens: Arc<TokenService>,
    pub graph: Arc<SocialGraph>,
    pub content: Arc<ContentManager>,
    pub groups: Arc<GroupManager>,
    pub media: Arc<dyn MediaStore>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> PlazaResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let db = db::create_pool(&config.database).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let media: Arc<dyn MediaStore> = Arc::new(DiskMediaStore::new(
            config.media.directory.clone(),
            config.media.public_base_url.clone(),
        ));

        tracing::info!(
            database = %config.database.path.display(),
            media = %config.media.directory.display(),
            "Application context initialized"
        );

        Ok(Self::from_parts(config, db, media))
    }

    /// Wire services over an existing pool and media store
    pub fn from_parts(config: ServerConfig, db: SqlitePool, media: Arc<dyn MediaStore>) -> Self {
        let config = Arc::new(config);
        let auth_config = Arc::new(config.authentication.clone());

        let accounts = Arc::new(AccountManager::new(db.clone(), auth_config.bcrypt_cost));
        let tokens = Arc::new(TokenService::new(db.clone(), auth_config));
        let graph = Arc::new(SocialGraph::new(db.clone()));
        let content = Arc::new(ContentManager::new(db.clone(), media.clone()));
        let groups = Arc::new(GroupManager::new(db.clone(), content.clone()));

        Self {
            config,
            db,
            accounts,
            tokens,
            graph,
            content,
            groups,
            media,
        }
    }

    /// In-memory database with media stored under `config.media.directory`
    pub async fn for_tests(config: ServerConfig) -> PlazaResult<Self> {
        let db = db::create_memory_pool().await?;
        let media: Arc<dyn MediaStore> = Arc::new(DiskMediaStore::new(
            config.media.directory.clone(),
            config.media.public_base_url.clone(),
        ));

        Ok(Self::from_parts(config, db, media))
    }

    async fn ensure_directories(config: &ServerConfig) -> PlazaResult<()> {
        tokio::fs::create_dir_all(&config.media.directory)
            .await
            .map_err(|e| PlazaError::Internal(format!("Failed to create media directory: {}", e)))?;

        if let Some(parent) = config.database.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    PlazaError::Internal(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        Ok(())
    }
}
