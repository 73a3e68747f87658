//! Application state and initialization
//!
//! Opens the data directory, the SQLite-backed store and the services that
//! share it. Everything the host needs is reachable through `AppState`.

use crate::config::DATABASE_FILE_NAME;
use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::services::{BackupService, Coordinator};
use crate::storage::{KeyValueStore, StorageKey};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub app_data_dir: PathBuf,
    pub repo: Repository,
    pub coordinator: Coordinator,
    pub backup_service: BackupService,
}

impl AppState {
    /// Open (or create) the application data under `app_data_dir`
    pub async fn open(app_data_dir: impl AsRef<Path>) -> Result<Self> {
        let app_data_dir = app_data_dir.as_ref().to_path_buf();
        tracing::info!("Initializing application");
        tracing::info!("App data directory: {:?}", app_data_dir);

        // Create necessary directories
        std::fs::create_dir_all(&app_data_dir)?;
        std::fs::create_dir_all(app_data_dir.join("backups"))?;

        let pool = create_pool(&app_data_dir.join(DATABASE_FILE_NAME)).await?;
        let repo = Repository::new(pool);
        let unknown: Vec<String> = repo
            .list_keys()
            .await?
            .into_iter()
            .filter(|key| key.parse::<StorageKey>().is_err())
            .collect();
        if !unknown.is_empty() {
            tracing::warn!("Ignoring unknown stored keys: {}", unknown.join(", "));
        }
        let store: Arc<dyn KeyValueStore> = Arc::new(repo.clone());

        let coordinator = Coordinator::load(Arc::clone(&store)).await;
        let backup_service = BackupService::new(store, app_data_dir.join("backups"));

        tracing::info!("Application initialized successfully");

        Ok(Self {
            app_data_dir,
            repo,
            coordinator,
            backup_service,
        })
    }

    /// Restore a backup archive and reload the workspace from it
    pub async fn restore_backup(&self, backup_path: &Path) -> Result<Vec<StorageKey>> {
        self.coordinator
            .restore_backup(&self.backup_service, backup_path)
            .await
    }
}
