//! Backup service
//!
//! Snapshots every stored collection into a ZIP archive with a manifest of
//! SHA-256 checksums, and restores a snapshot back into the store. The
//! generation service configuration is never exported since it holds the
//! API key.

use crate::config::{BACKUP_MANIFEST_NAME, DEFAULT_BACKUP_RETENTION};
use crate::error::{AppError, Result};
use crate::storage::{KeyValueStore, StorageKey};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::fs;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const BACKUP_PREFIX: &str = "backup_";
const BACKUP_EXTENSION: &str = "zip";

/// Backup manifest structure
#[derive(Debug, Serialize, Deserialize)]
pub struct BackupManifest {
    pub version: String,
    pub timestamp: String,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub checksum: String,
}

/// A backup archive on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
}

/// Backup service
#[derive(Clone)]
pub struct BackupService {
    store: Arc<dyn KeyValueStore>,
    backups_dir: PathBuf,
    retention: usize,
}

impl BackupService {
    pub fn new(store: Arc<dyn KeyValueStore>, backups_dir: PathBuf) -> Self {
        Self {
            store,
            backups_dir,
            retention: DEFAULT_BACKUP_RETENTION,
        }
    }

    /// Keep at most `retention` archives (minimum one)
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Snapshot the store into a new archive
    pub async fn create_backup(&self) -> Result<PathBuf> {
        tracing::info!("Creating backup");

        fs::create_dir_all(&self.backups_dir).await?;

        let now = Utc::now();
        let backup_filename = format!(
            "{}{}.{}",
            BACKUP_PREFIX,
            now.format("%Y%m%d_%H%M%S_%3f"),
            BACKUP_EXTENSION
        );
        let backup_path = self.backups_dir.join(&backup_filename);

        let mut manifest = BackupManifest {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: now.to_rfc3339(),
            files: Vec::new(),
        };

        let mut entries = Vec::new();
        for key in StorageKey::ALL {
            if key == StorageKey::GenerationConfig {
                continue;
            }
            if let Some(value) = self.store.get(key.as_str()).await? {
                entries.push((entry_name(key), value.into_bytes()));
            }
        }

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for (path, data) in &entries {
            zip.start_file(path.as_str(), options)?;
            zip.write_all(data)?;

            manifest.files.push(FileEntry {
                path: path.clone(),
                size: data.len() as u64,
                checksum: calculate_checksum(data),
            });

            tracing::debug!("Added {} to backup", path);
        }

        let manifest_json = serde_json::to_string_pretty(&manifest)?;
        zip.start_file(BACKUP_MANIFEST_NAME, options)?;
        zip.write_all(manifest_json.as_bytes())?;

        let archive = zip.finish()?.into_inner();
        fs::write(&backup_path, &archive).await?;

        tracing::info!(
            "Backup created: {:?} ({} entries, {} bytes)",
            backup_path,
            manifest.files.len(),
            archive.len()
        );

        self.apply_retention_policy().await?;

        Ok(backup_path)
    }

    /// Delete all but the newest `retention` archives
    async fn apply_retention_policy(&self) -> Result<()> {
        let backups = self.list_backups().await?;

        for backup in backups.iter().skip(self.retention) {
            tracing::info!("Deleting old backup: {}", backup.file_name);

            if let Err(e) = fs::remove_file(&backup.path).await {
                tracing::warn!("Failed to delete backup file {:?}: {}", backup.path, e);
            }
        }

        Ok(())
    }

    /// Archives in the backups directory, newest first
    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        let mut backups = Vec::new();

        let mut dir = match fs::read_dir(&self.backups_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(backups),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !is_backup_file_name(&file_name) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            backups.push(BackupInfo {
                path: entry.path(),
                file_name,
                size: metadata.len(),
            });
        }

        // Timestamped names sort chronologically
        backups.sort_by(|a, b| b.file_name.cmp(&a.file_name));
        Ok(backups)
    }

    /// Write the archive's collections back into the store.
    ///
    /// Every entry is verified before the first write, so a damaged archive
    /// leaves the store untouched. Keys absent from the archive are left as
    /// they are. Returns the restored keys.
    pub async fn restore_backup(&self, backup_path: &Path) -> Result<Vec<StorageKey>> {
        tracing::info!("Restoring from backup: {:?}", backup_path);

        let data = fs::read(backup_path).await?;
        let restored = read_verified_entries(data)?;

        for (key, value) in &restored {
            self.store.set(key.as_str(), value).await?;
            tracing::debug!("Restored {}", key);
        }

        tracing::info!("Restore completed: {} keys", restored.len());
        Ok(restored.into_iter().map(|(key, _)| key).collect())
    }
}

/// Open an archive and return its verified entries keyed by storage key
fn read_verified_entries(data: Vec<u8>) -> Result<Vec<(StorageKey, String)>> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| AppError::Restore(format!("Invalid backup archive: {}", e)))?;

    let manifest: BackupManifest = {
        let mut manifest_file = archive
            .by_name(BACKUP_MANIFEST_NAME)
            .map_err(|_| AppError::Restore("Backup has no manifest".to_string()))?;
        let mut manifest_data = String::new();
        manifest_file.read_to_string(&mut manifest_data)?;
        serde_json::from_str(&manifest_data)
            .map_err(|e| AppError::Restore(format!("Invalid manifest: {}", e)))?
    };

    tracing::info!(
        "Backup version: {}, timestamp: {}, files: {}",
        manifest.version,
        manifest.timestamp,
        manifest.files.len()
    );

    let mut entries = Vec::with_capacity(manifest.files.len());
    for file_entry in &manifest.files {
        let key = key_for_entry(&file_entry.path)?;

        let contents = {
            let mut file = archive.by_name(&file_entry.path).map_err(|_| {
                AppError::Restore(format!("Missing entry in backup: {}", file_entry.path))
            })?;
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            contents
        };

        let actual_checksum = calculate_checksum(&contents);
        if actual_checksum != file_entry.checksum {
            return Err(AppError::Restore(format!(
                "Checksum mismatch for {}: expected {}, got {}",
                file_entry.path, file_entry.checksum, actual_checksum
            )));
        }

        let value = String::from_utf8(contents).map_err(|_| {
            AppError::Restore(format!("Entry is not valid UTF-8: {}", file_entry.path))
        })?;
        entries.push((key, value));

        tracing::debug!("Verified: {}", file_entry.path);
    }

    Ok(entries)
}

fn entry_name(key: StorageKey) -> String {
    format!("{}.json", key)
}

fn key_for_entry(path: &str) -> Result<StorageKey> {
    path.strip_suffix(".json")
        .and_then(|name| StorageKey::from_str(name).ok())
        .filter(|key| *key != StorageKey::GenerationConfig)
        .ok_or_else(|| AppError::Restore(format!("Unexpected entry in backup: {}", path)))
}

fn is_backup_file_name(name: &str) -> bool {
    name.starts_with(BACKUP_PREFIX)
        && Path::new(name).extension().and_then(|e| e.to_str()) == Some(BACKUP_EXTENSION)
}

fn calculate_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
