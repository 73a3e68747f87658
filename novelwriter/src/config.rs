//! Application configuration constants
//!
//! Central location for storage keys, timing, resource limits and
//! validation boundaries used throughout the application.

use std::time::Duration;

// ===== Writing Session =====

/// Interval of the periodic session autosave tick.
pub const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

/// Capacity of the lifecycle signal channel handed to the UI layer.
pub const LIFECYCLE_CHANNEL_CAPACITY: usize = 32;

// ===== History Context =====

/// Default character budget for prior-chapter context (20k characters).
pub const DEFAULT_HISTORY_CHAPTERS_MAX_CHARS: usize = 20_000;

/// Upper bound accepted by `set_history_chapters_max_chars`.
/// Larger prompts are rejected by every generation backend we target.
pub const MAX_HISTORY_CHAPTERS_MAX_CHARS: usize = 1_000_000;

/// Separator placed between formatted history chapters.
pub const HISTORY_SEPARATOR: &str = "\n\n";

// ===== Generation Service =====

/// Default base URL of the generation service API
pub const DEFAULT_GENERATION_API_BASE_URL: &str = "https://api.dify.ai/v1";

// ===== Storage =====

/// SQLite database file name inside the data directory
pub const DATABASE_FILE_NAME: &str = "novelwriter.sqlite";

/// How long a connection waits on a locked database before failing
pub const DATABASE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Environment variable overriding the data directory of the binary
pub const DATA_DIR_ENV: &str = "NOVELWRITER_DATA_DIR";

/// Data directory used when `DATA_DIR_ENV` is unset
pub const DEFAULT_DATA_DIR: &str = "./data";

// ===== Backups =====

/// Number of backup archives kept by the retention policy
pub const DEFAULT_BACKUP_RETENTION: usize = 10;

/// Name of the manifest entry inside a backup archive
pub const BACKUP_MANIFEST_NAME: &str = "manifest.json";
