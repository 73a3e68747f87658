//! Storage module
//!
//! The durable key-value port every collection is persisted through, the
//! fixed set of keys the application writes, and an in-memory backend.
//! The SQLite backend lives in `crate::database`.

pub mod memory;

pub use memory::MemoryStore;

use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// Keys under which the application state is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StorageKey {
    GenerationConfig,
    Novels,
    Chapters,
    Templates,
    Characters,
    Settings,
    WritingSession,
}

impl StorageKey {
    /// Every key, in load order
    pub const ALL: [StorageKey; 7] = [
        StorageKey::GenerationConfig,
        StorageKey::Novels,
        StorageKey::Chapters,
        StorageKey::Templates,
        StorageKey::Characters,
        StorageKey::Settings,
        StorageKey::WritingSession,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::GenerationConfig => "dify-config",
            StorageKey::Novels => "novels",
            StorageKey::Chapters => "chapters",
            StorageKey::Templates => "templates",
            StorageKey::Characters => "characters",
            StorageKey::Settings => "app-settings",
            StorageKey::WritingSession => "writing-session",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageKey {
    type Err = AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        StorageKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| AppError::UnknownKey(s.to_string()))
    }
}

/// Durable string-to-string store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace the value stored under `key`
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names_round_trip() {
        for key in StorageKey::ALL {
            assert_eq!(key.as_str().parse::<StorageKey>().unwrap(), key);
        }
        assert_eq!(StorageKey::Settings.to_string(), "app-settings");
        assert!("sessions".parse::<StorageKey>().is_err());
    }
}
