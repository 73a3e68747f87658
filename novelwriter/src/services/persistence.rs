//! Persistence
//!
//! Encodes workspace state per storage key and decodes it back. Loading is
//! tolerant: a key that cannot be read or parsed is logged and left at its
//! default, and the remaining keys still load. Writing is fire-and-forget:
//! failures are logged and the in-memory state stays authoritative.

use super::session::WritingSession;
use super::settings::{is_valid_history_budget, AppSettings};
use super::workspace::Workspace;
use crate::config::DEFAULT_HISTORY_CHAPTERS_MAX_CHARS;
use crate::error::Result;
use crate::models::{Chapter, Character, Novel, Template};
use crate::storage::{KeyValueStore, StorageKey};
use std::collections::BTreeSet;

/// Serialize the part of `ws` stored under `key`
pub fn encode(ws: &Workspace, key: StorageKey) -> Result<String> {
    let json = match key {
        StorageKey::GenerationConfig => serde_json::to_string(ws.generation_config())?,
        StorageKey::Novels => serde_json::to_string(ws.entities().novels())?,
        StorageKey::Chapters => serde_json::to_string(ws.entities().chapters())?,
        StorageKey::Templates => serde_json::to_string(ws.entities().templates())?,
        StorageKey::Characters => serde_json::to_string(ws.entities().characters())?,
        StorageKey::Settings => serde_json::to_string(ws.settings())?,
        StorageKey::WritingSession => serde_json::to_string(&ws.session().persisted())?,
    };
    Ok(json)
}

/// Parse `raw` and install it as the part of `ws` stored under `key`.
/// On error `ws` is left unchanged.
pub fn decode_into(ws: &mut Workspace, key: StorageKey, raw: &str) -> Result<()> {
    match key {
        StorageKey::GenerationConfig => {
            ws.replace_generation_config(serde_json::from_str(raw)?);
        }
        StorageKey::Novels => {
            let novels: Vec<Novel> = serde_json::from_str(raw)?;
            ws.entities_mut().replace_novels(novels);
        }
        StorageKey::Chapters => {
            let chapters: Vec<Chapter> = serde_json::from_str(raw)?;
            ws.entities_mut().replace_chapters(chapters);
        }
        StorageKey::Templates => {
            let templates: Vec<Template> = serde_json::from_str(raw)?;
            ws.entities_mut().replace_templates(templates);
        }
        StorageKey::Characters => {
            let characters: Vec<Character> = serde_json::from_str(raw)?;
            ws.entities_mut().replace_characters(characters);
        }
        StorageKey::Settings => {
            let mut settings: AppSettings = serde_json::from_str(raw)?;
            if !is_valid_history_budget(settings.history_chapters_max_chars) {
                tracing::warn!(
                    "Stored history budget {} is out of range, using {}",
                    settings.history_chapters_max_chars,
                    DEFAULT_HISTORY_CHAPTERS_MAX_CHARS
                );
                settings.history_chapters_max_chars = DEFAULT_HISTORY_CHAPTERS_MAX_CHARS;
            }
            ws.replace_settings(settings);
        }
        StorageKey::WritingSession => {
            let session: WritingSession = serde_json::from_str(raw)?;
            ws.replace_session(session);
        }
    }
    Ok(())
}

/// Read one key into `ws`. Returns whether a value was installed.
pub async fn load_key(store: &dyn KeyValueStore, ws: &mut Workspace, key: StorageKey) -> bool {
    let raw = match store.get(key.as_str()).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return false,
        Err(e) => {
            tracing::warn!("Failed to read {} from storage: {}", key, e);
            return false;
        }
    };

    match decode_into(ws, key, &raw) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Failed to load {} from storage, using defaults: {}", key, e);
            false
        }
    }
}

/// Build a workspace from every stored key
pub async fn load_workspace(store: &dyn KeyValueStore) -> Workspace {
    let mut ws = Workspace::new();
    reload_into(store, &mut ws).await;
    ws
}

/// Replace every stored part of `ws` with what the store holds
pub async fn reload_into(store: &dyn KeyValueStore, ws: &mut Workspace) {
    let mut loaded = 0;
    for key in StorageKey::ALL {
        if load_key(store, ws, key).await {
            loaded += 1;
        }
    }
    ws.resume_current_novel();
    ws.take_pending();

    tracing::info!(
        "Loaded {} of {} keys: {} novels, {} chapters, {} templates, {} characters",
        loaded,
        StorageKey::ALL.len(),
        ws.entities().novels().len(),
        ws.entities().chapters().len(),
        ws.entities().templates().len(),
        ws.entities().characters().len()
    );
}

/// Write one key. Failures are logged, never returned.
pub async fn write_key(store: &dyn KeyValueStore, ws: &Workspace, key: StorageKey) {
    let payload = match encode(ws, key) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Failed to serialize {}: {}", key, e);
            return;
        }
    };

    match store.set(key.as_str(), &payload).await {
        Ok(()) => tracing::debug!("Persisted {} ({} bytes)", key, payload.len()),
        Err(e) => tracing::warn!("Failed to persist {}: {}", key, e),
    }
}

/// Write every key in `keys`
pub async fn write_keys(store: &dyn KeyValueStore, ws: &Workspace, keys: &BTreeSet<StorageKey>) {
    for key in keys {
        write_key(store, ws, *key).await;
    }
}
