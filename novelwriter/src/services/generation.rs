//! Generation requests
//!
//! Types exchanged with the external text generation service. Every
//! request carries a ticket naming the novel, chapter and generation epoch
//! it was issued for, so a late response can be recognised and dropped.

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Identity of one in-flight generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTicket {
    pub novel_id: String,
    pub chapter_id: String,
    pub epoch: u64,
}

/// Prompt context sent to the generation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationContext {
    pub novel_id: String,
    pub background_setting: String,
    pub ai_writer_setting: String,
    pub history_context: String,
    pub next_chapter_overview: String,
    pub user_input: String,
}

/// A generation the workspace has agreed to start
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub ticket: GenerationTicket,
    pub context: GenerationContext,
}

/// What happened to a generation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The text became the session draft
    Applied,
    /// The session moved on; the result was dropped
    Stale,
    /// The service reported an error
    Failed(String),
}

/// Client of the external generation service
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, context: &GenerationContext) -> Result<String>;
}
