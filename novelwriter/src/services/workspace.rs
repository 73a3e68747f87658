//! Workspace
//!
//! The explicit application state container: entity collections, the
//! writing session, settings and the generation service configuration.
//! Every operation is a synchronous state transition that never fails and
//! never touches storage; the keys it changed are collected in a pending
//! set that the coordinator drains and writes through after each call.

use super::context;
use super::entities::EntityStore;
use super::generation::{
    GenerationContext, GenerationOutcome, GenerationRequest, GenerationTicket,
};
use super::session::{SessionState, WritingSession};
use super::settings::{
    is_valid_history_budget, AppSettings, GenerationConfigPatch, GenerationServiceConfig,
    ResolvedTheme, ThemeMode,
};
use crate::error::Result;
use crate::models::{Chapter, ChapterPatch, Character, Novel};
use crate::storage::StorageKey;
use std::collections::BTreeSet;

/// Application state owned by the composition root
#[derive(Debug, Default)]
pub struct Workspace {
    entities: EntityStore,
    session: WritingSession,
    settings: AppSettings,
    generation_config: GenerationServiceConfig,
    current_novel_id: Option<String>,
    generation_epoch: u64,
    pending: BTreeSet<StorageKey>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    /// Direct access for plain entity CRUD. Deleting a novel must go through
    /// `delete_novel` so the session is cleared with it.
    pub fn entities_mut(&mut self) -> &mut EntityStore {
        &mut self.entities
    }

    pub fn session(&self) -> &WritingSession {
        &self.session
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn generation_config(&self) -> &GenerationServiceConfig {
        &self.generation_config
    }

    // ===== Novels =====

    /// The selected novel; a dangling id reads as none
    pub fn current_novel(&self) -> Option<&Novel> {
        self.current_novel_id
            .as_deref()
            .and_then(|id| self.entities.novel(id))
    }

    /// Select a novel, or clear the selection and reset the session.
    /// Selecting an unknown id is a no-op.
    pub fn set_current_novel(&mut self, novel_id: Option<&str>) {
        match novel_id {
            Some(id) => {
                if self.entities.novel(id).is_none() {
                    tracing::debug!("Ignoring selection of missing novel: {}", id);
                    return;
                }
                self.current_novel_id = Some(id.to_string());
                self.session.bind_novel(id);
                tracing::info!("Current novel: {}", id);
            }
            None => {
                self.current_novel_id = None;
                self.reset_session_state();
                tracing::info!("Current novel cleared");
            }
        }
        self.mark(StorageKey::WritingSession);
    }

    /// Delete a novel, its chapters and characters. A session bound to it
    /// returns to idle.
    pub fn delete_novel(&mut self, id: &str) -> bool {
        if !self.entities.remove_novel(id) {
            return false;
        }

        let selected = self.current_novel_id.as_deref() == Some(id);
        if selected || self.session.novel_id() == Some(id) {
            if selected {
                self.current_novel_id = None;
            }
            self.reset_session_state();
            self.mark(StorageKey::WritingSession);
        }
        true
    }

    /// Chapters of the current novel in reading order
    pub fn current_novel_chapters(&self) -> Vec<&Chapter> {
        match self.current_novel_id.as_deref() {
            Some(id) if self.entities.novel(id).is_some() => {
                context::novel_chapters(self.entities.chapters(), id)
            }
            _ => Vec::new(),
        }
    }

    /// Characters of the current novel, most recently updated first
    pub fn current_novel_characters(&self) -> Vec<&Character> {
        match self.current_novel() {
            Some(novel) => self.entities.characters_for_novel(&novel.id),
            None => Vec::new(),
        }
    }

    // ===== Current chapter queries =====

    /// The bound chapter; a dangling id reads as none
    pub fn current_chapter(&self) -> Option<&Chapter> {
        self.session
            .current_chapter_id()
            .and_then(|id| self.entities.chapter(id))
    }

    pub fn current_chapter_next_overview(&self) -> &str {
        self.current_chapter()
            .map_or("", |c| c.next_chapter_overview.as_str())
    }

    /// Editing state, with a bound id that no longer names a chapter
    /// reading as idle
    pub fn session_state(&self) -> SessionState {
        if self.current_chapter().is_none() {
            SessionState::Idle
        } else {
            self.session.state()
        }
    }

    /// Whether the periodic autosave has a draft worth writing
    pub fn has_draft(&self) -> bool {
        self.current_chapter().is_some() && self.session.has_draft()
    }

    /// Saved content of the bound chapter
    pub fn current_chapter_content(&self) -> &str {
        self.current_chapter().map_or("", |c| c.content.as_str())
    }

    /// What the editor shows: the draft if there is one, else the saved text
    pub fn current_chapter_latest_content(&self) -> &str {
        let draft = self.session.generated_content();
        if draft.is_empty() {
            self.current_chapter_content()
        } else {
            draft
        }
    }

    /// Chapters of the current novel before the bound chapter
    pub fn history_chapters(&self) -> Vec<&Chapter> {
        let Some(novel) = self.current_novel() else {
            return Vec::new();
        };
        let current_order = self.current_chapter().map(|c| c.order);
        context::history_chapters(self.entities.chapters(), &novel.id, current_order)
    }

    /// History context within `max_chars`, or the configured budget
    pub fn history_context(&self, max_chars: Option<usize>) -> String {
        let history = self.history_chapters();
        if history.is_empty() {
            return String::new();
        }
        let limit = max_chars.unwrap_or(self.settings.history_chapters_max_chars);
        context::assemble_history_context(&history, limit)
    }

    // ===== Session transitions =====

    pub fn set_user_input(&mut self, input: impl Into<String>) {
        self.session.set_user_input(input.into());
        self.mark(StorageKey::WritingSession);
    }

    /// Replace the draft. Both generation results and manual edits enter here.
    pub fn set_generated_content(&mut self, content: impl Into<String>) {
        self.session.set_generated_content(content.into());
        self.mark(StorageKey::WritingSession);
    }

    pub fn set_generating(&mut self, generating: bool) {
        self.session.set_generating(generating);
        self.mark(StorageKey::WritingSession);
    }

    pub fn reset_writing_session(&mut self) {
        self.reset_session_state();
        self.mark(StorageKey::WritingSession);
    }

    /// Bind the session to a chapter. Unknown ids are ignored.
    pub fn start_editing_chapter(&mut self, chapter_id: &str) -> bool {
        let Some(chapter) = self.entities.chapter(chapter_id) else {
            tracing::debug!("Ignoring edit of missing chapter: {}", chapter_id);
            return false;
        };

        self.session.start_editing(chapter);
        self.mark(StorageKey::WritingSession);
        tracing::debug!("Editing chapter: {}", chapter_id);
        true
    }

    pub fn discard_changes(&mut self) {
        self.session.discard_changes();
        self.mark(StorageKey::WritingSession);
    }

    /// Write the draft into the bound chapter.
    ///
    /// Returns false without changing anything when no chapter is bound,
    /// the bound chapter no longer exists, or the draft is empty.
    pub fn save_current_chapter(&mut self) -> bool {
        let Some(chapter_id) = self.current_chapter().map(|c| c.id.clone()) else {
            return false;
        };
        if self.session.generated_content().is_empty() {
            return false;
        }

        let patch = ChapterPatch {
            content: Some(self.session.generated_content().to_string()),
            ..Default::default()
        };
        self.entities.update_chapter(&chapter_id, patch);
        self.session.mark_saved();
        self.mark(StorageKey::WritingSession);

        tracing::info!("Saved draft into chapter: {}", chapter_id);
        true
    }

    /// Whether a generation request may be sent right now
    pub fn can_send_to_ai(&self) -> bool {
        let Some(novel) = self.current_novel() else {
            return false;
        };

        !self.session.is_generating()
            && !self.session.user_input().trim().is_empty()
            && !novel.background_setting.trim().is_empty()
            && !novel.ai_writer_setting.trim().is_empty()
            && !self.current_chapter_next_overview().trim().is_empty()
    }

    // ===== Generation bridge =====

    /// Start a generation if the session allows it, marking it generating
    pub fn begin_generation(&mut self) -> Option<GenerationRequest> {
        if !self.can_send_to_ai() {
            return None;
        }
        let novel = self.current_novel()?;
        let chapter = self.current_chapter()?;

        let context = GenerationContext {
            novel_id: novel.id.clone(),
            background_setting: novel.background_setting.clone(),
            ai_writer_setting: novel.ai_writer_setting.clone(),
            history_context: self.history_context(None),
            next_chapter_overview: chapter.next_chapter_overview.clone(),
            user_input: self.session.user_input().to_string(),
        };
        let chapter_id = chapter.id.clone();

        self.generation_epoch += 1;
        let ticket = GenerationTicket {
            novel_id: context.novel_id.clone(),
            chapter_id,
            epoch: self.generation_epoch,
        };

        self.session.set_generating(true);
        self.mark(StorageKey::WritingSession);

        tracing::info!(
            "Generation {} started for chapter {}",
            ticket.epoch,
            ticket.chapter_id
        );
        Some(GenerationRequest { ticket, context })
    }

    /// Deliver the result of the generation identified by `ticket`
    pub fn finish_generation(
        &mut self,
        ticket: &GenerationTicket,
        result: Result<String>,
    ) -> GenerationOutcome {
        if ticket.epoch != self.generation_epoch {
            tracing::warn!(
                "Dropping result of superseded generation {} (current {})",
                ticket.epoch,
                self.generation_epoch
            );
            return GenerationOutcome::Stale;
        }

        self.session.set_generating(false);
        self.mark(StorageKey::WritingSession);

        let text = match result {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Generation {} failed: {}", ticket.epoch, e);
                return GenerationOutcome::Failed(e.to_string());
            }
        };

        let same_target = self.current_novel_id.as_deref() == Some(ticket.novel_id.as_str())
            && self.session.current_chapter_id() == Some(ticket.chapter_id.as_str());
        if !same_target {
            tracing::warn!(
                "Dropping result of generation {}: chapter {} is no longer being edited",
                ticket.epoch,
                ticket.chapter_id
            );
            return GenerationOutcome::Stale;
        }

        self.session.set_generated_content(text);
        tracing::info!("Generation {} applied", ticket.epoch);
        GenerationOutcome::Applied
    }

    // ===== Settings =====

    pub fn set_theme_mode(&mut self, mode: ThemeMode) {
        self.settings.theme_mode = mode;
        self.mark(StorageKey::Settings);
    }

    pub fn current_theme(&self, prefers_dark: bool) -> ResolvedTheme {
        self.settings.theme_mode.resolve(prefers_dark)
    }

    /// Change the history budget; out-of-range values are rejected
    pub fn set_history_chapters_max_chars(&mut self, max_chars: usize) -> bool {
        if !is_valid_history_budget(max_chars) {
            tracing::warn!("Rejected history budget: {}", max_chars);
            return false;
        }
        self.settings.history_chapters_max_chars = max_chars;
        self.mark(StorageKey::Settings);
        true
    }

    pub fn update_generation_config(&mut self, patch: GenerationConfigPatch) {
        self.generation_config.apply(patch);
        self.mark(StorageKey::GenerationConfig);
    }

    pub fn is_configured(&self) -> bool {
        self.generation_config.is_configured()
    }

    // ===== Persistence hooks =====

    /// Keys changed since the last call
    pub fn take_pending(&mut self) -> BTreeSet<StorageKey> {
        let mut pending = std::mem::take(&mut self.pending);
        pending.extend(self.entities.take_pending());
        pending
    }

    /// Install a session read from storage. Any in-flight generation is
    /// superseded, since its ticket refers to the replaced session.
    pub(crate) fn replace_session(&mut self, session: WritingSession) {
        self.session = session.restored();
        self.generation_epoch += 1;
    }

    pub(crate) fn replace_settings(&mut self, settings: AppSettings) {
        self.settings = settings;
    }

    pub(crate) fn replace_generation_config(&mut self, config: GenerationServiceConfig) {
        self.generation_config = config;
    }

    /// Re-select the novel the stored session was bound to, if it exists
    pub(crate) fn resume_current_novel(&mut self) {
        self.current_novel_id = self
            .session
            .novel_id()
            .filter(|id| self.entities.novel(id).is_some())
            .map(str::to_string);
    }

    fn reset_session_state(&mut self) {
        self.session.reset();
        self.generation_epoch += 1;
    }

    fn mark(&mut self, key: StorageKey) {
        self.pending.insert(key);
    }
}
