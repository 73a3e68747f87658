//! Writing session state machine
//!
//! Tracks the chapter being edited, the saved baseline (`original_content`)
//! and the draft (`generated_content`). The session is dirty when the draft
//! differs from the baseline. Saving is the one exception: it empties the
//! draft buffer and leaves the session clean, and the editor then shows the
//! saved chapter.
//!
//! The session knows its chapter by id only. Whether that id still names a
//! chapter is for `Workspace` to decide, so `state` and `has_draft` here are
//! crate-internal building blocks.

use crate::models::Chapter;
use serde::{Deserialize, Serialize};

/// Editing state derived from the session fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No chapter bound
    Idle,
    /// Draft matches the saved baseline
    Clean,
    /// Draft differs from the saved baseline
    Dirty,
}

/// The single in-progress writing session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WritingSession {
    #[serde(skip_serializing_if = "Option::is_none")]
    novel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_chapter_id: Option<String>,
    user_input: String,
    generated_content: String,
    is_generating: bool,
    has_unsaved_changes: bool,
    original_content: String,
}

impl WritingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn novel_id(&self) -> Option<&str> {
        self.novel_id.as_deref()
    }

    pub fn current_chapter_id(&self) -> Option<&str> {
        self.current_chapter_id.as_deref()
    }

    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    pub fn generated_content(&self) -> &str {
        &self.generated_content
    }

    pub fn original_content(&self) -> &str {
        &self.original_content
    }

    pub fn is_generating(&self) -> bool {
        self.is_generating
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.has_unsaved_changes
    }

    /// State assuming the bound chapter id, if any, still exists
    pub(crate) fn state(&self) -> SessionState {
        if self.current_chapter_id.is_none() {
            SessionState::Idle
        } else if self.has_unsaved_changes {
            SessionState::Dirty
        } else {
            SessionState::Clean
        }
    }

    /// A chapter id is bound and a draft is held
    pub(crate) fn has_draft(&self) -> bool {
        self.current_chapter_id.is_some() && !self.generated_content.is_empty()
    }

    pub(crate) fn bind_novel(&mut self, novel_id: &str) {
        self.novel_id = Some(novel_id.to_string());
    }

    /// Start (or resume) editing `chapter`.
    ///
    /// Switching to another chapter, or resuming without a draft, reloads the
    /// draft from the saved chapter. Resuming the same chapter keeps the draft
    /// and refreshes the baseline.
    pub(crate) fn start_editing(&mut self, chapter: &Chapter) {
        let same_chapter = self.current_chapter_id.as_deref() == Some(chapter.id.as_str());

        self.current_chapter_id = Some(chapter.id.clone());
        self.original_content = chapter.content.clone();

        if same_chapter && !self.generated_content.is_empty() {
            self.recompute_dirty();
        } else {
            self.generated_content = chapter.content.clone();
            self.has_unsaved_changes = false;
        }
    }

    pub(crate) fn set_generated_content(&mut self, content: String) {
        self.generated_content = content;
        self.recompute_dirty();
    }

    pub(crate) fn set_user_input(&mut self, input: String) {
        self.user_input = input;
    }

    pub(crate) fn set_generating(&mut self, generating: bool) {
        self.is_generating = generating;
    }

    /// Drop the draft and the pending prompt
    pub(crate) fn discard_changes(&mut self) {
        self.generated_content = self.original_content.clone();
        self.has_unsaved_changes = false;
        self.user_input.clear();
    }

    /// Record that the draft has been written to the chapter. The draft
    /// becomes the new baseline and the draft buffer is emptied; the
    /// session is clean even though the empty buffer differs from it.
    pub(crate) fn mark_saved(&mut self) {
        self.original_content = std::mem::take(&mut self.generated_content);
        self.has_unsaved_changes = false;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Copy suitable for storage: never persisted as generating
    pub fn persisted(&self) -> Self {
        Self {
            is_generating: false,
            ..self.clone()
        }
    }

    /// Session loaded from storage, with the generating flag cleared
    pub(crate) fn restored(mut self) -> Self {
        self.is_generating = false;
        self
    }

    fn recompute_dirty(&mut self) {
        self.has_unsaved_changes = self.generated_content != self.original_content;
    }
}
