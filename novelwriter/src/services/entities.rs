//! Entity store
//!
//! In-memory collections of novels, chapters, templates and characters.
//! Mutators never touch storage: they record which collections changed and
//! the coordinator drains that set after each call.

use crate::models::{
    Chapter, ChapterPatch, Character, CharacterPatch, Novel, NovelPatch, Template, TemplateKind,
    TemplatePatch,
};
use crate::storage::StorageKey;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Millisecond clock that never hands out the same instant twice
#[derive(Debug, Clone, Default)]
pub struct Clock {
    last: Option<DateTime<Utc>>,
}

impl Clock {
    /// Next timestamp, strictly later than every earlier one
    pub fn now(&mut self) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(3);
        let stamp = match self.last {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last = Some(stamp);
        stamp
    }

    /// Account for a timestamp loaded from storage
    pub fn observe(&mut self, stamp: DateTime<Utc>) {
        if self.last.map_or(true, |last| stamp > last) {
            self.last = Some(stamp);
        }
    }
}

/// Owner of every entity collection
#[derive(Debug, Default)]
pub struct EntityStore {
    novels: Vec<Novel>,
    chapters: Vec<Chapter>,
    templates: Vec<Template>,
    characters: Vec<Character>,
    clock: Clock,
    pending: BTreeSet<StorageKey>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn novels(&self) -> &[Novel] {
        &self.novels
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn novel(&self, id: &str) -> Option<&Novel> {
        self.novels.iter().find(|n| n.id == id)
    }

    pub fn chapter(&self, id: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == id)
    }

    pub fn template(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn character(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    // ===== Novels =====

    /// Create a new novel
    pub fn create_novel(
        &mut self,
        title: impl Into<String>,
        background_setting: impl Into<String>,
        ai_writer_setting: impl Into<String>,
    ) -> Novel {
        let now = self.clock.now();
        let novel = Novel {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            background_setting: background_setting.into(),
            ai_writer_setting: ai_writer_setting.into(),
            created_at: now,
            updated_at: now,
        };

        self.novels.push(novel.clone());
        self.mark(StorageKey::Novels);

        tracing::info!("Created novel: {} ({})", novel.title, novel.id);
        novel
    }

    /// Update a novel, returns false if it does not exist
    pub fn update_novel(&mut self, id: &str, patch: NovelPatch) -> bool {
        let now = self.clock.now();
        let Some(novel) = self.novels.iter_mut().find(|n| n.id == id) else {
            tracing::debug!("Ignoring update for missing novel: {}", id);
            return false;
        };

        if let Some(title) = patch.title {
            novel.title = title;
        }
        if let Some(background_setting) = patch.background_setting {
            novel.background_setting = background_setting;
        }
        if let Some(ai_writer_setting) = patch.ai_writer_setting {
            novel.ai_writer_setting = ai_writer_setting;
        }
        novel.updated_at = now;

        self.mark(StorageKey::Novels);
        tracing::debug!("Updated novel: {}", id);
        true
    }

    /// Remove a novel together with its chapters and characters.
    ///
    /// Session cleanup is the workspace's job, so callers go through
    /// `Workspace::delete_novel`.
    pub(crate) fn remove_novel(&mut self, id: &str) -> bool {
        let before = self.novels.len();
        self.novels.retain(|n| n.id != id);
        if self.novels.len() == before {
            return false;
        }

        let chapters_before = self.chapters.len();
        self.chapters.retain(|c| c.novel_id != id);
        let characters_before = self.characters.len();
        self.characters.retain(|c| c.novel_id != id);

        self.mark(StorageKey::Novels);
        self.mark(StorageKey::Chapters);
        self.mark(StorageKey::Characters);

        tracing::info!(
            "Deleted novel {} with {} chapters and {} characters",
            id,
            chapters_before - self.chapters.len(),
            characters_before - self.characters.len()
        );
        true
    }

    // ===== Chapters =====

    /// Create a chapter at the end of a novel
    pub fn create_chapter(
        &mut self,
        novel_id: impl Into<String>,
        title: impl Into<String>,
        next_chapter_overview: impl Into<String>,
    ) -> Chapter {
        let novel_id = novel_id.into();
        let max_order = self
            .chapters
            .iter()
            .filter(|c| c.novel_id == novel_id)
            .map(|c| c.order)
            .max()
            .unwrap_or(0);

        let now = self.clock.now();
        let chapter = Chapter {
            id: Uuid::new_v4().to_string(),
            novel_id,
            title: title.into(),
            content: String::new(),
            order: max_order + 1,
            next_chapter_overview: next_chapter_overview.into(),
            created_at: now,
            updated_at: now,
        };

        self.chapters.push(chapter.clone());
        self.mark(StorageKey::Chapters);

        tracing::info!(
            "Created chapter {} ({}) in novel {}",
            chapter.order,
            chapter.id,
            chapter.novel_id
        );
        chapter
    }

    /// Update a chapter, returns false if it does not exist
    pub fn update_chapter(&mut self, id: &str, patch: ChapterPatch) -> bool {
        let now = self.clock.now();
        let Some(chapter) = self.chapters.iter_mut().find(|c| c.id == id) else {
            tracing::debug!("Ignoring update for missing chapter: {}", id);
            return false;
        };

        if let Some(title) = patch.title {
            chapter.title = title;
        }
        if let Some(content) = patch.content {
            chapter.content = content;
        }
        if let Some(order) = patch.order {
            chapter.order = order;
        }
        if let Some(overview) = patch.next_chapter_overview {
            chapter.next_chapter_overview = overview;
        }
        chapter.updated_at = now;

        self.mark(StorageKey::Chapters);
        tracing::debug!("Updated chapter: {}", id);
        true
    }

    pub fn delete_chapter(&mut self, id: &str) -> bool {
        let before = self.chapters.len();
        self.chapters.retain(|c| c.id != id);
        if self.chapters.len() == before {
            return false;
        }

        self.mark(StorageKey::Chapters);
        tracing::info!("Deleted chapter: {}", id);
        true
    }

    // ===== Templates =====

    /// Create a reusable setting template
    pub fn create_template(
        &mut self,
        name: impl Into<String>,
        kind: TemplateKind,
        content: impl Into<String>,
        description: Option<String>,
    ) -> Template {
        let now = self.clock.now();
        let template = Template {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            kind,
            content: content.into(),
            description,
            created_at: now,
            updated_at: now,
        };

        self.templates.push(template.clone());
        self.mark(StorageKey::Templates);

        tracing::info!("Created {:?} template: {}", kind, template.name);
        template
    }

    pub fn update_template(&mut self, id: &str, patch: TemplatePatch) -> bool {
        let now = self.clock.now();
        let Some(template) = self.templates.iter_mut().find(|t| t.id == id) else {
            tracing::debug!("Ignoring update for missing template: {}", id);
            return false;
        };

        if let Some(name) = patch.name {
            template.name = name;
        }
        if let Some(kind) = patch.kind {
            template.kind = kind;
        }
        if let Some(content) = patch.content {
            template.content = content;
        }
        if let Some(description) = patch.description {
            template.description = Some(description);
        }
        template.updated_at = now;

        self.mark(StorageKey::Templates);
        tracing::debug!("Updated template: {}", id);
        true
    }

    pub fn delete_template(&mut self, id: &str) -> bool {
        let before = self.templates.len();
        self.templates.retain(|t| t.id != id);
        if self.templates.len() == before {
            return false;
        }

        self.mark(StorageKey::Templates);
        tracing::info!("Deleted template: {}", id);
        true
    }

    /// Templates of one kind, most recently updated first
    pub fn templates_of_kind(&self, kind: TemplateKind) -> Vec<&Template> {
        let mut templates: Vec<&Template> =
            self.templates.iter().filter(|t| t.kind == kind).collect();
        templates.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        templates
    }

    pub fn background_templates(&self) -> Vec<&Template> {
        self.templates_of_kind(TemplateKind::Background)
    }

    pub fn ai_writer_templates(&self) -> Vec<&Template> {
        self.templates_of_kind(TemplateKind::AiWriter)
    }

    // ===== Characters =====

    pub fn create_character(
        &mut self,
        novel_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Character {
        let now = self.clock.now();
        let character = Character {
            id: Uuid::new_v4().to_string(),
            novel_id: novel_id.into(),
            name: name.into(),
            description: description.into(),
            created_at: now,
            updated_at: now,
        };

        self.characters.push(character.clone());
        self.mark(StorageKey::Characters);

        tracing::info!("Created character {} in novel {}", character.name, character.novel_id);
        character
    }

    pub fn update_character(&mut self, id: &str, patch: CharacterPatch) -> bool {
        let now = self.clock.now();
        let Some(character) = self.characters.iter_mut().find(|c| c.id == id) else {
            tracing::debug!("Ignoring update for missing character: {}", id);
            return false;
        };

        if let Some(name) = patch.name {
            character.name = name;
        }
        if let Some(description) = patch.description {
            character.description = description;
        }
        character.updated_at = now;

        self.mark(StorageKey::Characters);
        tracing::debug!("Updated character: {}", id);
        true
    }

    pub fn delete_character(&mut self, id: &str) -> bool {
        let before = self.characters.len();
        self.characters.retain(|c| c.id != id);
        if self.characters.len() == before {
            return false;
        }

        self.mark(StorageKey::Characters);
        tracing::info!("Deleted character: {}", id);
        true
    }

    /// Characters of a novel, most recently updated first
    pub fn characters_for_novel(&self, novel_id: &str) -> Vec<&Character> {
        let mut characters: Vec<&Character> = self
            .characters
            .iter()
            .filter(|c| c.novel_id == novel_id)
            .collect();
        characters.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        characters
    }

    // ===== Persistence hooks =====

    /// Collections changed since the last call
    pub fn take_pending(&mut self) -> BTreeSet<StorageKey> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn replace_novels(&mut self, novels: Vec<Novel>) {
        novels.iter().for_each(|n| self.clock.observe(n.updated_at));
        self.novels = novels;
    }

    pub(crate) fn replace_chapters(&mut self, chapters: Vec<Chapter>) {
        chapters.iter().for_each(|c| self.clock.observe(c.updated_at));
        self.chapters = chapters;
    }

    pub(crate) fn replace_templates(&mut self, templates: Vec<Template>) {
        templates.iter().for_each(|t| self.clock.observe(t.updated_at));
        self.templates = templates;
    }

    pub(crate) fn replace_characters(&mut self, characters: Vec<Character>) {
        characters.iter().for_each(|c| self.clock.observe(c.updated_at));
        self.characters = characters;
    }

    fn mark(&mut self, key: StorageKey) {
        self.pending.insert(key);
    }
}
