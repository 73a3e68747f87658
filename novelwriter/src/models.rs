//! Domain models
//!
//! Rust structs for every persisted entity. Field names serialize in
//! camelCase and timestamps as epoch milliseconds, which keeps the stored
//! payloads readable by earlier releases of the writing app.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A novel with the prompt settings shared by all its chapters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Novel {
    pub id: String,
    pub title: String,
    /// World and story background sent with every generation request
    pub background_setting: String,
    /// Persona the AI writer adopts
    pub ai_writer_setting: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// Update novel request
#[derive(Debug, Clone, Default)]
pub struct NovelPatch {
    pub title: Option<String>,
    pub background_setting: Option<String>,
    pub ai_writer_setting: Option<String>,
}

/// One chapter of a novel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub novel_id: String,
    pub title: String,
    pub content: String,
    /// Position within the novel, unique per novel and starting at 1
    pub order: u32,
    /// Forward-looking outline used as prompt context
    pub next_chapter_overview: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl Chapter {
    /// Text used for this chapter inside the history context
    pub fn formatted(&self) -> String {
        format!("Chapter {} {}: {}", self.order, self.title, self.content)
    }
}

/// Update chapter request
#[derive(Debug, Clone, Default)]
pub struct ChapterPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub order: Option<u32>,
    pub next_chapter_overview: Option<String>,
}

/// A character sheet attached to a novel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: String,
    pub novel_id: String,
    pub name: String,
    pub description: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// Update character request
#[derive(Debug, Clone, Default)]
pub struct CharacterPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Which novel setting a template fills in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Background,
    AiWriter,
}

/// Reusable text for background or AI writer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TemplateKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// Update template request
#[derive(Debug, Clone, Default)]
pub struct TemplatePatch {
    pub name: Option<String>,
    pub kind: Option<TemplateKind>,
    pub content: Option<String>,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_kind_serializes_under_type_key() {
        let template = Template {
            id: "t1".to_string(),
            name: "Wuxia".to_string(),
            kind: TemplateKind::AiWriter,
            content: "You write terse martial arts prose.".to_string(),
            description: None,
            created_at: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
            updated_at: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
        };

        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["type"], "ai_writer");
        assert_eq!(json["createdAt"], 1_700_000_000_000i64);
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_chapter_reads_camel_case_payload() {
        let raw = r#"{
            "id": "1700000000001",
            "novelId": "1700000000000",
            "title": "Arrival",
            "content": "The ship docked at dawn.",
            "order": 1,
            "nextChapterOverview": "The captain meets the magistrate.",
            "createdAt": 1700000000001,
            "updatedAt": 1700000000002
        }"#;

        let chapter: Chapter = serde_json::from_str(raw).unwrap();
        assert_eq!(chapter.novel_id, "1700000000000");
        assert_eq!(chapter.order, 1);
        assert_eq!(chapter.updated_at.timestamp_millis(), 1_700_000_000_002);
        assert_eq!(chapter.formatted(), "Chapter 1 Arrival: The ship docked at dawn.");
    }
}
