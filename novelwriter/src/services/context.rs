//! Chapter ordering and history context selection
//!
//! Pure functions over a chapter slice. The history context is always made
//! of whole chapters: a chapter that does not fit the budget ends the
//! selection instead of being truncated.

use crate::config::HISTORY_SEPARATOR;
use crate::models::Chapter;

const SEPARATOR_CHARS: usize = HISTORY_SEPARATOR.len();

/// Chapters of a novel in reading order.
///
/// The sort is stable, so chapters sharing an order keep their input order.
pub fn novel_chapters<'a>(chapters: &'a [Chapter], novel_id: &str) -> Vec<&'a Chapter> {
    let mut selected: Vec<&Chapter> = chapters.iter().filter(|c| c.novel_id == novel_id).collect();
    selected.sort_by_key(|c| c.order);
    selected
}

/// Chapters of a novel that precede `current_order`, in reading order.
/// Without a current chapter there is no history.
pub fn history_chapters<'a>(
    chapters: &'a [Chapter],
    novel_id: &str,
    current_order: Option<u32>,
) -> Vec<&'a Chapter> {
    let Some(current_order) = current_order else {
        return Vec::new();
    };

    novel_chapters(chapters, novel_id)
        .into_iter()
        .filter(|c| c.order < current_order)
        .collect()
}

/// Join the longest suffix of `history` that fits in `char_limit` characters.
pub fn assemble_history_context(history: &[&Chapter], char_limit: usize) -> String {
    let mut selected: Vec<String> = Vec::new();
    let mut total = 0usize;

    for chapter in history.iter().rev() {
        let text = chapter.formatted();
        let overhead = if selected.is_empty() { 0 } else { SEPARATOR_CHARS };
        let needed = total + overhead + text.chars().count();

        if needed > char_limit {
            break;
        }

        total = needed;
        selected.push(text);
    }

    if selected.len() < history.len() {
        tracing::debug!(
            "History context keeps {} of {} chapters ({} chars, limit {})",
            selected.len(),
            history.len(),
            total,
            char_limit
        );
    }

    selected.reverse();
    selected.join(HISTORY_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn chapter(novel_id: &str, order: u32, title: &str, content: &str) -> Chapter {
        Chapter {
            id: format!("{}-{}", novel_id, order),
            novel_id: novel_id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            order,
            next_chapter_overview: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// Chapter whose formatted text is exactly 100 characters
    fn hundred_char_chapter(order: u32) -> Chapter {
        // "Chapter N T: " is 13 characters
        chapter("n", order, "T", &"x".repeat(87))
    }

    #[test]
    fn test_novel_chapters_sorted_and_filtered() {
        let chapters = vec![
            chapter("n", 3, "c", ""),
            chapter("other", 1, "x", ""),
            chapter("n", 1, "a", ""),
            chapter("n", 2, "b", ""),
        ];

        let titles: Vec<&str> = novel_chapters(&chapters, "n")
            .iter()
            .map(|c| c.title.as_str())
            .collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_novel_chapters_ties_keep_input_order() {
        let chapters = vec![
            chapter("n", 2, "second-first", ""),
            chapter("n", 1, "one", ""),
            chapter("n", 2, "second-second", ""),
        ];

        let titles: Vec<&str> = novel_chapters(&chapters, "n")
            .iter()
            .map(|c| c.title.as_str())
            .collect();
        assert_eq!(titles, vec!["one", "second-first", "second-second"]);
    }

    #[test]
    fn test_history_chapters_precede_current() {
        let chapters = vec![
            chapter("n", 1, "a", ""),
            chapter("n", 2, "b", ""),
            chapter("n", 3, "c", ""),
        ];

        let orders: Vec<u32> = history_chapters(&chapters, "n", Some(3))
            .iter()
            .map(|c| c.order)
            .collect();
        assert_eq!(orders, vec![1, 2]);

        assert!(history_chapters(&chapters, "n", Some(1)).is_empty());
        assert!(history_chapters(&chapters, "n", None).is_empty());
    }

    #[test]
    fn test_selects_most_recent_chapters_that_fit() {
        let chapters: Vec<Chapter> = (1..=3).map(hundred_char_chapter).collect();
        assert!(chapters.iter().all(|c| c.formatted().chars().count() == 100));

        let history = history_chapters(&chapters, "n", Some(4));
        let context = assemble_history_context(&history, 250);

        let expected = format!("{}\n\n{}", chapters[1].formatted(), chapters[2].formatted());
        assert_eq!(context, expected);
        assert!(!context.contains("Chapter 1 "));
        assert!(context.find("Chapter 2 ").unwrap() < context.find("Chapter 3 ").unwrap());
    }

    #[test]
    fn test_oversized_nearest_chapter_yields_empty_context() {
        let chapters = vec![
            chapter("n", 1, "a", "short"),
            chapter("n", 2, "b", "short"),
            chapter("n", 3, "c", &"long ".repeat(100)),
        ];
        let history = history_chapters(&chapters, "n", Some(4));
        let nearest_len = chapters[2].formatted().chars().count();

        assert_eq!(assemble_history_context(&history, nearest_len - 1), "");
    }

    #[test]
    fn test_limit_counts_separators() {
        let chapters: Vec<Chapter> = (1..=2).map(hundred_char_chapter).collect();
        let history = history_chapters(&chapters, "n", Some(3));

        // 100 + 2 + 100 = 202
        assert_eq!(assemble_history_context(&history, 201), chapters[1].formatted());
        assert_eq!(assemble_history_context(&history, 202).chars().count(), 202);
    }

    #[test]
    fn test_limit_counts_characters_not_bytes() {
        let chapters = vec![chapter("n", 1, "序章", "天色将明，船已靠岸。")];
        let history = history_chapters(&chapters, "n", Some(2));
        let text = chapters[0].formatted();
        let chars = text.chars().count();
        assert!(text.len() > chars);

        assert_eq!(assemble_history_context(&history, chars), text);
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(assemble_history_context(&[], 20_000), "");
    }
}
