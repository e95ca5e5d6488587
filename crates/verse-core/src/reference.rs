//! Verse references as supplied by the reader's navigation state.

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

static REFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*((?:[1-3]\s*)?[A-Za-z][A-Za-z .']*?)\s+(\d{1,3})\s*:\s*(\d{1,3})\s*$")
        .expect("reference pattern is valid")
});

/// Immutable pointer at a single verse in a specific translation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VerseReference {
    pub translation_id: String,
    pub book_id: String,
    pub book_name: String,
    pub chapter: u32,
    pub verse: u32,
    #[serde(default)]
    pub text: String,
}

impl VerseReference {
    pub fn new(
        translation_id: impl Into<String>,
        book_name: impl Into<String>,
        chapter: u32,
        verse: u32,
        text: impl Into<String>,
    ) -> Self {
        let book_name = normalize_book_name(&book_name.into());
        Self {
            translation_id: translation_id.into().trim().to_ascii_uppercase(),
            book_id: book_id_for(&book_name),
            book_name,
            chapter,
            verse,
            text: text.into(),
        }
    }

    /// Parses `"Book C:V"` (for example `"1 John 4:8"`).
    pub fn parse(input: &str, translation_id: &str) -> Result<Self> {
        let caps = REFERENCE_RE
            .captures(input)
            .ok_or_else(|| anyhow!("Not a verse reference: {input:?} (expected \"Book C:V\")"))?;
        let chapter: u32 = caps[2].parse()?;
        let verse: u32 = caps[3].parse()?;
        if chapter == 0 || verse == 0 {
            return Err(anyhow!("Chapter and verse start at 1: {input:?}"));
        }
        Ok(Self::new(translation_id, &caps[1], chapter, verse, ""))
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn short_display(&self) -> String {
        format!("{} {}:{}", self.book_name, self.chapter, self.verse)
    }

    pub fn shareable_display(&self) -> String {
        format!("{} ({})", self.short_display(), self.translation_id)
    }

    pub fn same_chapter(&self, translation_id: &str, book_id: &str, chapter: u32) -> bool {
        self.translation_id.eq_ignore_ascii_case(translation_id)
            && self.book_id == book_id
            && self.chapter == chapter
    }
}

impl std::fmt::Display for VerseReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.shareable_display())
    }
}

fn normalize_book_name(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    // "1John" -> "1 John"
    let mut chars = collapsed.chars();
    match chars.next() {
        Some(first @ '1'..='3') => {
            let rest: String = chars.collect();
            format!("{first} {}", rest.trim_start())
        }
        _ => collapsed,
    }
}

pub fn book_id_for(book_name: &str) -> String {
    book_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
