//! Pulls scripture citations out of generated markdown.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static CITATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"((?:[1-3]\s?)?[A-Z][a-z]+(?:\s(?:of\s)?[A-Z][a-z]+)*)\s(\d{1,3}):(\d{1,3})(?:\s?[-–]\s?(\d{1,3}))?",
    )
    .expect("citation pattern is valid")
});

const BOOKS: [&str; 66] = [
    "Genesis",
    "Exodus",
    "Leviticus",
    "Numbers",
    "Deuteronomy",
    "Joshua",
    "Judges",
    "Ruth",
    "1 Samuel",
    "2 Samuel",
    "1 Kings",
    "2 Kings",
    "1 Chronicles",
    "2 Chronicles",
    "Ezra",
    "Nehemiah",
    "Esther",
    "Job",
    "Psalms",
    "Proverbs",
    "Ecclesiastes",
    "Song of Solomon",
    "Isaiah",
    "Jeremiah",
    "Lamentations",
    "Ezekiel",
    "Daniel",
    "Hosea",
    "Joel",
    "Amos",
    "Obadiah",
    "Jonah",
    "Micah",
    "Nahum",
    "Habakkuk",
    "Zephaniah",
    "Haggai",
    "Zechariah",
    "Malachi",
    "Matthew",
    "Mark",
    "Luke",
    "John",
    "Acts",
    "Romans",
    "1 Corinthians",
    "2 Corinthians",
    "Galatians",
    "Ephesians",
    "Philippians",
    "Colossians",
    "1 Thessalonians",
    "2 Thessalonians",
    "1 Timothy",
    "2 Timothy",
    "Titus",
    "Philemon",
    "Hebrews",
    "James",
    "1 Peter",
    "2 Peter",
    "1 John",
    "2 John",
    "3 John",
    "Jude",
    "Revelation",
];

/// Canonical book name for `raw`, accepting "Psalm" and unspaced "1John".
pub fn canonical_book(raw: &str) -> Option<&'static str> {
    let mut name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some(first) = name.chars().next().filter(|c| matches!(c, '1'..='3')) {
        if name.chars().nth(1).is_some_and(|c| c != ' ') {
            name = format!("{first} {}", &name[1..]);
        }
    }
    if name == "Psalm" {
        return Some("Psalms");
    }
    BOOKS
        .iter()
        .copied()
        .find(|book| book.eq_ignore_ascii_case(&name))
}

/// Scripture references in order of first appearance, without duplicates.
pub fn extract_citations(markdown: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for caps in CITATION_RE.captures_iter(markdown) {
        let Some(book) = resolve_book(&caps[1]) else {
            continue;
        };
        let mut citation = format!("{book} {}:{}", &caps[2], &caps[3]);
        if let Some(end) = caps.get(4) {
            citation.push('-');
            citation.push_str(end.as_str());
        }
        if seen.insert(citation.clone()) {
            out.push(citation);
        }
    }
    out
}

/// The pattern is greedy over capitalised words, so "See Romans" has to fall
/// back to its trailing words until one names a book.
fn resolve_book(candidate: &str) -> Option<&'static str> {
    let words: Vec<&str> = candidate.split_whitespace().collect();
    (0..words.len()).find_map(|start| canonical_book(&words[start..].join(" ")))
}
