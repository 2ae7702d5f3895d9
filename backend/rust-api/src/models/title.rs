use chrono::Utc;
use lazy_static::lazy_static;
use rand::seq::IndexedRandom;
use regex::Regex;

use super::quiz::Question;
use crate::utils::time::format_month_day;

/// Source names the UI uses when there is no real file behind a quiz.
const PLACEHOLDER_SOURCES: [&str; 2] = ["File Upload", "Legacy Import"];

pub const FALLBACK_TOPICS: [&str; 7] = [
    "Science",
    "History",
    "Literature",
    "Math",
    "General Knowledge",
    "Geography",
    "Technology",
];

lazy_static! {
    static ref DOCUMENT_EXTENSION: Regex = Regex::new(r"(?i)\.(pdf|doc|docx|txt)$").unwrap();
}

/// Picks a display title for a quiz that was created without one.
///
/// Tries the source file name first, then the first question, then a random topic.
pub fn derive_title(source: Option<&str>, questions: &[Question]) -> String {
    source
        .and_then(title_from_source)
        .or_else(|| questions.first().and_then(title_from_question))
        .unwrap_or_else(fallback_title)
}

fn title_from_source(source: &str) -> Option<String> {
    if PLACEHOLDER_SOURCES.contains(&source) {
        return None;
    }

    let stem = DOCUMENT_EXTENSION.replace(source, "");
    let spaced = stem.replace(['_', '-'], " ");
    let title = spaced
        .split(' ')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();

    if title.is_empty() || PLACEHOLDER_SOURCES.contains(&title.as_str()) {
        None
    } else {
        Some(title)
    }
}

fn title_from_question(question: &Question) -> Option<String> {
    let cleaned: String = question
        .question
        .chars()
        .filter(|c| !matches!(c, '?' | '.' | ',' | '!'))
        .collect();

    let words: Vec<&str> = cleaned
        .split(' ')
        .filter(|word| word.chars().count() > 3)
        .take(3)
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(format!("{} Quiz", words.join(" ")))
    }
}

fn fallback_title() -> String {
    let topic = FALLBACK_TOPICS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or("General Knowledge");
    format!("{} Quiz - {}", topic, format_month_day(Utc::now()))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
