//! Text preparation before embedding
//!
//! Crossref abstracts arrive wrapped in JATS markup (`<jats:p>`, `<jats:title>`)
//! and arXiv abstracts carry hard line breaks. Both are normalised away so the
//! model sees the same text regardless of the source.

use regex_lite::Regex;
use std::sync::OnceLock;

fn markup_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"</?[A-Za-z][A-Za-z0-9:_-]*[^>]*>").expect("valid markup pattern"))
}

fn whitespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

/// Strip markup tags and control characters, collapse whitespace
pub fn clean_text(raw: &str) -> String {
    let without_tags = markup_pattern().replace_all(raw, " ");
    let printable: String = without_tags
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    whitespace_pattern().replace_all(&printable, " ").trim().to_string()
}

/// Build the text embedded for a paper: cleaned title and abstract on separate lines
pub fn prepare_text(title: &str, abstract_text: &str) -> String {
    let title = clean_text(title);
    let abstract_text = clean_text(abstract_text);

    match (title.is_empty(), abstract_text.is_empty()) {
        (false, false) => format!("{}\n{}", title, abstract_text),
        (false, true) => title,
        (true, _) => abstract_text,
    }
}
