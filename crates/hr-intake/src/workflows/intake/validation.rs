use std::sync::OnceLock;

use regex::Regex;

fn google_doc_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^https?://docs\.google\.com/document/d/([a-z0-9_-]+)")
            .unwrap_or_else(|err| unreachable!("static resume link pattern is valid: {err}"))
    })
}

/// Document identifier of a Google Docs link, if `candidate` is one.
///
/// Only the shape is checked; the document may still be private or missing.
pub fn accepted_document_id(candidate: &str) -> Option<&str> {
    google_doc_pattern()
        .captures(candidate.trim())
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str())
}

pub fn is_accepted_link(candidate: &str) -> bool {
    accepted_document_id(candidate).is_some()
}
