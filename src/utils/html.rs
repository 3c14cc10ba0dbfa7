// src/utils/html.rs

/// Sanitizes a question's rich-text paragraph before it is stored.
///
/// Whitelist based: formatting tags survive, scripts and event-handler
/// attributes are dropped. Blank input becomes `None`.
pub fn clean_paragraph(input: Option<&str>) -> Option<String> {
    let cleaned = ammonia::clean(input?.trim());
    if cleaned.is_empty() { None } else { Some(cleaned) }
}
