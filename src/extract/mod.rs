//! Per-message content extraction: attachments to disk, body text for rendering.

pub mod attachment;
pub mod body;

use mail_parser::{MessagePart, MimeHeaders};

/// Whether a part's Content-Disposition value contains `needle`.
///
/// Disposition vocabulary is free-form text, so this stays a plain
/// substring check rather than a typed enum.
pub(crate) fn disposition_contains(part: &MessagePart<'_>, needle: &str) -> bool {
    part.content_disposition()
        .map(|d: &mail_parser::ContentType| d.ctype().to_ascii_lowercase().contains(needle))
        .unwrap_or(false)
}

/// Full `type/subtype` string of a part, defaulting to `application/octet-stream`.
pub(crate) fn content_type_string(part: &MessagePart<'_>) -> String {
    part.content_type()
        .map(|ct: &mail_parser::ContentType| {
            let main = ct.ctype();
            match ct.subtype() {
                Some(sub) => format!("{main}/{sub}"),
                None => main.to_string(),
            }
        })
        .unwrap_or_else(|| "application/octet-stream".to_string())
}
