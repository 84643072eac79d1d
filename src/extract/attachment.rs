//! Attachment extraction.
//!
//! Walks every part of a message, saves qualifying parts to the
//! attachments directory under collision-free names, and returns the
//! records the renderer needs for its attachment table. Nothing here is
//! fatal: a part that cannot be saved is logged and skipped.

use std::path::{Path, PathBuf};

use mail_parser::{Message, MessagePart, MimeHeaders, PartType};
use tracing::{error, info, warn};

use super::{content_type_string, disposition_contains};
use crate::model::attachment::AttachmentRecord;

/// Result of extracting one message's attachments.
#[derive(Debug, Default)]
pub struct ExtractedAttachments {
    /// Records for attachments actually written to disk.
    pub records: Vec<AttachmentRecord>,
    /// Qualifying parts encountered, including those that failed to save.
    pub found: u64,
}

impl ExtractedAttachments {
    /// Attachments written to disk.
    pub fn saved(&self) -> u64 {
        self.records.len() as u64
    }
}

/// Extract all attachments of `msg` into `dir`.
///
/// `ordinal` is the 1-based message number; saved filenames are prefixed
/// with it (zero-padded to four digits) so attachments from different
/// messages never collide. The directory must already exist.
pub fn extract_attachments(msg: &Message<'_>, ordinal: u64, dir: &Path) -> ExtractedAttachments {
    let mut out = ExtractedAttachments::default();
    let mut synthesized = 0u64;
    extract_from_parts(msg, ordinal, dir, &mut out, &mut synthesized);
    out
}

/// Depth-first walk: the flat part list covers nested multiparts;
/// attached message/rfc822 parts are descended into explicitly.
fn extract_from_parts(
    msg: &Message<'_>,
    ordinal: u64,
    dir: &Path,
    out: &mut ExtractedAttachments,
    synthesized: &mut u64,
) {
    for part in &msg.parts {
        if disposition_contains(part, "attachment") || disposition_contains(part, "inline") {
            save_part(part, ordinal, dir, out, synthesized);
        }
        if let PartType::Message(nested) = &part.body {
            extract_from_parts(nested, ordinal, dir, out, synthesized);
        }
    }
}

fn save_part(
    part: &MessagePart<'_>,
    ordinal: u64,
    dir: &Path,
    out: &mut ExtractedAttachments,
    synthesized: &mut u64,
) {
    out.found += 1;

    let content_type = content_type_string(part);
    let filename = match part.attachment_name() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            *synthesized += 1;
            format!("attachment_{synthesized}{}", extension_for_type(&content_type))
        }
    };

    let safe_filename = sanitize_filename(&filename);
    let path = unique_path(dir, &format!("{ordinal:04}_{safe_filename}"));

    let payload = part.contents();
    if payload.is_empty() {
        warn!(
            ordinal,
            filename = %filename,
            "Attachment payload is empty or could not be decoded, skipping"
        );
        return;
    }

    match std::fs::write(&path, payload) {
        Ok(()) => {
            let saved_as = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!(ordinal, filename = %filename, saved_as = %saved_as, "Saved attachment");
            out.records.push(AttachmentRecord {
                filename,
                saved_as,
                path: std::path::absolute(&path).unwrap_or(path),
                size: payload.len() as u64,
                content_type,
            });
        }
        Err(e) => {
            error!(
                ordinal,
                filename = %filename,
                path = %path.display(),
                error = %e,
                "Failed to save attachment"
            );
        }
    }
}

/// File extension (with leading dot) for a MIME type, `.bin` if unmappable.
fn extension_for_type(content_type: &str) -> String {
    mime_guess::get_mime_extensions_str(content_type)
        .and_then(|exts| exts.first())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| ".bin".to_string())
}

/// Sanitize a declared filename for the filesystem.
///
/// Keeps alphanumerics, `-`, `_`, `.` and spaces; everything else
/// becomes `_`. Truncated to 100 characters.
pub fn sanitize_filename(name: &str) -> String {
    if name.is_empty() {
        return "unknown_file".to_string();
    }
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .take(100)
        .collect()
}

/// If `dir/filename` already exists, append `_1`, `_2`, … before the
/// extension until the name is free.
fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let path = dir.join(filename);
    if !path.exists() {
        return path;
    }

    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let ext = Path::new(filename).extension().and_then(|e| e.to_str());

    for i in 1..10_000 {
        let candidate = match ext {
            Some(e) => dir.join(format!("{stem}_{i}.{e}")),
            None => dir.join(format!("{stem}_{i}")),
        };
        if !candidate.exists() {
            return candidate;
        }
    }

    // Practically unreachable
    dir.join(format!("{stem}_dup"))
}
