//! Batch orchestration: one sequential pass over the archive.
//!
//! Each message runs through decode → extract → render behind an
//! explicit per-message `Result`; a failure is logged with its ordinal,
//! counted, and the batch moves on. Only an archive-level error (the
//! mbox cannot be opened at all) aborts the run.

use std::path::PathBuf;
use std::time::Instant;

use mail_parser::MessageParser;
use tracing::{debug, error, info};

use crate::error::{ConvertError, Result};
use crate::extract::attachment::extract_attachments;
use crate::extract::body::extract_body;
use crate::model::message::MessageFields;
use crate::model::summary::RunSummary;
use crate::parser::header::RawHeaders;
use crate::parser::mbox::{strip_separator_line, MboxParser};
use crate::render::pdf::render_document;

/// Name of the detailed log file inside the output directory.
pub const LOG_FILE_NAME: &str = "conversion.log";

/// Per-run settings, resolved from CLI flags and config.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Input mbox archive.
    pub input: PathBuf,
    /// Directory receiving one PDF per message.
    pub output_dir: PathBuf,
    /// Whether attachments are extracted at all.
    pub extract_attachments: bool,
    /// Directory receiving attachment files.
    pub attachments_dir: PathBuf,
}

/// What one successfully converted message contributed to the totals.
struct MessageOutcome {
    attachments_found: u64,
    attachments_saved: u64,
}

/// Convert every message in the archive.
///
/// `progress` receives `(current, total)` after each message. Returns
/// the aggregated [`RunSummary`]; per-message failures are counted, not
/// propagated.
pub fn convert_mbox(
    opts: &ConvertOptions,
    progress: Option<&dyn Fn(u64, u64)>,
) -> Result<RunSummary> {
    let parser = MboxParser::new(&opts.input)?;
    info!(path = %opts.input.display(), "Opening mbox archive");

    let total = parser.count_messages()?;
    info!(total, "Messages found in archive");

    std::fs::create_dir_all(&opts.output_dir)
        .map_err(|e| ConvertError::io(&opts.output_dir, e))?;
    if opts.extract_attachments {
        std::fs::create_dir_all(&opts.attachments_dir)
            .map_err(|e| ConvertError::io(&opts.attachments_dir, e))?;
    }

    let start = Instant::now();
    let mut ordinal: u64 = 0;
    let mut succeeded: u64 = 0;
    let mut failed: u64 = 0;
    let mut attachments_found: u64 = 0;
    let mut attachments_saved: u64 = 0;

    parser.parse(&mut |_offset, raw| {
        ordinal += 1;
        match process_message(raw, ordinal, opts) {
            Ok(outcome) => {
                succeeded += 1;
                attachments_found += outcome.attachments_found;
                attachments_saved += outcome.attachments_saved;
            }
            Err(e) => {
                failed += 1;
                error!(ordinal, error = %e, "Failed to convert message");
            }
        }
        if let Some(cb) = progress {
            cb(ordinal, total);
        }
        true
    })?;

    let summary = RunSummary {
        input: opts.input.clone(),
        archive_size: parser.file_size(),
        total: ordinal,
        succeeded,
        failed,
        attachments_found,
        attachments_saved,
        elapsed: start.elapsed(),
        output_dir: opts.output_dir.clone(),
        attachments_dir: opts
            .extract_attachments
            .then(|| opts.attachments_dir.clone()),
        log_path: opts.output_dir.join(LOG_FILE_NAME),
    };

    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        elapsed_secs = summary.elapsed.as_secs_f64(),
        "Conversion complete"
    );
    if opts.extract_attachments {
        info!(
            saved = summary.attachments_saved,
            found = summary.attachments_found,
            "Attachment extraction complete"
        );
    }

    Ok(summary)
}

/// The full per-message pipeline. Any error here fails only this message.
fn process_message(raw: &[u8], ordinal: u64, opts: &ConvertOptions) -> Result<MessageOutcome> {
    let headers = RawHeaders::parse(raw);
    let fields = MessageFields {
        subject: headers.decoded_or("subject", "No Subject"),
        from: headers.decoded_or("from", "Unknown"),
        to: headers.decoded_or("to", "Unknown"),
        date: headers
            .get("date")
            .unwrap_or("Unknown Date")
            .to_string(),
    };

    let output_path = opts
        .output_dir
        .join(format!("{ordinal:04}_{}.pdf", sanitize_subject(&fields.subject)));

    let content = strip_separator_line(raw);
    if content.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ConvertError::Mime("message is empty".to_string()));
    }
    let msg = MessageParser::default()
        .parse(content)
        .ok_or_else(|| ConvertError::Mime("message could not be parsed".to_string()))?;

    let (records, found) = if opts.extract_attachments {
        let extracted = extract_attachments(&msg, ordinal, &opts.attachments_dir);
        let found = extracted.found;
        (extracted.records, found)
    } else {
        (Vec::new(), 0)
    };

    let body = extract_body(&msg);
    render_document(&fields, &records, &body, &output_path)?;
    debug!(ordinal, path = %output_path.display(), "Wrote document");

    Ok(MessageOutcome {
        attachments_found: found,
        attachments_saved: records.len() as u64,
    })
}

/// Sanitize a subject for use in an output filename.
///
/// Keeps alphanumerics, spaces, hyphens and underscores; everything
/// else becomes `_`. Truncated to 50 characters.
fn sanitize_subject(subject: &str) -> String {
    subject
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .take(50)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_subject() {
        assert_eq!(sanitize_subject("Hello World"), "Hello World");
        assert_eq!(sanitize_subject("Re: [list] fix/break?"), "Re_ _list_ fix_break_");
        assert_eq!(sanitize_subject(&"x".repeat(80)).chars().count(), 50);
        assert_eq!(sanitize_subject(""), "");
    }
}
