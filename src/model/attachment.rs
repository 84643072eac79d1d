//! Attachment records.
//!
//! A record describes one attachment that was written to disk while
//! processing a message. It lives only as long as that message's
//! conversion — the renderer consumes it for the attachment table.

use std::path::PathBuf;

/// One attachment saved from a message.
#[derive(Debug, Clone)]
pub struct AttachmentRecord {
    /// Filename as declared in the message (decoded), or a synthesized name.
    pub filename: String,

    /// Sanitized, collision-free filename it was saved under.
    pub saved_as: String,

    /// Absolute path of the written file.
    pub path: PathBuf,

    /// Exact number of bytes written.
    pub size: u64,

    /// MIME content type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub content_type: String,
}
