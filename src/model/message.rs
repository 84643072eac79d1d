//! Decoded header fields of a single message.

/// The header fields shown at the top of a rendered document.
///
/// All values are fully decoded display strings; missing headers carry
/// their fixed defaults ("No Subject", "Unknown", "Unknown Date").
#[derive(Debug, Clone)]
pub struct MessageFields {
    /// Decoded subject line (RFC 2047 encoded-words resolved).
    pub subject: String,

    /// Decoded `From:` header value.
    pub from: String,

    /// Decoded `To:` header value.
    pub to: String,

    /// Raw `Date:` header value (dates are displayed as sent).
    pub date: String,
}
