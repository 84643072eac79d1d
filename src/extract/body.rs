//! Message body selection.
//!
//! Walks the MIME part tree collecting plain-text and HTML bodies,
//! preferring plain text. The HTML reducer is only consulted when no
//! usable plain text exists.

use mail_parser::{Message, PartType};

use super::disposition_contains;
use crate::parser::html::html_to_text;

/// Returned when a message carries no text or HTML body at all.
pub const NO_CONTENT_PLACEHOLDER: &str = "[No message content found]";

/// Extract the body of a message as a single display string.
///
/// Multipart messages contribute every non-attachment `text/plain` part
/// (blank-line separated) and every `text/html` part; single-part
/// messages are routed by their declared content type. Non-blank plain
/// text wins verbatim, otherwise HTML is reduced to text, otherwise a
/// fixed placeholder is returned. Never fails: undecodable parts are
/// simply absent (the MIME parser substitutes replacement characters
/// for bad charsets).
pub fn extract_body(msg: &Message<'_>) -> String {
    let mut plain = String::new();
    let mut html = String::new();

    if msg.parts.len() > 1 {
        collect_text_parts(msg, &mut plain, &mut html);
    } else if let Some(part) = msg.parts.first() {
        match &part.body {
            PartType::Text(text) => plain.push_str(text),
            PartType::Html(markup) => html.push_str(markup),
            _ => {}
        }
    }

    if !plain.trim().is_empty() {
        plain
    } else if !html.is_empty() {
        html_to_text(&html)
    } else {
        NO_CONTENT_PLACEHOLDER.to_string()
    }
}

/// Accumulate text parts depth-first, skipping attachments.
fn collect_text_parts(msg: &Message<'_>, plain: &mut String, html: &mut String) {
    for part in &msg.parts {
        if disposition_contains(part, "attachment") {
            continue;
        }
        match &part.body {
            PartType::Text(text) => {
                plain.push_str(text);
                plain.push_str("\n\n");
            }
            PartType::Html(markup) => html.push_str(markup),
            // Attached message/rfc822: descend into its parts
            PartType::Message(nested) => collect_text_parts(nested, plain, html),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mail_parser::MessageParser;

    fn parse(raw: &str) -> Message<'_> {
        MessageParser::default()
            .parse(raw.as_bytes())
            .expect("parse test message")
    }

    #[test]
    fn test_single_part_plain() {
        let msg = parse(
            "From: a@example.com\nSubject: T\nContent-Type: text/plain\n\nJust plain text.\n",
        );
        assert_eq!(extract_body(&msg).trim(), "Just plain text.");
    }

    #[test]
    fn test_html_only_is_reduced() {
        let msg = parse(
            "From: a@example.com\nSubject: T\nContent-Type: text/html\n\n<p>Hello <b>world</b></p>\n",
        );
        assert_eq!(extract_body(&msg), "Hello world");
    }

    #[test]
    fn test_plain_preferred_over_html_alternative() {
        let raw = "\
From: a@example.com\n\
Subject: T\n\
MIME-Version: 1.0\n\
Content-Type: multipart/alternative; boundary=\"SEP\"\n\
\n\
--SEP\n\
Content-Type: text/plain; charset=utf-8\n\
\n\
Plain body wins.\n\
--SEP\n\
Content-Type: text/html; charset=utf-8\n\
\n\
<p>HTML should be ignored</p>\n\
--SEP--\n";
        let msg = parse(raw);
        let body = extract_body(&msg);
        assert!(body.contains("Plain body wins."));
        assert!(!body.contains("HTML should be ignored"));
    }

    #[test]
    fn test_attachment_parts_are_skipped() {
        let raw = "\
From: a@example.com\n\
Subject: T\n\
MIME-Version: 1.0\n\
Content-Type: multipart/mixed; boundary=\"SEP\"\n\
\n\
--SEP\n\
Content-Type: text/plain; charset=utf-8\n\
\n\
See attached.\n\
--SEP\n\
Content-Type: text/plain; charset=utf-8\n\
Content-Disposition: attachment; filename=\"notes.txt\"\n\
\n\
Attachment text must not leak into the body.\n\
--SEP--\n";
        let msg = parse(raw);
        let body = extract_body(&msg);
        assert!(body.contains("See attached."));
        assert!(!body.contains("must not leak"));
    }

    #[test]
    fn test_no_content_placeholder() {
        let raw = "\
From: a@example.com\n\
Subject: T\n\
MIME-Version: 1.0\n\
Content-Type: multipart/mixed; boundary=\"SEP\"\n\
\n\
--SEP\n\
Content-Type: application/octet-stream\n\
Content-Disposition: attachment; filename=\"data.bin\"\n\
Content-Transfer-Encoding: base64\n\
\n\
AAECAw==\n\
--SEP--\n";
        let msg = parse(raw);
        assert_eq!(extract_body(&msg), NO_CONTENT_PLACEHOLDER);
    }

    #[test]
    fn test_multiple_plain_parts_blank_line_separated() {
        let raw = "\
From: a@example.com\n\
Subject: T\n\
MIME-Version: 1.0\n\
Content-Type: multipart/mixed; boundary=\"SEP\"\n\
\n\
--SEP\n\
Content-Type: text/plain\n\
\n\
First part.\n\
--SEP\n\
Content-Type: text/plain\n\
\n\
Second part.\n\
--SEP--\n";
        let msg = parse(raw);
        let body = extract_body(&msg);
        let first = body.find("First part.").expect("first part present");
        let second = body.find("Second part.").expect("second part present");
        assert!(first < second);
        assert!(body[first..second].contains("\n\n"));
    }
}
