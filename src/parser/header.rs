//! RFC 5322 header handling: folding and RFC 2047 encoded-words.
//!
//! Decoding never fails: unknown charsets and broken encodings fall back
//! to UTF-8 with replacement characters, and undecodable encoded-word
//! tokens are passed through as-is.

use tracing::warn;

/// The unfolded headers of one message, as `(lowercase_name, raw_value)` pairs.
///
/// Built from the raw bytes of a message; scanning stops at the first
/// blank line, so the body is never touched.
#[derive(Debug)]
pub struct RawHeaders(Vec<(String, String)>);

impl RawHeaders {
    /// Parse the header block out of raw message bytes.
    ///
    /// Tolerates a leading MBOX `From ` separator line, mixed line
    /// endings, and continuation lines (space/tab indent).
    pub fn parse(raw: &[u8]) -> Self {
        let raw = crate::parser::mbox::strip_separator_line(raw);
        let header_bytes = match find_blank_line(raw) {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let text = decode_header_bytes(header_bytes);

        let mut headers: Vec<(String, String)> = Vec::new();
        for line in text.lines() {
            if line.starts_with(' ') || line.starts_with('\t') {
                // Continuation line
                if let Some(last) = headers.last_mut() {
                    last.1.push(' ');
                    last.1.push_str(line.trim());
                }
            } else if let Some(colon_pos) = line.find(':') {
                let name = line[..colon_pos].trim().to_lowercase();
                let value = line[colon_pos + 1..].trim().to_string();
                headers.push((name, value));
            }
            // Lines without a colon and not a continuation are silently skipped
        }
        Self(headers)
    }

    /// Raw value of the first header with this name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Decoded value of a header, or `default` when the header is missing.
    pub fn decoded_or(&self, name: &str, default: &str) -> String {
        match self.get(name) {
            Some(value) => decode_encoded_words(value),
            None => default.to_string(),
        }
    }
}

/// Byte offset of the body separator (first blank line), if any.
fn find_blank_line(raw: &[u8]) -> Option<usize> {
    let lf = raw.windows(2).position(|w| w == b"\n\n");
    let crlf = raw.windows(4).position(|w| w == b"\r\n\r\n");
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to WINDOWS-1252 (which accepts every byte).
pub fn decode_header_bytes(bytes: &[u8]) -> String {
    // Strip BOM if present
    let bytes = if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &bytes[3..]
    } else {
        bytes
    };

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// If decoding fails for any token, the original text is preserved.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // If the gap between two encoded words is only whitespace, skip it (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];

        if let Some(decoded) = try_decode_one_word(after_start) {
            result.push_str(&decoded.text);
            remaining = &remaining[start + 2 + decoded.consumed..];
            last_was_encoded = true;
        } else {
            result.push_str("=?");
            remaining = after_start;
            last_was_encoded = false;
        }
    }

    result.push_str(remaining);
    result
}

struct DecodedWord {
    text: String,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

fn try_decode_one_word(s: &str) -> Option<DecodedWord> {
    // Format: charset?encoding?encoded_text?=
    let first_q = s.find('?')?;
    let charset = &s[..first_q];

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];

    let total_consumed = first_q + 1 + second_q + 1 + end + 2;

    let bytes = match encoding.to_uppercase().as_str() {
        "B" => decode_base64(encoded_text)?,
        "Q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    let text = decode_charset(charset, &bytes);

    Some(DecodedWord {
        text,
        consumed: total_consumed,
    })
}

/// Minimal base64 decoder. Ignores embedded whitespace; returns `None`
/// on invalid characters or a truncated final group.
fn decode_base64(input: &str) -> Option<Vec<u8>> {
    fn val(c: u8) -> Option<u8> {
        match c {
            b'A'..=b'Z' => Some(c - b'A'),
            b'a'..=b'z' => Some(c - b'a' + 26),
            b'0'..=b'9' => Some(c - b'0' + 52),
            b'+' => Some(62),
            b'/' => Some(63),
            _ => None,
        }
    }

    let mut out = Vec::with_capacity(input.len() / 4 * 3);
    let mut quad = [0u8; 4];
    let mut qi = 0;
    let mut pad = 0usize;

    for &b in input.as_bytes() {
        if b.is_ascii_whitespace() {
            continue;
        }
        if b == b'=' {
            quad[qi] = 0;
            pad += 1;
        } else {
            quad[qi] = val(b)?;
        }
        qi += 1;
        if qi == 4 {
            out.push((quad[0] << 2) | (quad[1] >> 4));
            if pad < 2 {
                out.push((quad[1] << 4) | (quad[2] >> 2));
            }
            if pad < 1 {
                out.push((quad[2] << 6) | quad[3]);
            }
            qi = 0;
        }
    }

    if qi != 0 {
        return None; // truncated group
    }
    Some(out)
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                if let Ok(byte) = u8::from_str_radix(
                    std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("00"),
                    16,
                ) {
                    result.push(byte);
                    i += 3;
                } else {
                    result.push(b'=');
                    i += 1;
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode bytes using a named charset.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    let charset_lower = charset.to_lowercase();
    match charset_lower.as_str() {
        "utf-8" | "utf8" => String::from_utf8_lossy(bytes).into_owned(),
        _ => {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(bytes);
                decoded.into_owned()
            } else {
                warn!(
                    charset = charset,
                    "Unknown charset, falling back to UTF-8 lossy"
                );
                String::from_utf8_lossy(bytes).into_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_encoded_word() {
        let input = "=?UTF-8?B?SG9sYSBtdW5kbw==?=";
        assert_eq!(decode_encoded_words(input), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        let input = "=?ISO-8859-1?Q?caf=E9?=";
        assert_eq!(decode_encoded_words(input), "café");
    }

    #[test]
    fn test_decode_multiple_encoded_words() {
        let input = "=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?=";
        assert_eq!(decode_encoded_words(input), "Hola mundo");
    }

    #[test]
    fn test_decode_mixed_plain_and_encoded() {
        let input = "Re: =?UTF-8?B?SG9sYQ==?= there";
        assert_eq!(decode_encoded_words(input), "Re: Hola there");
    }

    #[test]
    fn test_decode_mixed_charsets_in_one_value() {
        let input = "=?ISO-8859-1?Q?caf=E9?= =?UTF-8?B?IOWxseeUsA==?=";
        assert_eq!(decode_encoded_words(input), "café 山田");
    }

    #[test]
    fn test_decode_unknown_charset_never_fails() {
        let input = "=?X-NO-SUCH-CHARSET?Q?caf=E9?=";
        let decoded = decode_encoded_words(input);
        // Falls back to UTF-8 lossy: 0xE9 alone is invalid UTF-8
        assert!(decoded.starts_with("caf"));
        assert!(decoded.contains('\u{FFFD}'));
    }

    #[test]
    fn test_decode_malformed_token_passthrough() {
        let input = "=?UTF-8?B?not-base64!?=";
        // Invalid base64 leaves the token untouched
        assert_eq!(decode_encoded_words(input), input);
    }

    #[test]
    fn test_decode_windows1252_encoded_word() {
        // Müller
        let input = "=?Windows-1252?Q?M=FCller?=";
        assert_eq!(decode_encoded_words(input), "Müller");
    }

    #[test]
    fn test_decode_utf8_base64_japanese() {
        // 山田太郎
        let input = "=?UTF-8?B?5bGx55Sw5aSq6YOO?=";
        assert_eq!(decode_encoded_words(input), "山田太郎");
    }

    #[test]
    fn test_raw_headers_unfold() {
        let raw = b"Subject: This is a long\n\tsubject line\nFrom: user@example.com\n\nBody\n";
        let headers = RawHeaders::parse(raw);
        assert_eq!(headers.get("subject"), Some("This is a long subject line"));
        assert_eq!(headers.get("from"), Some("user@example.com"));
        // Body is not scanned for headers
        assert_eq!(headers.get("body"), None);
    }

    #[test]
    fn test_raw_headers_skip_separator_line() {
        let raw = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Hi\n\nBody\n";
        let headers = RawHeaders::parse(raw);
        assert_eq!(headers.get("subject"), Some("Hi"));
        // The separator's "00:00:00" must not be mistaken for a header
        assert!(headers.get("from user@example.com thu jan 01 00").is_none());
    }

    #[test]
    fn test_decoded_or_default_for_missing() {
        let headers = RawHeaders::parse(b"From: a@b.com\n\n");
        assert_eq!(headers.decoded_or("subject", "No Subject"), "No Subject");
        assert_eq!(headers.decoded_or("from", "Unknown"), "a@b.com");
    }

    #[test]
    fn test_decoded_or_decodes_value() {
        let headers = RawHeaders::parse(b"Subject: =?UTF-8?B?SG9sYQ==?=\n\n");
        assert_eq!(headers.decoded_or("subject", "No Subject"), "Hola");
    }

    #[test]
    fn test_decode_header_bytes_latin1_fallback() {
        // 0xE9 is 'é' in WINDOWS-1252 but invalid UTF-8
        let decoded = decode_header_bytes(b"caf\xE9");
        assert_eq!(decoded, "café");
    }
}
