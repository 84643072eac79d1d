//! Best-effort HTML-to-text reduction.
//!
//! Used when a message has no plain-text body. This is not an HTML
//! parser: it strips markup with simple scans and must never panic,
//! whatever malformed input it is given.

/// Convert an HTML body to plain text.
///
/// Steps, in order:
/// 1. Remove the `<head>…</head>` block (styles, scripts, meta).
/// 2. Substitute the common named entities (nbsp, lt, gt, amp, quot).
/// 3. Turn `<br…>`, `</p>` and `</div>` into newlines.
/// 4. Strip every remaining tag, replacing it with a space.
/// 5. Normalize whitespace: runs of spaces/tabs collapse to one space,
///    indentation after a newline is dropped, three or more newlines
///    collapse to exactly two, and the ends are trimmed.
pub fn html_to_text(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let text = remove_block(html, "<head", "</head>");

    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .replace("&quot;", "\"");

    let text = break_tags_to_newlines(&text);
    let text = strip_tags(&text);
    normalize_whitespace(&text)
}

/// Remove everything between `open` and `close` (ASCII case-insensitive),
/// the markers included. An unterminated block is removed to the end.
fn remove_block(text: &str, open: &str, close: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut remaining = text;

    while let Some(start) = find_ci(remaining, open) {
        result.push_str(&remaining[..start]);
        let after = &remaining[start..];
        match find_ci(after, close) {
            Some(end) => remaining = &after[end + close.len()..],
            None => return result, // no closing marker: drop the rest
        }
    }
    result.push_str(remaining);
    result
}

/// Replace `<br…>`, `</p>` and `</div>` with newlines (case-insensitive).
fn break_tags_to_newlines(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut remaining = text;

    loop {
        let br = find_ci(remaining, "<br");
        let p = find_ci(remaining, "</p>");
        let div = find_ci(remaining, "</div>");

        // Nearest of the three candidates
        let next = [br, p, div].into_iter().flatten().min();
        let Some(pos) = next else {
            result.push_str(remaining);
            return result;
        };

        result.push_str(&remaining[..pos]);
        result.push('\n');

        remaining = if Some(pos) == br {
            // Consume through the closing '>' of the <br…> tag
            match remaining[pos..].find('>') {
                Some(gt) => &remaining[pos + gt + 1..],
                None => "", // unterminated tag at end of input
            }
        } else if Some(pos) == p {
            &remaining[pos + "</p>".len()..]
        } else {
            &remaining[pos + "</div>".len()..]
        };
    }
}

/// Drop every remaining `<…>` tag, replacing it with a single space.
/// An unterminated trailing tag is dropped entirely.
fn strip_tags(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' if !in_tag => {
                in_tag = true;
                result.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result
}

/// Collapse horizontal whitespace, strip indentation after newlines,
/// cap newline runs at two, and trim the ends.
fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut pending_spaces = false;
    let mut newline_run = 0u32;

    for ch in text.chars() {
        match ch {
            '\n' => {
                newline_run += 1;
                pending_spaces = false;
                if newline_run <= 2 {
                    result.push('\n');
                }
            }
            c if c.is_whitespace() => {
                // Spaces and tabs directly after a newline are indentation
                if newline_run == 0 {
                    pending_spaces = true;
                }
            }
            c => {
                if pending_spaces && !result.is_empty() {
                    result.push(' ');
                }
                pending_spaces = false;
                newline_run = 0;
                result.push(c);
            }
        }
    }

    result.trim_matches(['\n', ' ']).to_string()
}

/// Byte offset of the first ASCII case-insensitive match of `needle`.
fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    h.windows(n.len()).position(|w| w.eq_ignore_ascii_case(n))
}
