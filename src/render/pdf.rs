//! PDF document assembly.
//!
//! Lays out header fields, an attachment table and body paragraphs onto
//! US-letter pages and writes them with `lopdf`. The template is fixed:
//! Helvetica base fonts with WinAnsi encoding, one-inch margins.
//!
//! A paragraph whose text cannot be encoded for the page fonts is
//! retried with non-ASCII characters folded to `_`, then replaced by a
//! placeholder — a single bad paragraph never sinks the document.

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use tracing::warn;

use crate::error::{ConvertError, Result};
use crate::model::attachment::AttachmentRecord;
use crate::model::message::MessageFields;

/// Rendered when the body text is empty.
pub const NO_BODY_PLACEHOLDER: &str = "[No message body]";

/// Substituted for a paragraph that failed both render attempts.
const PARAGRAPH_FALLBACK: &str = "[Formatting error with this paragraph]";

// US-letter geometry, in points
const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 72;

const HEADING_SIZE: i64 = 13;
const HEADER_SIZE: i64 = 10;
const BODY_SIZE: i64 = 10;
const TABLE_SIZE: i64 = 9;
const PARAGRAPH_GAP: i64 = 6;

// Attachment table column origins
const COL_ORDINAL: i64 = MARGIN;
const COL_NAME: i64 = MARGIN + 24;
const COL_SIZE: i64 = MARGIN + 238;
const COL_SAVED: i64 = MARGIN + 298;

/// Render one message as a PDF at `output`.
///
/// Layout order: subject heading, From/To/Date lines, the attachment
/// table (only when records exist), a horizontal rule, then the body
/// split into paragraphs on blank lines. Errors are returned to the
/// caller, which treats them as a per-message failure.
pub fn render_document(
    fields: &MessageFields,
    attachments: &[AttachmentRecord],
    body: &str,
    output: &Path,
) -> Result<()> {
    let mut page = PageComposer::new();

    let subject = format!("Subject: {}", fields.subject);
    for line in wrap_text(&subject, max_chars(HEADING_SIZE)) {
        page.emit_line(Font::Bold, HEADING_SIZE, MARGIN, encode_lossy(&line));
    }
    page.gap(4);

    for (label, value) in [
        ("From", &fields.from),
        ("To", &fields.to),
        ("Date", &fields.date),
    ] {
        for line in wrap_text(&format!("{label}: {value}"), max_chars(HEADER_SIZE)) {
            page.emit_line(Font::Regular, HEADER_SIZE, MARGIN, encode_lossy(&line));
        }
    }

    if !attachments.is_empty() {
        page.gap(8);
        page.emit_line(Font::Bold, HEADER_SIZE, MARGIN, encode_lossy("Attachments:"));
        page.gap(2);
        for (i, att) in attachments.iter().enumerate() {
            let cells = [
                (COL_ORDINAL, format!("{}.", i + 1)),
                (COL_NAME, truncate_chars(&att.filename, 42)),
                (COL_SIZE, format_size(att.size)),
                (COL_SAVED, truncate_chars(&att.saved_as, 33)),
            ];
            page.emit_row(Font::Regular, TABLE_SIZE, &cells);
        }
    }

    page.gap(10);
    page.rule();
    page.gap(10);

    render_body(&mut page, body);

    let doc = build_document(page.finish())?;
    write_document(doc, output)
}

/// Human-readable size: integer bytes below 1 KB, then one-decimal KB/MB.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

// ── Body layout ─────────────────────────────────────────────────

fn render_body(page: &mut PageComposer, body: &str) {
    let body = body.replace("\r\n", "\n");
    let paragraphs: Vec<&str> = body
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .collect();

    if paragraphs.is_empty() {
        render_paragraph(page, NO_BODY_PLACEHOLDER);
        return;
    }
    for paragraph in paragraphs {
        render_paragraph(page, paragraph);
    }
}

/// Render one paragraph with the two-step fallback chain.
fn render_paragraph(page: &mut PageComposer, text: &str) {
    if page.paragraph(text).is_ok() {
        return;
    }
    warn!("Paragraph not representable in page encoding, retrying as ASCII");
    let folded = fold_non_ascii(text);
    if page.paragraph(&folded).is_ok() {
        return;
    }
    warn!("ASCII fallback failed, substituting placeholder paragraph");
    let _ = page.paragraph(PARAGRAPH_FALLBACK);
}

/// Replace every non-ASCII character with `_`.
fn fold_non_ascii(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect()
}

// ── Page composition ────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn name(self) -> &'static [u8] {
        match self {
            Font::Regular => b"F1",
            Font::Bold => b"F2",
        }
    }
}

fn line_height(size: i64) -> i64 {
    size * 6 / 5
}

/// Accumulates content-stream operations, breaking to a new page
/// whenever the cursor would cross the bottom margin.
struct PageComposer {
    pages: Vec<Vec<Operation>>,
    ops: Vec<Operation>,
    y: i64,
}

impl PageComposer {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            ops: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn new_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.ops));
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn advance(&mut self, height: i64) {
        if self.y - height < MARGIN {
            self.new_page();
        }
        self.y -= height;
    }

    /// One line of text at a fixed x position.
    fn emit_line(&mut self, font: Font, size: i64, x: i64, bytes: Vec<u8>) {
        self.advance(line_height(size));
        self.text_ops(font, size, x, bytes);
    }

    /// One table row: several cells sharing a baseline.
    fn emit_row(&mut self, font: Font, size: i64, cells: &[(i64, String)]) {
        self.advance(line_height(size));
        for (x, text) in cells {
            self.text_ops(font, size, *x, encode_lossy(text));
        }
    }

    /// A body paragraph: single newlines are line breaks, followed by a gap.
    ///
    /// The whole paragraph is encoded up front so that a failure emits
    /// nothing — the caller retries with a fallback rendition.
    fn paragraph(&mut self, text: &str) -> Result<()> {
        let mut encoded: Vec<Vec<u8>> = Vec::new();
        for line in text.split('\n') {
            for wrapped in wrap_text(line, max_chars(BODY_SIZE)) {
                encoded.push(encode_strict(&wrapped)?);
            }
        }
        for bytes in encoded {
            self.emit_line(Font::Regular, BODY_SIZE, MARGIN, bytes);
        }
        self.gap(PARAGRAPH_GAP);
        Ok(())
    }

    fn gap(&mut self, points: i64) {
        self.y -= points;
    }

    fn rule(&mut self) {
        self.advance(8);
        let y = self.y + 4;
        self.ops.push(Operation::new("q", vec![]));
        self.ops.push(Operation::new("w", vec![1.into()]));
        self.ops
            .push(Operation::new("m", vec![MARGIN.into(), y.into()]));
        self.ops.push(Operation::new(
            "l",
            vec![(PAGE_WIDTH - MARGIN).into(), y.into()],
        ));
        self.ops.push(Operation::new("S", vec![]));
        self.ops.push(Operation::new("Q", vec![]));
    }

    fn text_ops(&mut self, font: Font, size: i64, x: i64, bytes: Vec<u8>) {
        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new(
            "Tf",
            vec![Object::Name(font.name().to_vec()), size.into()],
        ));
        self.ops
            .push(Operation::new("Td", vec![x.into(), self.y.into()]));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(bytes, StringFormat::Literal)],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        self.pages.push(self.ops);
        self.pages
    }
}

// ── Text encoding ───────────────────────────────────────────────

/// Encode text for the page fonts; fails on unmappable characters.
fn encode_strict(text: &str) -> Result<Vec<u8>> {
    let (bytes, _, had_errors) = encoding_rs::WINDOWS_1252.encode(text);
    if had_errors {
        return Err(ConvertError::Render(
            "text contains characters outside the page encoding".to_string(),
        ));
    }
    Ok(bytes.into_owned())
}

/// Encode text for the page fonts, folding unmappable characters to `_`.
///
/// Used for header lines and table cells, which must always render.
fn encode_lossy(text: &str) -> Vec<u8> {
    let folded: String = text
        .chars()
        .map(|c| {
            let mut buf = [0u8; 4];
            let s = c.encode_utf8(&mut buf);
            let (_, _, had_errors) = encoding_rs::WINDOWS_1252.encode(s);
            if had_errors {
                '_'
            } else {
                c
            }
        })
        .collect();
    let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(&folded);
    bytes.into_owned()
}

/// Rough character budget for a line: Helvetica averages a bit over
/// half the font size per glyph.
fn max_chars(size: i64) -> usize {
    ((PAGE_WIDTH - 2 * MARGIN) as f64 / (size as f64 * 0.55)) as usize
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Word-wrap a single line to `max_chars`, hard-splitting words that
/// do not fit on a line of their own. A blank line stays a blank line.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return vec![String::new()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len > max_chars {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if word_len > max_chars {
            for ch in word.chars() {
                if current_len == max_chars {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                current.push(ch);
                current_len += 1;
            }
        } else {
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(word);
            current_len += word_len;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        vec![String::new()]
    } else {
        lines
    }
}

// ── Document assembly ───────────────────────────────────────────

fn build_document(pages: Vec<Vec<Operation>>) -> Result<Document> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let data = content
            .encode()
            .map_err(|e| ConvertError::Render(format!("content stream: {e}")))?;
        let content_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, data)));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    Ok(doc)
}

fn write_document(mut doc: Document, output: &Path) -> Result<()> {
    doc.save(output).map_err(|e| {
        ConvertError::Render(format!("failed to write '{}': {e}", output.display()))
    })?;
    Ok(())
}
