//! Streaming MBOX splitter.
//!
//! Reads the archive line-by-line with a large buffer and hands each
//! message's raw bytes to a callback. Never loads the entire file into
//! memory. Tolerant of malformed input.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{ConvertError, Result};

/// Size of the internal read buffer (1 MB for fast sequential reads on modern SSDs).
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Default maximum message size in bytes (256 MB).
const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

/// Streaming MBOX splitter.
///
/// Scans the file sequentially, invoking a caller-supplied callback for
/// every message boundary it finds. The splitter is tolerant of:
///
/// - Mixed `\n` and `\r\n` line endings
/// - `From ` lines not preceded by a blank line (logs a warning)
/// - Truncated messages at EOF
/// - NUL bytes and other binary content in the body
/// - UTF-8 BOM at the start of the file
#[derive(Debug)]
pub struct MboxParser {
    path: PathBuf,
    file_size: u64,
    max_message_size: usize,
}

impl MboxParser {
    /// Create a splitter for the given MBOX file.
    ///
    /// Verifies that the file exists and is readable, but does NOT validate
    /// that it is actually an MBOX.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConvertError::FileNotFound(path.clone())
            } else {
                ConvertError::io(&path, e)
            }
        })?;
        Ok(Self {
            path,
            file_size: metadata.len(),
            max_message_size: MAX_MESSAGE_SIZE,
        })
    }

    /// Total size of the underlying file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Path to the MBOX file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Count the messages in the archive without buffering their bodies.
    ///
    /// Uses the same boundary rules as [`parse`](Self::parse), so both
    /// passes always agree on the message count.
    pub fn count_messages(&self) -> Result<u64> {
        if self.file_size == 0 {
            return Ok(0);
        }

        let file = File::open(&self.path).map_err(|e| ConvertError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut count: u64 = 0;
        let mut has_content = false;
        let mut line_buf: Vec<u8> = Vec::with_capacity(4096);

        loop {
            line_buf.clear();
            if self.read_line(&mut reader, &mut line_buf)? == 0 {
                break; // EOF
            }

            if is_mbox_separator(&line_buf) {
                if has_content {
                    count += 1;
                }
                has_content = true;
            } else {
                has_content = true;
            }
        }

        if has_content {
            count += 1;
        }
        Ok(count)
    }

    /// Split the full MBOX, calling `message_callback` for each message found.
    ///
    /// The callback receives `(offset, raw_bytes)` and returns `true` to
    /// continue or `false` to abort early.
    ///
    /// Returns the number of messages handed to the callback.
    pub fn parse(&self, message_callback: &mut dyn FnMut(u64, &[u8]) -> bool) -> Result<u64> {
        if self.file_size == 0 {
            return Ok(0);
        }

        let file = File::open(&self.path).map_err(|e| ConvertError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut count: u64 = 0;
        let mut current_offset: u64 = 0;
        let mut message_buf: Vec<u8> = Vec::with_capacity(64 * 1024);
        let mut message_start: u64 = 0;
        let mut prev_line_was_empty = true;
        let mut first_line = true;

        // Reusable line buffer
        let mut line_buf: Vec<u8> = Vec::with_capacity(4096);

        loop {
            line_buf.clear();
            let line_len = self.read_line(&mut reader, &mut line_buf)?;
            if line_len == 0 {
                break; // EOF
            }

            if is_mbox_separator(&line_buf) {
                if !first_line && !prev_line_was_empty {
                    warn!(
                        offset = current_offset,
                        "Found 'From ' separator without preceding blank line"
                    );
                }
                if !message_buf.is_empty() {
                    if !message_callback(message_start, &message_buf) {
                        return Ok(count);
                    }
                    count += 1;
                }
                message_start = current_offset;
                message_buf.clear();
                message_buf.extend_from_slice(&line_buf);
            } else if message_buf.len() + line_buf.len() <= self.max_message_size {
                message_buf.extend_from_slice(&line_buf);
            } else if message_buf.len() <= self.max_message_size {
                // First time exceeding the limit — log a warning once per message
                warn!(
                    offset = message_start,
                    max_size = self.max_message_size,
                    "Message exceeds maximum size, truncating body"
                );
            }

            prev_line_was_empty = is_blank_line(&line_buf);
            first_line = false;
            current_offset += line_len;
        }

        // Flush last message
        if !message_buf.is_empty() && message_callback(message_start, &message_buf) {
            count += 1;
        }

        Ok(count)
    }

    /// Read one line (through its `\n`) into `line_buf`; returns the byte count.
    fn read_line(&self, reader: &mut BufReader<File>, line_buf: &mut Vec<u8>) -> Result<u64> {
        loop {
            let (consume_len, done) = {
                let buf = reader
                    .fill_buf()
                    .map_err(|e| ConvertError::io(&self.path, e))?;
                if buf.is_empty() {
                    return Ok(line_buf.len() as u64); // EOF
                }
                match buf.iter().position(|&b| b == b'\n') {
                    Some(pos) => {
                        line_buf.extend_from_slice(&buf[..=pos]);
                        (pos + 1, true)
                    }
                    None => {
                        line_buf.extend_from_slice(buf);
                        (buf.len(), false)
                    }
                }
            };
            reader.consume(consume_len);
            if done {
                return Ok(line_buf.len() as u64);
            }
        }
    }
}

/// Check whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    // Skip BOM if present at very start
    let line = if line.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &line[3..]
    } else {
        line
    };
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}

/// Strip the leading `From ` separator line from raw MBOX message bytes.
pub fn strip_separator_line(raw: &[u8]) -> &[u8] {
    // Handle BOM
    let raw = if raw.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &raw[3..]
    } else {
        raw
    };

    if raw.starts_with(b"From ") {
        if let Some(pos) = raw.iter().position(|&b| b == b'\n') {
            return &raw[pos + 1..];
        }
    }
    raw
}
