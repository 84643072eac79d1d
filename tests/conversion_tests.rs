//! End-to-end conversion tests: archive in, PDFs and attachments out.

use assert_fs::prelude::*;
use predicates::prelude::*;

use mbox2pdf::convert::{convert_mbox, ConvertOptions};

/// Assemble an mbox archive from full message texts.
fn mbox_archive(messages: &[&str]) -> String {
    let mut out = String::new();
    for msg in messages {
        out.push_str("From sender@example.com Thu Jan  4 10:00:00 2024\n");
        out.push_str(msg);
        if !msg.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

fn write_archive(dir: &assert_fs::TempDir, content: &str) -> std::path::PathBuf {
    let file = dir.child("archive.mbox");
    file.write_str(content).expect("write archive");
    file.path().to_path_buf()
}

fn options(input: std::path::PathBuf, dir: &assert_fs::TempDir) -> ConvertOptions {
    let output_dir = dir.path().join("out");
    ConvertOptions {
        input,
        attachments_dir: output_dir.join("attachments"),
        output_dir,
        extract_attachments: true,
    }
}

fn pdf_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .expect("read output dir")
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|e| e == "pdf"))
        .collect();
    files.sort();
    files
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

const PLAIN: &str = "\
From: Alice <alice@example.com>\n\
To: bob@example.com\n\
Subject: Plain hello\n\
Date: Thu, 04 Jan 2024 10:00:00 +0000\n\
\n\
Just a plain text body.\n";

const HTML_ONLY: &str = "\
From: Carol <carol@example.com>\n\
To: bob@example.com\n\
Subject: Html only\n\
Content-Type: text/html; charset=utf-8\n\
\n\
<p>Hello <b>world</b></p>\n";

const ALTERNATIVE: &str = "\
From: Dave <dave@example.com>\n\
To: bob@example.com\n\
Subject: Alternative parts\n\
MIME-Version: 1.0\n\
Content-Type: multipart/alternative; boundary=\"ALT\"\n\
\n\
--ALT\n\
Content-Type: text/plain; charset=utf-8\n\
\n\
Plain body wins.\n\
--ALT\n\
Content-Type: text/html; charset=utf-8\n\
\n\
<p>HTML should be ignored</p>\n\
--ALT--\n";

const WITH_ATTACHMENT: &str = "\
From: Erin <erin@example.com>\n\
To: bob@example.com\n\
Subject: Quarterly report\n\
MIME-Version: 1.0\n\
Content-Type: multipart/mixed; boundary=\"MIX\"\n\
\n\
--MIX\n\
Content-Type: text/plain; charset=utf-8\n\
\n\
Report attached.\n\
--MIX\n\
Content-Type: application/octet-stream\n\
Content-Disposition: attachment; filename=\"report.txt\"\n\
Content-Transfer-Encoding: base64\n\
\n\
SGVsbG8gYXR0YWNobWVudCE=\n\
--MIX--\n";

// ─── Full archive conversion ────────────────────────────────────

#[test]
fn test_converts_every_message() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let input = write_archive(&tmp, &mbox_archive(&[PLAIN, HTML_ONLY, ALTERNATIVE]));
    let opts = options(input, &tmp);

    let summary = convert_mbox(&opts, None).unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.succeeded + summary.failed, summary.total);

    let pdfs = pdf_files(&opts.output_dir);
    assert_eq!(pdfs.len(), 3);

    // Filenames: zero-padded ordinal + sanitized subject
    tmp.child("out/0001_Plain hello.pdf")
        .assert(predicate::path::exists());
    tmp.child("out/0002_Html only.pdf")
        .assert(predicate::path::exists());
    tmp.child("out/0003_Alternative parts.pdf")
        .assert(predicate::path::exists());

    for pdf in &pdfs {
        let bytes = std::fs::read(pdf).unwrap();
        assert!(bytes.starts_with(b"%PDF"), "not a PDF: {}", pdf.display());
    }
}

#[test]
fn test_html_body_is_reduced_to_text() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let input = write_archive(&tmp, &mbox_archive(&[HTML_ONLY]));
    let opts = options(input, &tmp);

    convert_mbox(&opts, None).unwrap();

    let bytes = std::fs::read(tmp.child("out/0001_Html only.pdf").path()).unwrap();
    assert!(contains(&bytes, b"Hello world"));
    assert!(!contains(&bytes, b"<b>"));
}

#[test]
fn test_plain_text_preferred_over_html() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let input = write_archive(&tmp, &mbox_archive(&[ALTERNATIVE]));
    let opts = options(input, &tmp);

    convert_mbox(&opts, None).unwrap();

    let bytes = std::fs::read(tmp.child("out/0001_Alternative parts.pdf").path()).unwrap();
    assert!(contains(&bytes, b"Plain body wins."));
    assert!(!contains(&bytes, b"HTML should be ignored"));
}

#[test]
fn test_encoded_subject_decoded_in_filename_and_document() {
    let msg = "\
From: =?ISO-8859-1?Q?Fran=E7ois?= <f@example.com>\n\
Subject: =?UTF-8?B?SG9sYQ==?= mundo\n\
\n\
Body.\n";
    let tmp = assert_fs::TempDir::new().unwrap();
    let input = write_archive(&tmp, &mbox_archive(&[msg]));
    let opts = options(input, &tmp);

    convert_mbox(&opts, None).unwrap();

    let pdf = tmp.child("out/0001_Hola mundo.pdf");
    pdf.assert(predicate::path::exists());
    let bytes = std::fs::read(pdf.path()).unwrap();
    assert!(contains(&bytes, b"Subject: Hola mundo"));
    // "François" decodes from ISO-8859-1 and renders in WinAnsi
    assert!(contains(&bytes, b"Fran\xE7ois"));
}

// ─── Attachments ────────────────────────────────────────────────

#[test]
fn test_attachment_extracted_with_exact_content() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let input = write_archive(&tmp, &mbox_archive(&[WITH_ATTACHMENT]));
    let opts = options(input, &tmp);

    let summary = convert_mbox(&opts, None).unwrap();

    assert_eq!(summary.attachments_found, 1);
    assert_eq!(summary.attachments_saved, 1);
    assert_eq!(summary.attachments_dir.as_deref(), Some(opts.attachments_dir.as_path()));

    let saved = tmp.child("out/attachments/0001_report.txt");
    saved.assert(predicate::path::exists());
    assert_eq!(std::fs::read(saved.path()).unwrap(), b"Hello attachment!");

    // The document lists the attachment
    let bytes = std::fs::read(tmp.child("out/0001_Quarterly report.pdf").path()).unwrap();
    assert!(contains(&bytes, b"Attachments:"));
    assert!(contains(&bytes, b"report.txt"));
    assert!(contains(&bytes, b"17 bytes"));
}

#[test]
fn test_rerun_keeps_both_attachment_copies() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let input = write_archive(&tmp, &mbox_archive(&[WITH_ATTACHMENT]));
    let opts = options(input, &tmp);

    convert_mbox(&opts, None).unwrap();
    convert_mbox(&opts, None).unwrap();

    let first = tmp.child("out/attachments/0001_report.txt");
    let second = tmp.child("out/attachments/0001_report_1.txt");
    first.assert(predicate::path::exists());
    second.assert(predicate::path::exists());
    assert_eq!(
        std::fs::read(first.path()).unwrap(),
        std::fs::read(second.path()).unwrap()
    );
}

#[test]
fn test_no_attachments_flag() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let input = write_archive(&tmp, &mbox_archive(&[WITH_ATTACHMENT]));
    let mut opts = options(input, &tmp);
    opts.extract_attachments = false;

    let summary = convert_mbox(&opts, None).unwrap();

    assert_eq!(summary.attachments_found, 0);
    assert_eq!(summary.attachments_saved, 0);
    assert!(summary.attachments_dir.is_none());
    tmp.child("out/attachments")
        .assert(predicate::path::missing());

    let bytes = std::fs::read(tmp.child("out/0001_Quarterly report.pdf").path()).unwrap();
    assert!(!contains(&bytes, b"Attachments:"));
}

// ─── Failure handling ───────────────────────────────────────────

#[test]
fn test_one_bad_message_does_not_abort_the_batch() {
    // Ten messages; the fifth is an empty shell that cannot be parsed.
    let mut messages: Vec<String> = (1..=10)
        .map(|i| {
            format!(
                "From: a@example.com\nSubject: Message {i}\n\nBody {i}.\n"
            )
        })
        .collect();
    messages[4] = String::new();
    let refs: Vec<&str> = messages.iter().map(|s| s.as_str()).collect();

    let tmp = assert_fs::TempDir::new().unwrap();
    let input = write_archive(&tmp, &mbox_archive(&refs));
    let opts = options(input, &tmp);

    let summary = convert_mbox(&opts, None).unwrap();

    assert_eq!(summary.total, 10);
    assert_eq!(summary.succeeded, 9);
    assert_eq!(summary.failed, 1);
    assert_eq!(pdf_files(&opts.output_dir).len(), 9);
    assert!(!summary.meets_threshold()); // 90% exactly is not enough
}

#[test]
fn test_missing_archive_is_fatal() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let opts = options(tmp.path().join("no-such.mbox"), &tmp);
    assert!(convert_mbox(&opts, None).is_err());
}

#[test]
fn test_progress_reaches_total() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let input = write_archive(&tmp, &mbox_archive(&[PLAIN, HTML_ONLY, ALTERNATIVE]));
    let opts = options(input, &tmp);

    let seen = std::cell::RefCell::new(Vec::new());
    convert_mbox(
        &opts,
        Some(&|current, total| {
            seen.borrow_mut().push((current, total));
        }),
    )
    .unwrap();

    let seen = seen.into_inner();
    assert_eq!(seen.len(), 3);
    // Monotonically increasing, ending at the total
    assert_eq!(seen.last(), Some(&(3, 3)));
    assert!(seen.windows(2).all(|w| w[0].0 < w[1].0));
}
