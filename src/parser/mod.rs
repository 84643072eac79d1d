//! Email parsing: MBOX streaming splitter, header decoding, and HTML reduction.

pub mod header;
pub mod html;
pub mod mbox;
