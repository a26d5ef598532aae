//! Document read/write helpers for paths and caller-owned streams.
//!
//! Path targets are opened and closed inside each call. Streams passed in by
//! the caller are only read from or written to, never closed.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::core::document::Document;
use crate::error::{Error, Result};

/// Read a document file into an untyped JSON value (not yet validated).
pub fn read_document(path: &Path) -> Result<Value> {
    debug!(path = %path.display(), "reading document");
    let contents =
        fs::read_to_string(path).map_err(|err| Error::io("read document", path, err))?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn read_document_from<R: Read>(reader: R) -> Result<Value> {
    Ok(serde_json::from_reader(reader)?)
}

/// Write a document to `path`, creating or replacing the file atomically.
pub fn write_document(path: &Path, document: &Document, pretty: bool) -> Result<()> {
    debug!(path = %path.display(), name = %document.name, "writing document");
    let buf = encode(document, pretty)?;
    super::write_atomic(path, "json.tmp", &buf)
}

/// Write a document to an open stream. The stream is flushed, not closed.
pub fn write_document_to<W: Write>(writer: &mut W, document: &Document, pretty: bool) -> Result<()> {
    let buf = encode(document, pretty)?;
    writer.write_all(buf.as_bytes())?;
    writer.flush()?;
    Ok(())
}

fn encode(document: &Document, pretty: bool) -> Result<String> {
    let mut buf = if pretty {
        serde_json::to_string_pretty(document)?
    } else {
        serde_json::to_string(document)?
    };
    buf.push('\n');
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("doc.json");
        let document = Document::new("fs");

        write_document(&path, &document, true).expect("write");
        let value = read_document(&path).expect("read");
        assert_eq!(value["name"], "fs");
        assert!(!temp.path().join("nested").join("doc.json.tmp").exists());
    }

    #[test]
    fn stream_is_left_usable() {
        let mut buf: Vec<u8> = Vec::new();
        write_document_to(&mut buf, &Document::new("fs"), false).expect("write");
        buf.extend_from_slice(b"trailer");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.starts_with("{\"name\":\"fs\""));
        assert!(text.ends_with("\ntrailer"));
    }

    #[test]
    fn read_missing_file_is_io_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = read_document(&temp.path().join("absent.json")).expect_err("missing");
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = read_document_from("{not json".as_bytes()).expect_err("malformed");
        assert!(matches!(err, Error::Parse(_)));
    }
}
