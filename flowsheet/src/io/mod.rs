//! I/O helpers for options and documents.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

pub mod config;
pub mod document_store;

/// Write `contents` to `path` via a sibling temp file and rename.
fn write_atomic(path: &Path, tmp_extension: &str, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| Error::io("create directory", parent, err))?;
    }
    let tmp_path = path.with_extension(tmp_extension);
    fs::write(&tmp_path, contents).map_err(|err| Error::io("write temp file", &tmp_path, err))?;
    fs::rename(&tmp_path, path).map_err(|err| Error::io("replace", path, err))?;
    Ok(())
}
