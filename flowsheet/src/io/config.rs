//! Flowsheet interface options stored as TOML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_ROOT_NAME: &str = "__root__";

/// Behavior options for [`FlowsheetInterface`](crate::flowsheet::FlowsheetInterface).
///
/// Missing fields default to the values below, so a hand-edited file only
/// needs the keys it changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FlowsheetOptions {
    /// Name of the synthetic top-level document entry.
    pub root_name: String,

    /// Let `set_block` on a bound instance reset it instead of failing.
    pub allow_rebind: bool,

    /// Pretty-print saved documents.
    pub pretty: bool,
}

impl Default for FlowsheetOptions {
    fn default() -> Self {
        Self {
            root_name: DEFAULT_ROOT_NAME.to_string(),
            allow_rebind: false,
            pretty: true,
        }
    }
}

impl FlowsheetOptions {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.root_name.trim().is_empty() {
            return Err("root_name must be non-empty".to_string());
        }
        Ok(())
    }
}

/// Load options from a TOML file.
///
/// If the file is missing, returns `FlowsheetOptions::default()`.
pub fn load_options(path: &Path) -> Result<FlowsheetOptions> {
    let invalid = |reason: String| Error::InvalidOptions {
        path: path.to_path_buf(),
        reason,
    };
    if !path.exists() {
        let options = FlowsheetOptions::default();
        options.validate().map_err(invalid)?;
        return Ok(options);
    }
    debug!(path = %path.display(), "loading options");
    let contents = fs::read_to_string(path).map_err(|err| Error::io("read options", path, err))?;
    let options: FlowsheetOptions =
        toml::from_str(&contents).map_err(|err| invalid(err.to_string()))?;
    options.validate().map_err(invalid)?;
    Ok(options)
}

/// Atomically write options to disk (temp file + rename).
pub fn write_options(path: &Path, options: &FlowsheetOptions) -> Result<()> {
    let invalid = |reason: String| Error::InvalidOptions {
        path: path.to_path_buf(),
        reason,
    };
    options.validate().map_err(invalid)?;
    let mut buf = toml::to_string_pretty(options).map_err(|err| invalid(err.to_string()))?;
    buf.push('\n');
    super::write_atomic(path, "toml.tmp", &buf)
}
