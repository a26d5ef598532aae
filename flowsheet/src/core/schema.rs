//! Structural schema for persisted documents.
//!
//! The schema is recursive (`blocks` items refer back to the root) and open:
//! keys it does not describe are accepted.

use jsonschema::{Validator, validator_for};
use serde_json::Value;

use crate::error::{Error, Result};

pub const DOCUMENT_SCHEMA_V1: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/document/v1.schema.json"
));

pub struct DocumentSchema {
    raw: Value,
    compiled: Validator,
}

impl DocumentSchema {
    pub fn new() -> Result<Self> {
        let raw: Value = serde_json::from_str(DOCUMENT_SCHEMA_V1)?;
        let compiled = validator_for(&raw)
            .map_err(|err| Error::InvalidConfig(format!("invalid document schema: {err}")))?;
        Ok(Self { raw, compiled })
    }

    pub fn as_value(&self) -> &Value {
        &self.raw
    }

    pub fn is_valid(&self, document: &Value) -> bool {
        self.compiled.is_valid(document)
    }

    /// Validate `document`, collecting every violation.
    pub fn validate(&self, document: &Value) -> Result<()> {
        if self.compiled.is_valid(document) {
            return Ok(());
        }
        let messages = self
            .compiled
            .iter_errors(document)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        Err(Error::InvalidDocument(messages))
    }
}

impl std::fmt::Debug for DocumentSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSchema").finish_non_exhaustive()
    }
}
