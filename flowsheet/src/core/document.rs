//! Serialized form of an exported tree.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::export::{ExportedVariable, VarValue};
use crate::model::IndexKey;

/// Key holding the persisted value(s) inside a [`VariableRecord`].
pub const VALUE_KEY: &str = "value";

/// One block entry. `blocks` order is build order; reload matches by `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub variables: Vec<VariableRecord>,
    #[serde(default)]
    pub blocks: Vec<Document>,
    /// Keys this crate does not interpret, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            description: None,
            variables: Vec::new(),
            blocks: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn block(&self, name: &str) -> Option<&Document> {
        self.blocks.iter().find(|block| block.name == name)
    }

    pub fn block_mut(&mut self, name: &str) -> Option<&mut Document> {
        self.blocks.iter_mut().find(|block| block.name == name)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableRecord> {
        self.variables.iter().find(|variable| variable.name == name)
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut VariableRecord> {
        self.variables.iter_mut().find(|variable| variable.name == name)
    }

    /// Follow a `/`-separated path of block names below this entry.
    pub fn find(&self, path: &str) -> Option<&Document> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |doc, segment| doc.block(segment))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRecord {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<VarValue>,
    /// Index keys aligned with an indexed `value`; absent for scalars.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indices: Vec<IndexKey>,
}

impl From<ExportedVariable> for VariableRecord {
    fn from(exported: ExportedVariable) -> Self {
        let ExportedVariable { descriptor, value } = exported;
        Self {
            name: descriptor.name,
            display_name: descriptor.display_name,
            description: descriptor.description,
            readonly: descriptor.readonly,
            value: Some(value),
            indices: descriptor.indices,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_keys_survive_round_trip() {
        let raw = json!({
            "name": "fs",
            "blocks": [],
            "units": {"flow": "m3/s"},
            "version": 2
        });
        let doc: Document = serde_json::from_value(raw.clone()).expect("parse");
        assert_eq!(doc.extra.get("version"), Some(&json!(2)));
        let back = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(back["units"], raw["units"]);
        assert_eq!(back["version"], raw["version"]);
    }

    #[test]
    fn value_key_holds_scalar_or_sequence() {
        let mut doc = Document::new("fs");
        doc.variables.push(VariableRecord {
            name: "x".to_string(),
            display_name: "x".to_string(),
            description: String::new(),
            readonly: false,
            value: Some(VarValue::Scalar(1.5)),
            indices: Vec::new(),
        });
        doc.variables.push(VariableRecord {
            name: "y".to_string(),
            display_name: "y".to_string(),
            description: String::new(),
            readonly: false,
            value: Some(VarValue::Indexed(vec![1.0, 2.0])),
            indices: vec![IndexKey::Int(0), IndexKey::from("b")],
        });
        let value = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(value["variables"][0][VALUE_KEY], json!(1.5));
        assert_eq!(value["variables"][1][VALUE_KEY], json!([1.0, 2.0]));
        assert_eq!(value["variables"][1]["indices"], json!([0, "b"]));
        assert!(value["variables"][0].get("indices").is_none());
    }

    #[test]
    fn find_follows_block_names() {
        let mut root = Document::new("__root__");
        let mut fs = Document::new("fs");
        fs.blocks.push(Document::new("unit"));
        root.blocks.push(fs);
        assert_eq!(root.find("fs/unit").map(|d| d.name.as_str()), Some("unit"));
        assert!(root.find("fs/other").is_none());
    }
}
