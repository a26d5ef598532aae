//! Per-variable export declarations.

use serde::{Deserialize, Serialize};

use crate::model::{IndexKey, Variable};

/// How one variable of a block appears in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDescriptor {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub readonly: bool,
    /// Index keys in index order; empty for scalars and for declarations
    /// that have not been resolved yet.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indices: Vec<IndexKey>,
}

impl ExportDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            description: String::new(),
            readonly: false,
            indices: Vec::new(),
        }
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }
}

/// One entry of the `variables` list in a raw interface configuration.
///
/// A bare string is shorthand for `{ "name": <string> }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExportEntry {
    Name(String),
    Spec(ExportSpec),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub readonly: bool,
}

impl ExportEntry {
    pub fn name(&self) -> &str {
        match self {
            ExportEntry::Name(name) => name,
            ExportEntry::Spec(spec) => &spec.name,
        }
    }

    pub fn into_descriptor(self) -> ExportDescriptor {
        match self {
            ExportEntry::Name(name) => ExportDescriptor::new(name),
            ExportEntry::Spec(spec) => ExportDescriptor {
                display_name: spec.display_name.unwrap_or_else(|| spec.name.clone()),
                description: spec.description.unwrap_or_default(),
                readonly: spec.readonly,
                name: spec.name,
                indices: Vec::new(),
            },
        }
    }
}

impl From<&str> for ExportEntry {
    fn from(name: &str) -> Self {
        ExportEntry::Name(name.to_string())
    }
}

impl From<ExportSpec> for ExportEntry {
    fn from(spec: ExportSpec) -> Self {
        ExportEntry::Spec(spec)
    }
}

impl From<&ExportDescriptor> for ExportEntry {
    fn from(descriptor: &ExportDescriptor) -> Self {
        ExportEntry::Spec(ExportSpec {
            name: descriptor.name.clone(),
            display_name: Some(descriptor.display_name.clone()),
            description: Some(descriptor.description.clone()),
            readonly: descriptor.readonly,
        })
    }
}

/// Persisted value(s) of one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    Scalar(f64),
    /// Values aligned with the descriptor's index order.
    Indexed(Vec<f64>),
}

impl VarValue {
    /// Whether every value has a JSON number representation.
    pub fn is_finite(&self) -> bool {
        match self {
            VarValue::Scalar(value) => value.is_finite(),
            VarValue::Indexed(values) => values.iter().all(|value| value.is_finite()),
        }
    }
}

/// A declaration resolved against the live block.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedVariable {
    pub descriptor: ExportDescriptor,
    pub value: VarValue,
}

impl ExportedVariable {
    /// Flatten a live variable into descriptor indices plus aligned values.
    pub(crate) fn resolve(descriptor: &ExportDescriptor, variable: Variable) -> Self {
        let mut descriptor = descriptor.clone();
        let value = match variable {
            Variable::Scalar(value) => {
                descriptor.indices.clear();
                VarValue::Scalar(value)
            }
            Variable::Indexed(values) => {
                let (indices, values): (Vec<IndexKey>, Vec<f64>) = values.into_iter().unzip();
                descriptor.indices = indices;
                VarValue::Indexed(values)
            }
        };
        Self { descriptor, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shorthand_normalizes_to_writable_descriptor() {
        let entry: ExportEntry = serde_json::from_value(json!("foo_var")).expect("entry");
        let descriptor = entry.into_descriptor();
        assert_eq!(descriptor.name, "foo_var");
        assert_eq!(descriptor.display_name, "foo_var");
        assert!(!descriptor.readonly);
    }

    #[test]
    fn record_entry_keeps_flags() {
        let entry: ExportEntry = serde_json::from_value(json!({
            "name": "bar_var",
            "display_name": "bar variable",
            "readonly": true
        }))
        .expect("entry");
        let descriptor = entry.into_descriptor();
        assert_eq!(descriptor.display_name, "bar variable");
        assert!(descriptor.readonly);
    }

    #[test]
    fn record_entry_rejects_unknown_keys() {
        let result: Result<ExportEntry, _> =
            serde_json::from_value(json!({"name": "x", "units": "m"}));
        assert!(result.is_err());
    }

    #[test]
    fn resolve_flattens_indexed_values_in_index_order() {
        let descriptor = ExportDescriptor::new("bar_var");
        let resolved = ExportedVariable::resolve(
            &descriptor,
            Variable::indexed([(2, 0.5), (0, 1.5), (1, 2.5)]),
        );
        assert_eq!(
            resolved.descriptor.indices,
            vec![IndexKey::Int(2), IndexKey::Int(0), IndexKey::Int(1)]
        );
        assert_eq!(resolved.value, VarValue::Indexed(vec![0.5, 1.5, 2.5]));
    }

    #[test]
    fn non_finite_values_are_detected() {
        assert!(VarValue::Scalar(1.0).is_finite());
        assert!(VarValue::Indexed(vec![]).is_finite());
        assert!(!VarValue::Scalar(f64::INFINITY).is_finite());
        assert!(!VarValue::Indexed(vec![1.0, f64::NAN]).is_finite());
    }
}
