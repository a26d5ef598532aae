//! Block interfaces: the explicit, opt-in export contract of one block.
//!
//! Declarations are normalized when the interface is built but resolved
//! against the live block only when [`BlockInterface::get_exported_variables`]
//! is iterated, so an interface can be attached before the block's variables
//! exist.

use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use indexmap::map::Values;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::export::{ExportDescriptor, ExportEntry, ExportedVariable};
use crate::error::{Error, Result};
use crate::model::{Block, BlockRef};

/// Raw interface configuration.
///
/// Only `display_name`, `description` and `variables` are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub variables: Vec<ExportEntry>,
}

impl InterfaceConfig {
    pub fn from_value(value: &Value) -> Result<Self> {
        InterfaceConfig::deserialize(value).map_err(|err| Error::InvalidConfig(err.to_string()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|err| Error::InvalidConfig(err.to_string()))
    }
}

pub struct BlockInterface {
    owner: Weak<dyn Block>,
    block_name: String,
    display_name: Option<String>,
    description: Option<String>,
    exports: IndexMap<String, ExportDescriptor>,
}

impl BlockInterface {
    pub fn new(block: &BlockRef, config: InterfaceConfig) -> Result<Self> {
        let mut exports = IndexMap::with_capacity(config.variables.len());
        for entry in config.variables {
            let descriptor = entry.into_descriptor();
            if exports.contains_key(&descriptor.name) {
                return Err(Error::InvalidConfig(format!(
                    "variable '{}' exported twice on block '{}'",
                    descriptor.name,
                    block.name()
                )));
            }
            exports.insert(descriptor.name.clone(), descriptor);
        }
        debug!(block = block.name(), exports = exports.len(), "block interface built");
        Ok(Self {
            owner: Rc::downgrade(block),
            block_name: block.name().to_string(),
            display_name: config.display_name,
            description: config.description,
            exports,
        })
    }

    pub fn from_value(block: &BlockRef, value: &Value) -> Result<Self> {
        Self::new(block, InterfaceConfig::from_value(value)?)
    }

    pub fn block_name(&self) -> &str {
        &self.block_name
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Declared exports, unresolved, in declaration order.
    pub fn exports(&self) -> impl Iterator<Item = &ExportDescriptor> {
        self.exports.values()
    }

    pub fn export(&self, name: &str) -> Option<&ExportDescriptor> {
        self.exports.get(name)
    }

    /// Live owner, if it has not been dropped.
    pub fn block(&self) -> Option<BlockRef> {
        self.owner.upgrade()
    }

    /// True if `block` is the node this interface was built for.
    pub fn owns(&self, block: &BlockRef) -> bool {
        std::ptr::addr_eq(self.owner.as_ptr(), Rc::as_ptr(block))
    }

    /// Resolve every declaration against the live block.
    ///
    /// The iterator is lazy; call again to restart from the first export.
    pub fn get_exported_variables(&self) -> ExportedVariables<'_> {
        ExportedVariables {
            owner: self.owner.upgrade(),
            block_name: &self.block_name,
            exports: self.exports.values(),
            done: false,
        }
    }

    pub fn to_config(&self) -> InterfaceConfig {
        InterfaceConfig {
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            variables: self.exports.values().map(ExportEntry::from).collect(),
        }
    }
}

impl std::fmt::Debug for BlockInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockInterface")
            .field("block_name", &self.block_name)
            .field("display_name", &self.display_name)
            .field("description", &self.description)
            .field("exports", &self.exports)
            .finish()
    }
}

pub struct ExportedVariables<'a> {
    owner: Option<BlockRef>,
    block_name: &'a str,
    exports: Values<'a, String, ExportDescriptor>,
    done: bool,
}

impl Iterator for ExportedVariables<'_> {
    type Item = Result<ExportedVariable>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let descriptor = self.exports.next()?;
        let Some(owner) = &self.owner else {
            self.done = true;
            return Some(Err(Error::BlockDropped(self.block_name.to_string())));
        };
        match owner.variable(&descriptor.name) {
            Some(variable) => Some(Ok(ExportedVariable::resolve(descriptor, variable))),
            None => Some(Err(Error::UnresolvedExport {
                block: self.block_name.to_string(),
                name: descriptor.name.clone(),
            })),
        }
    }
}
