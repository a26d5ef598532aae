//! Side table associating model blocks with their interfaces.
//!
//! Entries are keyed by block identity (the `Rc` allocation), never by name.
//! The registry is a cheap-clone handle: every clone sees the same table, so
//! one registry can be shared between the code that annotates a tree and the
//! [`FlowsheetInterface`](crate::flowsheet::FlowsheetInterface) that walks it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::debug;

use crate::core::export::ExportEntry;
use crate::core::interface::{BlockInterface, InterfaceConfig};
use crate::error::{Error, Result};
use crate::model::{Block, BlockRef};

/// Anything that can be attached as a block interface.
pub enum InterfaceSource {
    Config(InterfaceConfig),
    Value(Value),
    Interface(BlockInterface),
}

impl From<InterfaceConfig> for InterfaceSource {
    fn from(config: InterfaceConfig) -> Self {
        InterfaceSource::Config(config)
    }
}

impl From<Value> for InterfaceSource {
    fn from(value: Value) -> Self {
        InterfaceSource::Value(value)
    }
}

impl From<BlockInterface> for InterfaceSource {
    fn from(interface: BlockInterface) -> Self {
        InterfaceSource::Interface(interface)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BlockId(usize);

impl BlockId {
    fn of(block: &BlockRef) -> Self {
        BlockId(Rc::as_ptr(block) as *const () as usize)
    }
}

struct Entry {
    owner: Weak<dyn Block>,
    interface: Rc<BlockInterface>,
}

impl Entry {
    fn is_for(&self, block: &BlockRef) -> bool {
        std::ptr::addr_eq(self.owner.as_ptr(), Rc::as_ptr(block)) && self.owner.strong_count() > 0
    }
}

#[derive(Clone, Default)]
pub struct InterfaceRegistry {
    entries: Rc<RefCell<HashMap<BlockId, Entry>>>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an interface to `block`, replacing any previous one.
    pub fn set_block_interface(
        &self,
        block: &BlockRef,
        source: impl Into<InterfaceSource>,
    ) -> Result<Rc<BlockInterface>> {
        let interface = match source.into() {
            InterfaceSource::Config(config) => BlockInterface::new(block, config)?,
            InterfaceSource::Value(value) => BlockInterface::from_value(block, &value)?,
            InterfaceSource::Interface(interface) => {
                if !interface.owns(block) {
                    return Err(Error::InvalidConfig(format!(
                        "interface built for block '{}' cannot be attached to block '{}'",
                        interface.block_name(),
                        block.name()
                    )));
                }
                interface
            }
        };
        let interface = Rc::new(interface);
        let replaced = self
            .entries
            .borrow_mut()
            .insert(
                BlockId::of(block),
                Entry {
                    owner: Rc::downgrade(block),
                    interface: Rc::clone(&interface),
                },
            )
            .is_some();
        debug!(block = block.name(), replaced, "block interface attached");
        Ok(interface)
    }

    /// Declare exported variables on `block` in one call.
    pub fn export_variables<E: Into<ExportEntry>>(
        &self,
        block: &BlockRef,
        display_name: Option<&str>,
        description: Option<&str>,
        variables: impl IntoIterator<Item = E>,
    ) -> Result<Rc<BlockInterface>> {
        let config = InterfaceConfig {
            display_name: display_name.map(str::to_string),
            description: description.map(str::to_string),
            variables: variables.into_iter().map(Into::into).collect(),
        };
        self.set_block_interface(block, config)
    }

    pub fn get_block_interface(&self, block: &BlockRef) -> Option<Rc<BlockInterface>> {
        let entries = self.entries.borrow();
        let entry = entries.get(&BlockId::of(block))?;
        entry.is_for(block).then(|| Rc::clone(&entry.interface))
    }

    pub fn remove_block_interface(&self, block: &BlockRef) -> Option<Rc<BlockInterface>> {
        let mut entries = self.entries.borrow_mut();
        let id = BlockId::of(block);
        if !entries.get(&id).is_some_and(|entry| entry.is_for(block)) {
            return None;
        }
        entries.remove(&id).map(|entry| entry.interface)
    }

    /// Drop entries whose block no longer exists. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|_, entry| entry.owner.strong_count() > 0);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl std::fmt::Debug for InterfaceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceRegistry")
            .field("entries", &self.len())
            .finish()
    }
}
