//! Export, persist and restore the visible variables of a hierarchical model,
//! plus a small dependency-ordered engine for named workflow actions.
//!
//! The crate keeps a strict separation:
//!
//! - **[`model`]**: the capability contract the external model tree must
//!   provide ([`model::Block`]), with an in-memory implementation.
//! - **[`core`]**: pure logic. Export declarations, block interfaces, the
//!   identity-keyed interface registry, the document types and schema, and the
//!   action graph. No I/O.
//! - **[`io`]**: options files and document read/write on paths and streams.
//!
//! [`flowsheet`] coordinates core logic with I/O: it renders an annotated tree
//! to a document, saves it, and reconciles a loaded document with the tree.

pub mod core;
pub mod error;
pub mod flowsheet;
pub mod io;
pub mod logging;
pub mod model;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::core::actions::{ActionFn, ActionGraph, Kwargs};
pub use crate::core::document::{Document, VALUE_KEY, VariableRecord};
pub use crate::core::export::{ExportDescriptor, ExportEntry, ExportSpec, ExportedVariable, VarValue};
pub use crate::core::interface::{BlockInterface, InterfaceConfig};
pub use crate::core::registry::{InterfaceRegistry, InterfaceSource};
pub use crate::core::schema::DocumentSchema;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::flowsheet::{FlowsheetInterface, VarDiff};
pub use crate::io::config::FlowsheetOptions;
pub use crate::model::{Block, BlockRef, IndexKey, MemoryBlock, Variable};
