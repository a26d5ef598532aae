//! Deterministic, pure logic for the interface layer and the action engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and the model tree, and return deterministic outputs
//! suitable for tests.

pub mod actions;
pub mod document;
pub mod export;
pub mod interface;
pub mod registry;
pub mod schema;
