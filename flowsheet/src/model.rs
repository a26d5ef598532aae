//! Capability contract for the external model tree.
//!
//! The interface layer never owns the model: it reads names, children and
//! variables through [`Block`] and writes values back through
//! [`Block::set_value`]. Node identity is the `Rc` allocation behind a
//! [`BlockRef`], so two blocks with the same name are still distinct.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub type BlockRef = Rc<dyn Block>;

/// Key of one element of an indexed variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexKey {
    Int(i64),
    Str(String),
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Int(value) => write!(f, "{value}"),
            IndexKey::Str(value) => f.write_str(value),
        }
    }
}

impl From<i64> for IndexKey {
    fn from(value: i64) -> Self {
        IndexKey::Int(value)
    }
}

impl From<&str> for IndexKey {
    fn from(value: &str) -> Self {
        IndexKey::Str(value.to_string())
    }
}

/// Live value of a model variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    Scalar(f64),
    /// Values in stable index order.
    Indexed(IndexMap<IndexKey, f64>),
}

impl Variable {
    pub fn indexed<K: Into<IndexKey>>(values: impl IntoIterator<Item = (K, f64)>) -> Self {
        Variable::Indexed(values.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, Variable::Indexed(_))
    }
}

/// A node of the model tree.
///
/// Mutation goes through `&self`; implementations use interior mutability
/// and are only ever driven from a single thread.
pub trait Block {
    fn name(&self) -> &str;

    fn display_name(&self) -> Option<&str> {
        None
    }

    fn description(&self) -> Option<&str> {
        None
    }

    /// Child blocks in a stable order.
    fn children(&self) -> Vec<BlockRef>;

    fn variable(&self, name: &str) -> Option<Variable>;

    /// Overwrite one value in place. `index` is `None` for scalars.
    ///
    /// Returns `false` if the variable (or index) does not exist or the
    /// shape does not match.
    fn set_value(&self, name: &str, index: Option<&IndexKey>, value: f64) -> bool;
}

/// In-memory [`Block`] for callers without their own model type.
#[derive(Debug, Default)]
pub struct MemoryBlock {
    name: String,
    display_name: Option<String>,
    description: Option<String>,
    variables: RefCell<IndexMap<String, Variable>>,
    children: RefCell<Vec<Rc<MemoryBlock>>>,
}

impl MemoryBlock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_variable(self, name: impl Into<String>, variable: Variable) -> Self {
        self.variables.borrow_mut().insert(name.into(), variable);
        self
    }

    pub fn with_child(self, child: Rc<MemoryBlock>) -> Self {
        self.children.borrow_mut().push(child);
        self
    }

    pub fn add_child(&self, child: Rc<MemoryBlock>) {
        self.children.borrow_mut().push(child);
    }

    pub fn insert_variable(&self, name: impl Into<String>, variable: Variable) {
        self.variables.borrow_mut().insert(name.into(), variable);
    }

    pub fn scalar(&self, name: &str) -> Option<f64> {
        match self.variables.borrow().get(name) {
            Some(Variable::Scalar(value)) => Some(*value),
            _ => None,
        }
    }
}

impl Block for MemoryBlock {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn children(&self) -> Vec<BlockRef> {
        self.children
            .borrow()
            .iter()
            .map(|child| Rc::clone(child) as BlockRef)
            .collect()
    }

    fn variable(&self, name: &str) -> Option<Variable> {
        self.variables.borrow().get(name).cloned()
    }

    fn set_value(&self, name: &str, index: Option<&IndexKey>, value: f64) -> bool {
        let mut variables = self.variables.borrow_mut();
        match (variables.get_mut(name), index) {
            (Some(Variable::Scalar(slot)), None) => {
                *slot = value;
                true
            }
            (Some(Variable::Indexed(values)), Some(key)) => match values.get_mut(key) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_value_respects_shape() {
        let block = MemoryBlock::new("b")
            .with_variable("x", Variable::Scalar(1.0))
            .with_variable("y", Variable::indexed([(0, 1.0), (1, 2.0)]));

        assert!(block.set_value("x", None, 3.0));
        assert!(!block.set_value("x", Some(&IndexKey::Int(0)), 3.0));
        assert!(block.set_value("y", Some(&IndexKey::Int(1)), 5.0));
        assert!(!block.set_value("y", Some(&IndexKey::Int(7)), 5.0));
        assert!(!block.set_value("missing", None, 1.0));

        assert_eq!(block.scalar("x"), Some(3.0));
        assert_eq!(
            block.variable("y"),
            Some(Variable::indexed([(0, 1.0), (1, 5.0)]))
        );
    }

    #[test]
    fn children_keep_insertion_order() {
        let parent = MemoryBlock::new("p")
            .with_child(Rc::new(MemoryBlock::new("b")))
            .with_child(Rc::new(MemoryBlock::new("a")));
        let names: Vec<String> = parent
            .children()
            .iter()
            .map(|child| child.name().to_string())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
