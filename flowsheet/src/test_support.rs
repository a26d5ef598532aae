//! Test-only helpers for building annotated model trees.

use std::rc::Rc;

use serde_json::{Map, Value, json};

use crate::core::interface::InterfaceConfig;
use crate::core::registry::InterfaceRegistry;
use crate::error::Result;
use crate::model::{BlockRef, MemoryBlock, Variable};

/// Handles to every node of the tree built by [`mock_flowsheet`].
///
/// ```text
/// Flowsheet            foo_var (scalar), bar_var (indexed 0..3)
/// ├── subblock1        interface, no exports
/// ├── subblock2        interface, no exports
/// └── subblock3        no interface
///     └── subblock1    interface, no exports
/// ```
pub struct MockFlowsheet {
    pub root: Rc<MemoryBlock>,
    pub subblock1: Rc<MemoryBlock>,
    pub subblock2: Rc<MemoryBlock>,
    pub subblock3: Rc<MemoryBlock>,
    pub nested: Rc<MemoryBlock>,
}

impl MockFlowsheet {
    pub fn root_ref(&self) -> BlockRef {
        as_block(&self.root)
    }
}

pub fn as_block(block: &Rc<MemoryBlock>) -> BlockRef {
    Rc::clone(block) as BlockRef
}

/// Build the mock tree and attach empty interfaces to the sub-blocks that
/// carry one. The root is left without an interface.
pub fn mock_flowsheet(registry: &InterfaceRegistry) -> Result<MockFlowsheet> {
    let subblock1 = Rc::new(MemoryBlock::new("subblock1").with_description("sub-block 1"));
    let subblock2 = Rc::new(MemoryBlock::new("subblock2").with_description("sub-block 2"));
    let nested = Rc::new(MemoryBlock::new("subblock1").with_description("sub-block 1"));
    let subblock3 = Rc::new(
        MemoryBlock::new("subblock3")
            .with_description("sub-block 3")
            .with_child(Rc::clone(&nested)),
    );
    let root = Rc::new(
        MemoryBlock::new("Flowsheet")
            .with_description("flowsheet description")
            .with_variable("foo_var", Variable::Scalar(0.0))
            .with_variable("bar_var", Variable::indexed([(0, 0.0), (1, 0.0), (2, 0.0)]))
            .with_child(Rc::clone(&subblock1))
            .with_child(Rc::clone(&subblock2))
            .with_child(Rc::clone(&subblock3)),
    );

    for block in [&subblock1, &subblock2, &nested] {
        registry.set_block_interface(&as_block(block), InterfaceConfig::default())?;
    }

    Ok(MockFlowsheet {
        root,
        subblock1,
        subblock2,
        subblock3,
        nested,
    })
}

/// Raw root configuration exporting up to two of `foo_var` / `bar_var`.
///
/// `variables: None` omits the `variables` key entirely. Positions listed in
/// `readonly` are exported read-only.
pub fn build_options(
    display_name: bool,
    description: bool,
    variables: Option<usize>,
    readonly: &[usize],
) -> Value {
    let mut opts = Map::new();
    if display_name {
        opts.insert("display_name".to_string(), json!("foo"));
    }
    if description {
        opts.insert("description".to_string(), json!("This is a foo"));
    }
    if let Some(count) = variables {
        let entries: Vec<Value> = (0..count.min(2))
            .map(|i| {
                let name = if i == 0 { "foo" } else { "bar" };
                let mut entry = json!({
                    "display_name": format!("{name} variable"),
                    "name": format!("{name}_var"),
                });
                if readonly.contains(&i) {
                    entry["readonly"] = json!(true);
                }
                entry
            })
            .collect();
        opts.insert("variables".to_string(), Value::Array(entries));
    }
    Value::Object(opts)
}
