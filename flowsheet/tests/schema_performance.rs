//! Scale test for document schema validation.
//!
//! Validation cost must stay bounded per block as documents grow; this
//! builds 100 top-level blocks, each with 10 sub-blocks, every block holding
//! 100 variable records, and checks the amortized cost per block.

use std::time::Instant;

use flowsheet::FlowsheetInterface;
use serde_json::{Value, json};

const TOP_LEVEL_BLOCKS: usize = 100;
const SUB_BLOCKS: usize = 10;
const VARIABLES: usize = 100;
const MAX_SECS_PER_BLOCK: f64 = 0.02;

fn section(name: &str, num_vars: usize) -> Value {
    let variables: Vec<Value> = (0..num_vars)
        .map(|i| {
            json!({
                "name": format!("v{i}"),
                "display_name": format!("variable {i}"),
                "units": "dimensionless",
            })
        })
        .collect();
    json!({"name": name, "blocks": [], "variables": variables})
}

fn big_document() -> Value {
    let blocks: Vec<Value> = (0..TOP_LEVEL_BLOCKS)
        .map(|i| {
            let mut block = section(&format!("block{i}"), VARIABLES);
            block["blocks"] = Value::Array(
                (0..SUB_BLOCKS)
                    .map(|j| section(&format!("block{i}_{j}"), VARIABLES))
                    .collect(),
            );
            block
        })
        .collect();
    json!({"name": "__root__", "blocks": blocks})
}

#[test]
fn validation_cost_per_block_is_bounded() {
    let schema = FlowsheetInterface::get_schema().expect("schema");
    let document = big_document();
    let total_blocks = TOP_LEVEL_BLOCKS * SUB_BLOCKS;

    let started = Instant::now();
    schema.validate(&document).expect("valid");
    let elapsed = started.elapsed().as_secs_f64();

    assert!(
        elapsed < MAX_SECS_PER_BLOCK * total_blocks as f64,
        "validated {total_blocks} blocks in {elapsed:.3}s ({:.3} ms/block)",
        elapsed / total_blocks as f64 * 1000.0
    );
}

#[test]
fn invalid_leaf_deep_in_large_document_is_found() {
    let schema = FlowsheetInterface::get_schema().expect("schema");
    let mut document = big_document();
    document["blocks"][TOP_LEVEL_BLOCKS - 1]["blocks"][SUB_BLOCKS - 1]["variables"] = json!("oops");
    assert!(!schema.is_valid(&document));
}
