//! Tree synchronizer: renders an annotated model tree to a [`Document`] and
//! reconciles a loaded document back into the live tree.
//!
//! Lifecycle: a [`FlowsheetInterface`] starts unbound, becomes bound through
//! [`FlowsheetInterface::set_block`], and is synchronized once a load has
//! succeeded. Diff state (`var_missing` / `var_extra`) only exists after that
//! first load and is replaced wholesale by every later load.
//!
//! Only blocks that carry a [`BlockInterface`] become document entries. Blocks
//! without one are walked through: their exported descendants are hoisted into
//! the nearest exported ancestor, both when building and when loading.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::{Read, Write};
use std::path::Path;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::actions::{ActionFn, ActionGraph, Kwargs, workflow};
use crate::core::document::{Document, VariableRecord};
use crate::core::export::{ExportedVariable, VarValue};
use crate::core::interface::{BlockInterface, InterfaceConfig};
use crate::core::registry::InterfaceRegistry;
use crate::core::schema::DocumentSchema;
use crate::error::{Error, Result};
use crate::io::config::FlowsheetOptions;
use crate::io::document_store::{read_document, read_document_from, write_document, write_document_to};
use crate::model::{BlockRef, IndexKey};

/// Block path (`/`-separated entry names below the root) → variable names.
pub type VarDiff = BTreeMap<String, BTreeSet<String>>;

type Exported = (BlockRef, Rc<BlockInterface>);

pub struct FlowsheetInterface {
    registry: InterfaceRegistry,
    config: Option<InterfaceConfig>,
    options: FlowsheetOptions,
    block: Option<BlockRef>,
    document: Option<Document>,
    diff: Option<LoadDiff>,
    actions: ActionGraph,
}

#[derive(Debug, Default)]
struct LoadDiff {
    missing: VarDiff,
    extra: VarDiff,
}

/// Everything a load will do, computed before the tree is touched.
#[derive(Default)]
struct LoadPlan {
    writes: Vec<ValueWrite>,
    diff: LoadDiff,
    skipped_readonly: usize,
}

struct ValueWrite {
    block: BlockRef,
    name: String,
    index: Option<IndexKey>,
    value: f64,
    previous: f64,
}

impl LoadPlan {
    fn missing(&mut self, path: &str, name: &str) {
        self.diff
            .missing
            .entry(path.to_string())
            .or_default()
            .insert(name.to_string());
    }

    fn extra(&mut self, path: &str, name: &str) {
        self.diff
            .extra
            .entry(path.to_string())
            .or_default()
            .insert(name.to_string());
    }

    /// Record every variable of a document entry nothing in the tree matched.
    fn extra_entry(&mut self, entry: &Document, parent: &str) {
        let path = join_path(parent, &entry.name);
        for record in &entry.variables {
            self.extra(&path, &record.name);
        }
        for child in &entry.blocks {
            self.extra_entry(child, &path);
        }
    }

    /// Apply every write, or none: a write the model rejects rolls back the
    /// ones already applied.
    fn apply(self) -> Result<LoadDiff> {
        for (applied, write) in self.writes.iter().enumerate() {
            if !write
                .block
                .set_value(&write.name, write.index.as_ref(), write.value)
            {
                for done in self.writes[..applied].iter().rev() {
                    done.block
                        .set_value(&done.name, done.index.as_ref(), done.previous);
                }
                warn!(
                    block = write.block.name(),
                    variable = %write.name,
                    rolled_back = applied,
                    "model rejected a planned write"
                );
                return Err(Error::ValueShape {
                    block: write.block.name().to_string(),
                    name: write.name.clone(),
                    reason: "model rejected the loaded value".to_string(),
                });
            }
        }
        debug!(
            writes = self.writes.len(),
            skipped_readonly = self.skipped_readonly,
            "load plan applied"
        );
        Ok(self.diff)
    }
}

impl FlowsheetInterface {
    pub fn new(registry: InterfaceRegistry, config: InterfaceConfig) -> Self {
        Self::unbound(registry, Some(config))
    }

    /// Construct from a raw configuration value.
    pub fn from_value(registry: InterfaceRegistry, config: &Value) -> Result<Self> {
        Ok(Self::new(registry, InterfaceConfig::from_value(config)?))
    }

    pub fn with_options(mut self, options: FlowsheetOptions) -> Self {
        self.options = options;
        self
    }

    fn unbound(registry: InterfaceRegistry, config: Option<InterfaceConfig>) -> Self {
        Self {
            registry,
            config,
            options: FlowsheetOptions::default(),
            block: None,
            document: None,
            diff: None,
            actions: ActionGraph::workflow(),
        }
    }

    /// Bind `block`, load the document at `path` into it, and return the
    /// synchronized instance.
    ///
    /// An interface already attached to `block` is kept; otherwise an empty
    /// one is attached so the root still appears in documents.
    pub fn load_from(
        registry: InterfaceRegistry,
        path: impl AsRef<Path>,
        block: BlockRef,
    ) -> Result<Self> {
        let mut flowsheet = Self::unbound(registry, None);
        flowsheet.set_block(block)?;
        flowsheet.load(path)?;
        Ok(flowsheet)
    }

    /// Document schema; available without binding a block.
    pub fn get_schema() -> Result<DocumentSchema> {
        DocumentSchema::new()
    }

    /// Bind the root block and attach the root interface to it.
    ///
    /// Fails with [`Error::AlreadyBound`] on a bound instance unless
    /// `allow_rebind` is set, in which case document and diff state are reset.
    pub fn set_block(&mut self, block: BlockRef) -> Result<()> {
        if let Some(current) = &self.block
            && !self.options.allow_rebind
        {
            return Err(Error::AlreadyBound(current.name().to_string()));
        }
        match &self.config {
            Some(config) => {
                self.registry.set_block_interface(&block, config.clone())?;
            }
            None => {
                if self.registry.get_block_interface(&block).is_none() {
                    self.registry
                        .set_block_interface(&block, InterfaceConfig::default())?;
                }
            }
        }
        if self.block.is_some() {
            info!(block = block.name(), "rebinding flowsheet, state reset");
            self.document = None;
            self.diff = None;
        } else {
            info!(block = block.name(), "flowsheet bound");
        }
        self.block = Some(block);
        Ok(())
    }

    pub fn block(&self) -> Option<&BlockRef> {
        self.block.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.block.is_some()
    }

    pub fn is_synchronized(&self) -> bool {
        self.diff.is_some()
    }

    pub fn registry(&self) -> &InterfaceRegistry {
        &self.registry
    }

    pub fn options(&self) -> &FlowsheetOptions {
        &self.options
    }

    /// Last saved or loaded document.
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Render the live tree.
    pub fn as_dict(&self) -> Result<Document> {
        let block = self.bound()?;
        let mut root = Document::new(self.options.root_name.as_str());
        for (child, interface) in self.exported_from(block) {
            root.blocks.push(self.build_entry(&child, &interface)?);
        }
        Ok(root)
    }

    /// Save the live tree to `path`, creating or replacing the file.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let document = self.as_dict()?;
        write_document(path, &document, self.options.pretty)?;
        info!(path = %path.display(), blocks = count_entries(&document), "flowsheet saved");
        self.document = Some(document);
        Ok(())
    }

    /// Save the live tree to a caller-owned stream, which stays open.
    pub fn save_to_writer<W: Write>(&mut self, writer: &mut W) -> Result<()> {
        let document = self.as_dict()?;
        write_document_to(writer, &document, self.options.pretty)?;
        info!(blocks = count_entries(&document), "flowsheet saved to stream");
        self.document = Some(document);
        Ok(())
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let value = read_document(path.as_ref())?;
        self.load_value(value)
    }

    pub fn load_from_reader<R: Read>(&mut self, reader: R) -> Result<()> {
        let value = read_document_from(reader)?;
        self.load_value(value)
    }

    /// Validate `value` and reconcile it with the live tree.
    ///
    /// Nothing in the tree changes unless the whole document validates, every
    /// write can be planned and the model accepts every write.
    pub fn load_value(&mut self, value: Value) -> Result<()> {
        let block = Rc::clone(self.bound()?);
        Self::get_schema()?.validate(&value)?;
        let document: Document = serde_json::from_value(value)?;

        let mut plan = LoadPlan::default();
        let top = self.exported_from(&block);
        self.plan_level(&top, &document.blocks, "", &mut plan)?;
        let diff = plan.apply()?;

        info!(
            missing = diff.missing.values().map(BTreeSet::len).sum::<usize>(),
            extra = diff.extra.values().map(BTreeSet::len).sum::<usize>(),
            "flowsheet loaded"
        );
        self.diff = Some(diff);
        self.document = Some(document);
        Ok(())
    }

    /// Variables declared in the tree but absent from the last loaded document.
    pub fn get_var_missing(&self) -> Result<&VarDiff> {
        self.diff
            .as_ref()
            .map(|diff| &diff.missing)
            .ok_or(Error::NotLoaded)
    }

    /// Variables in the last loaded document that the tree does not declare.
    pub fn get_var_extra(&self) -> Result<&VarDiff> {
        self.diff
            .as_ref()
            .map(|diff| &diff.extra)
            .ok_or(Error::NotLoaded)
    }

    pub fn actions(&self) -> &ActionGraph {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut ActionGraph {
        &mut self.actions
    }

    pub fn add_action_type(&mut self, name: &str, dependencies: &[&str]) -> Result<()> {
        self.actions.add_action_type(name, dependencies)
    }

    pub fn set_action<F>(&mut self, name: &str, action: F, kwargs: Kwargs) -> Result<()>
    where
        F: Fn(&Kwargs) -> anyhow::Result<()> + 'static,
    {
        self.actions.set_action(name, action, kwargs)
    }

    pub fn get_action(&self, name: &str) -> Result<(Option<ActionFn>, &Kwargs)> {
        self.actions.get_action(name)
    }

    pub fn run_action(&self, name: &str) -> Result<()> {
        self.actions.run_action(name)
    }

    /// Run the `build` workflow action.
    pub fn build(&self) -> Result<()> {
        self.run_action(workflow::BUILD)
    }

    /// Run the `solve` workflow action (after `build`).
    pub fn solve(&self) -> Result<()> {
        self.run_action(workflow::SOLVE)
    }

    fn bound(&self) -> Result<&BlockRef> {
        self.block.as_ref().ok_or(Error::Unbound)
    }

    /// `block` itself if exported, otherwise its nearest exported descendants.
    fn exported_from(&self, block: &BlockRef) -> Vec<Exported> {
        match self.registry.get_block_interface(block) {
            Some(interface) => vec![(Rc::clone(block), interface)],
            None => self.exported_below(block),
        }
    }

    /// Nearest exported descendants of `block`, in child order.
    fn exported_below(&self, block: &BlockRef) -> Vec<Exported> {
        let mut out = Vec::new();
        for child in block.children() {
            out.extend(self.exported_from(&child));
        }
        out
    }

    fn build_entry(&self, block: &BlockRef, interface: &BlockInterface) -> Result<Document> {
        let mut entry = Document::new(block.name());
        entry.display_name = interface
            .display_name()
            .or_else(|| block.display_name())
            .map(str::to_string);
        entry.description = interface
            .description()
            .or_else(|| block.description())
            .map(str::to_string);
        for exported in interface.get_exported_variables() {
            let exported = exported?;
            if !exported.value.is_finite() {
                return Err(Error::ValueShape {
                    block: block.name().to_string(),
                    name: exported.descriptor.name,
                    reason: "non-finite values cannot be saved".to_string(),
                });
            }
            entry.variables.push(VariableRecord::from(exported));
        }
        for (child, child_interface) in self.exported_below(block) {
            entry.blocks.push(self.build_entry(&child, &child_interface)?);
        }
        Ok(entry)
    }

    /// Match exported live blocks to document entries at one level, by name.
    fn plan_level(
        &self,
        live: &[Exported],
        entries: &[Document],
        parent: &str,
        plan: &mut LoadPlan,
    ) -> Result<()> {
        let mut matched = vec![false; entries.len()];
        for (block, interface) in live {
            let path = join_path(parent, block.name());
            let found = entries
                .iter()
                .enumerate()
                .position(|(pos, entry)| !matched[pos] && entry.name == block.name());
            match found {
                Some(pos) => {
                    matched[pos] = true;
                    self.plan_block(block, interface, &entries[pos], &path, plan)?;
                }
                None => {
                    debug!(path = %path, "block absent from document");
                    for export in interface.exports() {
                        plan.missing(&path, &export.name);
                    }
                    self.plan_level(&self.exported_below(block), &[], &path, plan)?;
                }
            }
        }
        for (entry, _) in entries.iter().zip(matched).filter(|(_, seen)| !seen) {
            debug!(name = %entry.name, "document entry has no live block");
            plan.extra_entry(entry, parent);
        }
        Ok(())
    }

    fn plan_block(
        &self,
        block: &BlockRef,
        interface: &BlockInterface,
        entry: &Document,
        path: &str,
        plan: &mut LoadPlan,
    ) -> Result<()> {
        for exported in interface.get_exported_variables() {
            let exported = exported?;
            let name = exported.descriptor.name.as_str();
            let Some(record) = entry.variable(name) else {
                plan.missing(path, name);
                continue;
            };
            if exported.descriptor.readonly {
                debug!(path = %path, variable = name, "read-only, loaded value discarded");
                plan.skipped_readonly += 1;
                continue;
            }
            let Some(value) = &record.value else {
                continue;
            };
            plan_writes(block, &exported, record, value, plan)?;
        }
        for record in &entry.variables {
            if interface.export(&record.name).is_none() {
                plan.extra(path, &record.name);
            }
        }
        self.plan_level(&self.exported_below(block), &entry.blocks, path, plan)
    }
}

/// Queue the writes for one variable, matching indexed values by key when
/// the record carries indices and by position otherwise.
fn plan_writes(
    block: &BlockRef,
    exported: &ExportedVariable,
    record: &VariableRecord,
    value: &VarValue,
    plan: &mut LoadPlan,
) -> Result<()> {
    let name = &exported.descriptor.name;
    let shape_error = |reason: String| Error::ValueShape {
        block: block.name().to_string(),
        name: name.clone(),
        reason,
    };
    let live_indices = &exported.descriptor.indices;

    match (&exported.value, value) {
        (VarValue::Scalar(previous), VarValue::Scalar(loaded)) => {
            plan.writes.push(ValueWrite {
                block: Rc::clone(block),
                name: name.clone(),
                index: None,
                value: *loaded,
                previous: *previous,
            });
        }
        (VarValue::Indexed(current), VarValue::Indexed(loaded)) => {
            let keys: &[IndexKey] = if record.indices.is_empty() {
                live_indices
            } else {
                &record.indices
            };
            if keys.len() != loaded.len() {
                return Err(shape_error(format!(
                    "expected {} values, document has {}",
                    keys.len(),
                    loaded.len()
                )));
            }
            let mut seen = HashSet::with_capacity(keys.len());
            for (key, loaded) in keys.iter().zip(loaded) {
                if !seen.insert(key) {
                    return Err(shape_error(format!("repeated index '{key}'")));
                }
                let Some(pos) = live_indices.iter().position(|live| live == key) else {
                    return Err(shape_error(format!("unknown index '{key}'")));
                };
                plan.writes.push(ValueWrite {
                    block: Rc::clone(block),
                    name: name.clone(),
                    index: Some(key.clone()),
                    value: *loaded,
                    previous: current[pos],
                });
            }
        }
        (VarValue::Scalar(_), VarValue::Indexed(_)) => {
            return Err(shape_error("expected a scalar, document has a sequence".to_string()));
        }
        (VarValue::Indexed(_), VarValue::Scalar(_)) => {
            return Err(shape_error("expected a sequence, document has a scalar".to_string()));
        }
    }
    Ok(())
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

fn count_entries(document: &Document) -> usize {
    document.blocks.iter().map(|block| 1 + count_entries(block)).sum()
}

impl std::fmt::Debug for FlowsheetInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowsheetInterface")
            .field("block", &self.block.as_ref().map(|block| block.name().to_string()))
            .field("options", &self.options)
            .field("synchronized", &self.is_synchronized())
            .field("actions", &self.actions)
            .finish()
    }
}
