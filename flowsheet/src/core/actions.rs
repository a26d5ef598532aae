//! Named actions with dependency edges and late-bound behavior.
//!
//! Registration is two-phase: [`ActionGraph::add_action_type`] declares the
//! node and its edges, [`ActionGraph::set_action`] binds what it does.
//! Dependencies must already be registered, so registration order is always
//! a valid topological order and the graph can never contain a cycle.

use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Keyword arguments bound to an action.
pub type Kwargs = Map<String, Value>;

pub type ActionFn = Rc<dyn Fn(&Kwargs) -> anyhow::Result<()>>;

/// Standard workflow action names.
pub mod workflow {
    pub const BUILD: &str = "build";
    pub const SOLVE: &str = "solve";
}

struct ActionNode {
    dependencies: Vec<String>,
    action: Option<ActionFn>,
    kwargs: Kwargs,
}

#[derive(Default)]
pub struct ActionGraph {
    nodes: IndexMap<String, ActionNode>,
}

impl ActionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph pre-populated with `build` and `solve` (which depends on `build`).
    pub fn workflow() -> Self {
        let mut graph = Self::new();
        for (name, dependencies) in [(workflow::BUILD, vec![]), (workflow::SOLVE, vec![workflow::BUILD])] {
            graph.nodes.insert(
                name.to_string(),
                ActionNode {
                    dependencies: dependencies.into_iter().map(str::to_string).collect(),
                    action: None,
                    kwargs: Kwargs::new(),
                },
            );
        }
        graph
    }

    /// Register a new action type.
    ///
    /// Re-registering an existing name is rejected, never replaced.
    pub fn add_action_type(&mut self, name: &str, dependencies: &[&str]) -> Result<()> {
        if dependencies.contains(&name) {
            return Err(Error::SelfDependency(name.to_string()));
        }
        if self.nodes.contains_key(name) {
            return Err(Error::DuplicateAction(name.to_string()));
        }
        if let Some(unknown) = dependencies.iter().find(|dep| !self.nodes.contains_key(**dep)) {
            return Err(Error::UnknownDependency {
                action: name.to_string(),
                dependency: unknown.to_string(),
            });
        }

        let mut deps: Vec<String> = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            if !deps.iter().any(|existing| existing == *dep) {
                deps.push(dep.to_string());
            }
        }
        debug!(action = name, dependencies = ?deps, "action type registered");
        self.nodes.insert(
            name.to_string(),
            ActionNode {
                dependencies: deps,
                action: None,
                kwargs: Kwargs::new(),
            },
        );
        Ok(())
    }

    /// Bind (or rebind) the behavior of a registered action.
    pub fn set_action<F>(&mut self, name: &str, action: F, kwargs: Kwargs) -> Result<()>
    where
        F: Fn(&Kwargs) -> anyhow::Result<()> + 'static,
    {
        let node = self.node_mut(name)?;
        node.action = Some(Rc::new(action));
        node.kwargs = kwargs;
        debug!(action = name, "action bound");
        Ok(())
    }

    /// Detach the behavior of an action; the node stays as a placeholder.
    pub fn clear_action(&mut self, name: &str) -> Result<()> {
        let node = self.node_mut(name)?;
        node.action = None;
        node.kwargs.clear();
        Ok(())
    }

    pub fn get_action(&self, name: &str) -> Result<(Option<ActionFn>, &Kwargs)> {
        let node = self.node(name)?;
        Ok((node.action.clone(), &node.kwargs))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn dependencies(&self, name: &str) -> Result<&[String]> {
        Ok(&self.node(name)?.dependencies)
    }

    /// Transitive dependencies of `name` followed by `name` itself.
    ///
    /// Ties are broken by registration order.
    pub fn execution_order(&self, name: &str) -> Result<Vec<&str>> {
        self.node(name)?;

        let mut needed: HashSet<&str> = HashSet::new();
        let mut stack = vec![name];
        while let Some(current) = stack.pop() {
            if !needed.insert(current) {
                continue;
            }
            let node = self.node(current)?;
            stack.extend(node.dependencies.iter().map(String::as_str));
        }

        Ok(self
            .nodes
            .keys()
            .map(String::as_str)
            .filter(|key| needed.contains(key))
            .collect())
    }

    /// Run `name` after all of its dependencies, each exactly once.
    ///
    /// The first failing action aborts the run.
    pub fn run_action(&self, name: &str) -> Result<()> {
        let order = self.execution_order(name)?;
        info!(action = name, steps = order.len(), "running action");
        for step in order {
            let node = self.node(step)?;
            let Some(action) = &node.action else {
                debug!(action = step, "no behavior bound, skipping");
                continue;
            };
            debug!(action = step, "executing");
            action(&node.kwargs).map_err(|source| Error::Action {
                name: step.to_string(),
                source,
            })?;
        }
        Ok(())
    }

    fn node(&self, name: &str) -> Result<&ActionNode> {
        self.nodes
            .get(name)
            .ok_or_else(|| Error::UnknownAction(name.to_string()))
    }

    fn node_mut(&mut self, name: &str) -> Result<&mut ActionNode> {
        self.nodes
            .get_mut(name)
            .ok_or_else(|| Error::UnknownAction(name.to_string()))
    }
}

impl std::fmt::Debug for ActionGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.nodes
                    .iter()
                    .map(|(name, node)| (name, &node.dependencies)),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<String>>>;

    fn recorder(log: &Log, label: &'static str) -> impl Fn(&Kwargs) -> anyhow::Result<()> + 'static {
        let log = Rc::clone(log);
        move |kwargs: &Kwargs| {
            let suffix = kwargs
                .get("dish")
                .and_then(Value::as_str)
                .map(|dish| format!("({dish})"))
                .unwrap_or_default();
            log.borrow_mut().push(format!("{label}{suffix}"));
            Ok(())
        }
    }

    fn kwargs(value: Value) -> Kwargs {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn dependencies_run_first_with_bound_kwargs() {
        let log: Log = Rc::default();
        let mut graph = ActionGraph::new();
        graph.add_action_type("cook", &[]).expect("cook");
        graph.add_action_type("eat", &["cook"]).expect("eat");
        graph
            .set_action("cook", recorder(&log, "cook"), kwargs(json!({"dish": "mac&cheese"})))
            .expect("bind cook");
        graph
            .set_action("eat", recorder(&log, "eat"), Kwargs::new())
            .expect("bind eat");

        let (action, bound) = graph.get_action("cook").expect("get");
        assert!(action.is_some());
        assert_eq!(bound.get("dish"), Some(&json!("mac&cheese")));
        let (_, bound) = graph.get_action("eat").expect("get");
        assert!(bound.is_empty());

        graph.run_action("eat").expect("run");
        assert_eq!(*log.borrow(), vec!["cook(mac&cheese)", "eat"]);
    }

    #[test]
    fn get_action_returns_the_bound_callable() {
        let mut graph = ActionGraph::new();
        graph.add_action_type("a", &[]).expect("a");
        let (action, _) = graph.get_action("a").expect("get");
        assert!(action.is_none());

        graph.set_action("a", |_| Ok(()), Kwargs::new()).expect("bind");
        let (first, _) = graph.get_action("a").expect("get");
        let (second, _) = graph.get_action("a").expect("get");
        assert!(Rc::ptr_eq(&first.expect("first"), &second.expect("second")));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let mut graph = ActionGraph::new();
        let err = graph
            .add_action_type("go-inside", &["open-door"])
            .expect_err("unknown dep");
        assert!(matches!(err, Error::UnknownDependency { .. }));
        assert_eq!(err.kind(), ErrorKind::Dependency);
        assert!(!graph.contains("go-inside"));
    }

    #[test]
    fn self_dependency_is_rejected() {
        let mut graph = ActionGraph::new();
        let err = graph.add_action_type("a1", &["a1"]).expect_err("self dep");
        assert!(matches!(err, Error::SelfDependency(_)));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut graph = ActionGraph::new();
        graph.add_action_type("a", &[]).expect("a");
        let err = graph.add_action_type("a", &[]).expect_err("duplicate");
        assert!(matches!(err, Error::DuplicateAction(_)));
        assert_eq!(graph.names().count(), 1);
    }

    #[test]
    fn set_action_requires_registration() {
        let mut graph = ActionGraph::new();
        let err = graph
            .set_action("ghost", |_| Ok(()), Kwargs::new())
            .expect_err("unregistered");
        assert_eq!(err.kind(), ErrorKind::Lookup);
        assert!(matches!(graph.run_action("ghost"), Err(Error::UnknownAction(_))));
    }

    #[test]
    fn diamond_runs_each_action_once() {
        let log: Log = Rc::default();
        let mut graph = ActionGraph::new();
        for (name, deps) in [
            ("base", vec![]),
            ("left", vec!["base"]),
            ("right", vec!["base"]),
            ("top", vec!["right", "left"]),
            ("unrelated", vec![]),
        ] {
            graph.add_action_type(name, &deps).expect("register");
            graph
                .set_action(name, recorder(&log, name), Kwargs::new())
                .expect("bind");
        }

        assert_eq!(
            graph.execution_order("top").expect("order"),
            vec!["base", "left", "right", "top"]
        );
        graph.run_action("top").expect("run");
        graph.run_action("left").expect("run again");
        assert_eq!(
            *log.borrow(),
            vec!["base", "left", "right", "top", "base", "left"]
        );
    }

    #[test]
    fn placeholder_nodes_are_no_ops() {
        let log: Log = Rc::default();
        let mut graph = ActionGraph::new();
        graph.add_action_type("group", &[]).expect("group");
        graph.add_action_type("leaf", &["group"]).expect("leaf");
        graph
            .set_action("leaf", recorder(&log, "leaf"), Kwargs::new())
            .expect("bind");
        graph.run_action("leaf").expect("run");
        assert_eq!(*log.borrow(), vec!["leaf"]);
    }

    #[test]
    fn failure_aborts_remaining_chain_and_is_not_memoized() {
        let log: Log = Rc::default();
        let attempts = Rc::new(RefCell::new(0));
        let mut graph = ActionGraph::new();
        graph.add_action_type("prep", &[]).expect("prep");
        graph.add_action_type("serve", &["prep"]).expect("serve");

        let counter = Rc::clone(&attempts);
        graph
            .set_action(
                "prep",
                move |_| {
                    *counter.borrow_mut() += 1;
                    anyhow::bail!("out of ingredients")
                },
                Kwargs::new(),
            )
            .expect("bind prep");
        graph
            .set_action("serve", recorder(&log, "serve"), Kwargs::new())
            .expect("bind serve");

        let err = graph.run_action("serve").expect_err("fails");
        assert_eq!(err.kind(), ErrorKind::Action);
        assert!(matches!(&err, Error::Action { name, .. } if name == "prep"));
        assert_eq!(
            err.into_action_source().expect("source").to_string(),
            "out of ingredients"
        );
        assert!(log.borrow().is_empty());

        graph.run_action("serve").expect_err("fails again");
        assert_eq!(*attempts.borrow(), 2);
    }

    #[test]
    fn clear_action_turns_node_into_placeholder() {
        let mut graph = ActionGraph::new();
        graph.add_action_type("a", &[]).expect("a");
        graph
            .set_action("a", |_| anyhow::bail!("boom"), kwargs(json!({"k": 1})))
            .expect("bind");
        graph.clear_action("a").expect("clear");
        graph.run_action("a").expect("no-op");
        let (action, bound) = graph.get_action("a").expect("get");
        assert!(action.is_none());
        assert!(bound.is_empty());
    }
}
