//! core::graph
//!
//! The step dependency graph.
//!
//! # Architecture
//!
//! The step graph is a DAG where:
//! - Nodes are compiled steps, keyed by [`StepId`]
//! - Edges are implied by each step's `depends_on` list
//!
//! # Invariants
//!
//! - Step ids are unique within a graph
//! - Every dependency id resolves to a step in the same graph
//! - The graph is acyclic
//! - Topological order is deterministic: among otherwise equal nodes,
//!   the lexicographically smaller id comes first
//!
//! Uniqueness and self-references are enforced at insert time; dependency
//! resolution and cycle detection require the whole graph and run in
//! [`StepGraph::finalize`].

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use thiserror::Error;

use super::step::Step;
use super::types::StepId;

/// Errors from graph construction and validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// A step with the same id was already inserted.
    #[error("duplicate step id: {0}")]
    DuplicateStep(StepId),

    /// A step depends on itself.
    #[error("step {0} depends on itself")]
    SelfDependency(StepId),

    /// A dependency id does not resolve to any step in the graph.
    #[error("step {step} depends on missing step {dependency}")]
    MissingDependency {
        /// The step declaring the dependency.
        step: StepId,
        /// The id that failed to resolve.
        dependency: StepId,
    },

    /// The dependency edges form a cycle.
    #[error("dependency cycle detected: {0}")]
    CycleDetected(String),
}

/// A typed DAG of steps with deterministic topological traversal.
///
/// Steps are uniquely owned by the graph; plans and the executor hold
/// id copies and borrow steps back through [`StepGraph::get`].
#[derive(Default)]
pub struct StepGraph {
    steps: BTreeMap<StepId, Box<dyn Step>>,
}

impl StepGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of steps in the graph.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the graph contains no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Insert a step.
    ///
    /// # Errors
    ///
    /// - [`GraphError::DuplicateStep`] if the id is already present
    /// - [`GraphError::SelfDependency`] if the step depends on itself
    pub fn insert(&mut self, step: Box<dyn Step>) -> Result<(), GraphError> {
        let id = step.id();
        if step.depends_on().contains(&id) {
            return Err(GraphError::SelfDependency(id));
        }
        if self.steps.contains_key(&id) {
            return Err(GraphError::DuplicateStep(id));
        }
        self.steps.insert(id, step);
        Ok(())
    }

    /// Look up a step by id.
    pub fn get(&self, id: &StepId) -> Option<&dyn Step> {
        self.steps.get(id).map(|s| s.as_ref())
    }

    /// Iterate steps in lexicographic id order.
    pub fn steps(&self) -> impl Iterator<Item = &dyn Step> {
        self.steps.values().map(|s| s.as_ref())
    }

    /// Iterate step ids in lexicographic order.
    pub fn ids(&self) -> impl Iterator<Item = &StepId> {
        self.steps.keys()
    }

    /// Declared dependencies of a step, or empty if the id is unknown.
    pub fn dependencies(&self, id: &StepId) -> Vec<StepId> {
        self.get(id).map(|s| s.depends_on()).unwrap_or_default()
    }

    /// Validate the whole graph: every dependency resolves and the edges
    /// are acyclic.
    pub fn finalize(&self) -> Result<(), GraphError> {
        for (id, step) in &self.steps {
            for dep in step.depends_on() {
                if !self.steps.contains_key(&dep) {
                    return Err(GraphError::MissingDependency {
                        step: id.clone(),
                        dependency: dep,
                    });
                }
            }
        }
        // Kahn's algorithm doubles as cycle detection: nodes left over
        // after the ready set drains are on a cycle.
        self.topological_order().map(|_| ())
    }

    /// Compute the deterministic topological order of all step ids.
    ///
    /// Kahn's algorithm over a sorted ready set: among ready nodes the
    /// lexicographically smallest id is emitted first, so identical
    /// graphs always produce identical orderings.
    ///
    /// # Errors
    ///
    /// - [`GraphError::MissingDependency`] if an edge does not resolve
    /// - [`GraphError::CycleDetected`] if the edges form a cycle; the
    ///   message lists the ids left on the cycle
    pub fn topological_order(&self) -> Result<Vec<StepId>, GraphError> {
        let mut in_degree: BTreeMap<&StepId, usize> =
            self.steps.keys().map(|id| (id, 0)).collect();
        let mut dependents: BTreeMap<&StepId, Vec<&StepId>> = BTreeMap::new();

        for (id, step) in &self.steps {
            for dep in step.depends_on() {
                let Some((dep_key, _)) = self.steps.get_key_value(&dep) else {
                    return Err(GraphError::MissingDependency {
                        step: id.clone(),
                        dependency: dep,
                    });
                };
                *in_degree.get_mut(id).expect("id present") += 1;
                dependents.entry(dep_key).or_default().push(id);
            }
        }

        let mut ready: BTreeSet<&StepId> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.steps.len());

        while let Some(next) = ready.iter().next().copied() {
            ready.remove(next);
            order.push(next.clone());
            if let Some(children) = dependents.get(next) {
                for child in children {
                    let degree = in_degree.get_mut(*child).expect("child present");
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(*child);
                    }
                }
            }
        }

        if order.len() != self.steps.len() {
            let remaining: Vec<String> = in_degree
                .iter()
                .filter(|(_, d)| **d > 0)
                .map(|(id, _)| id.to_string())
                .collect();
            return Err(GraphError::CycleDetected(remaining.join(", ")));
        }

        Ok(order)
    }
}

impl std::fmt::Debug for StepGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepGraph")
            .field("steps", &self.steps.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::mock::MockStep;

    fn graph_of(steps: Vec<MockStep>) -> StepGraph {
        let mut graph = StepGraph::new();
        for step in steps {
            graph.insert(Box::new(step)).expect("insert");
        }
        graph
    }

    #[test]
    fn empty_graph_finalizes() {
        let graph = StepGraph::new();
        assert!(graph.is_empty());
        assert!(graph.finalize().is_ok());
        assert!(graph.topological_order().unwrap().is_empty());
    }

    #[test]
    fn insert_rejects_duplicate() {
        let mut graph = StepGraph::new();
        graph
            .insert(Box::new(MockStep::satisfied("mock:a")))
            .unwrap();
        let err = graph
            .insert(Box::new(MockStep::satisfied("mock:a")))
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateStep(_)));
    }

    #[test]
    fn insert_rejects_self_dependency() {
        let mut graph = StepGraph::new();
        let step = MockStep::satisfied("mock:a").depends_on(&["mock:a"]);
        let err = graph.insert(Box::new(step)).unwrap_err();
        assert!(matches!(err, GraphError::SelfDependency(_)));
    }

    #[test]
    fn finalize_rejects_missing_dependency() {
        let graph = graph_of(vec![MockStep::satisfied("mock:a").depends_on(&["mock:gone"])]);
        let err = graph.finalize().unwrap_err();
        assert!(matches!(err, GraphError::MissingDependency { .. }));
    }

    #[test]
    fn finalize_rejects_cycle() {
        let graph = graph_of(vec![
            MockStep::satisfied("mock:a").depends_on(&["mock:b"]),
            MockStep::satisfied("mock:b").depends_on(&["mock:a"]),
        ]);
        let err = graph.finalize().unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected(_)));
    }

    #[test]
    fn topological_order_respects_dependencies() {
        let graph = graph_of(vec![
            MockStep::satisfied("mock:c").depends_on(&["mock:a"]),
            MockStep::satisfied("mock:a"),
            MockStep::satisfied("mock:b").depends_on(&["mock:a"]),
        ]);
        let order = graph.topological_order().unwrap();
        let strings: Vec<&str> = order.iter().map(|id| id.as_str()).collect();
        assert_eq!(strings, vec!["mock:a", "mock:b", "mock:c"]);
    }

    #[test]
    fn siblings_order_lexicographically() {
        let graph = graph_of(vec![
            MockStep::satisfied("mock:z"),
            MockStep::satisfied("mock:m"),
            MockStep::satisfied("mock:a"),
        ]);
        let order = graph.topological_order().unwrap();
        let strings: Vec<&str> = order.iter().map(|id| id.as_str()).collect();
        assert_eq!(strings, vec!["mock:a", "mock:m", "mock:z"]);
    }

    #[test]
    fn order_is_stable_across_calls() {
        let graph = graph_of(vec![
            MockStep::satisfied("mock:b").depends_on(&["mock:a"]),
            MockStep::satisfied("mock:a"),
            MockStep::satisfied("mock:d").depends_on(&["mock:a"]),
            MockStep::satisfied("mock:c").depends_on(&["mock:b"]),
        ]);
        let first = graph.topological_order().unwrap();
        let second = graph.topological_order().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn diamond_orders_deterministically() {
        // a -> {b, c} -> d
        let graph = graph_of(vec![
            MockStep::satisfied("mock:d").depends_on(&["mock:b", "mock:c"]),
            MockStep::satisfied("mock:b").depends_on(&["mock:a"]),
            MockStep::satisfied("mock:c").depends_on(&["mock:a"]),
            MockStep::satisfied("mock:a"),
        ]);
        let order = graph.topological_order().unwrap();
        let strings: Vec<&str> = order.iter().map(|id| id.as_str()).collect();
        assert_eq!(strings, vec!["mock:a", "mock:b", "mock:c", "mock:d"]);
    }

    #[test]
    fn dependencies_accessor() {
        let graph = graph_of(vec![
            MockStep::satisfied("mock:b").depends_on(&["mock:a"]),
            MockStep::satisfied("mock:a"),
        ]);
        let deps = graph.dependencies(&StepId::parse("mock:b").unwrap());
        assert_eq!(deps, vec![StepId::parse("mock:a").unwrap()]);
        assert!(graph
            .dependencies(&StepId::parse("mock:gone").unwrap())
            .is_empty());
    }
}
