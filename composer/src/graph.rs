use crate::error::Error;
use std::collections::BTreeSet;

/// One "consumes output of" relation between two stacks
///
/// `output` is `None` for ordering-only dependencies that carry no data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub output: Option<String>,
}

/// Explicit provisioning-order graph over stacks
///
/// Nodes are stack components, edges point from the provider to the
/// consumer. The graph is the single source of truth for deploy and
/// rollback order; it never infers anything from construction side effects.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    edges: Vec<Edge>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph::default()
    }

    pub fn add_node(&mut self, node: &str) {
        if !self.nodes.iter().any(|n| n == node) {
            self.nodes.push(node.to_string());
        }
    }

    pub fn add_edge(&mut self, from: &str, to: &str, output: Option<&str>) {
        self.add_node(from);
        self.add_node(to);

        let edge = Edge {
            from: from.to_string(),
            to: to.to_string(),
            output: output.map(|o| o.to_string()),
        };

        if !self.edges.contains(&edge) {
            log::debug!(
                "dependency edge {from} -> {to}{}",
                edge.output
                    .as_deref()
                    .map(|o| format!(" ({o})"))
                    .unwrap_or_default()
            );
            self.edges.push(edge);
        }
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges arriving at a consumer stack
    pub fn dependencies_of(&self, node: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.to == node).collect()
    }

    /// Provisioning order: every stack appears after all of its providers
    ///
    /// The sort is stable with respect to node insertion order, so composing
    /// the same app twice yields the same order. A cycle is a specification
    /// error and aborts composition.
    pub fn deploy_order(&self) -> Result<Vec<String>, Error> {
        let mut placed: BTreeSet<&str> = BTreeSet::new();
        let mut order = Vec::with_capacity(self.nodes.len());

        while order.len() < self.nodes.len() {
            let mut progressed = false;

            for node in &self.nodes {
                if placed.contains(node.as_str()) {
                    continue;
                }

                let ready = self
                    .edges
                    .iter()
                    .filter(|e| e.to == *node)
                    .all(|e| placed.contains(e.from.as_str()));

                if ready {
                    placed.insert(node);
                    order.push(node.clone());
                    progressed = true;
                }
            }

            if !progressed {
                let stuck = self
                    .nodes
                    .iter()
                    .filter(|n| !placed.contains(n.as_str()))
                    .cloned()
                    .collect();

                return Err(Error::DependencyCycle { stacks: stuck });
            }
        }

        Ok(order)
    }

    /// Rollback happens in reverse construction order
    pub fn rollback_order(&self) -> Result<Vec<String>, Error> {
        let mut order = self.deploy_order()?;
        order.reverse();
        Ok(order)
    }
}
