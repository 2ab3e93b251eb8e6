use crate::error::Error;
use crate::graph::DependencyGraph;
use crate::naming::{Naming, TagMap};
use crate::reachability::ReachabilityGraph;
use crate::stack::Stack;

/// Root of one deployment composition
///
/// The app owns the naming policy, the shared tag set, every registered
/// stack, and the dependency graph between them. Stacks are composed one at
/// a time: a stack can only import outputs of stacks registered before it,
/// which is what keeps the graph acyclic by construction for straight-line
/// compositions.
#[derive(Clone, Debug)]
pub struct App {
    naming: Naming,
    tags: TagMap,
    stacks: Vec<Stack>,
    graph: DependencyGraph,
}

impl App {
    pub fn new(naming: Naming, tags: TagMap) -> Self {
        App {
            naming,
            tags,
            stacks: Vec::new(),
            graph: DependencyGraph::new(),
        }
    }

    pub fn naming(&self) -> &Naming {
        &self.naming
    }

    /// Start composing a stack for the given component
    ///
    /// The stack is named by the app's naming policy and carries the app's
    /// tag set. It is not part of the app until [`App::add_stack`] accepts
    /// it.
    pub fn begin_stack(&self, component: &str) -> Stack {
        Stack::new(component, &self.naming.name(component), self.tags.clone())
    }

    /// Register a fully composed stack
    ///
    /// Tags are applied exactly once, the stack becomes a graph node, and
    /// every recorded consumption becomes an edge. Consuming a stack the app
    /// has never seen is a composition error.
    pub fn add_stack(&mut self, mut stack: Stack) -> Result<(), Error> {
        if self.stacks.iter().any(|s| s.component() == stack.component()) {
            return Err(Error::DuplicateStack {
                stack: stack.component().to_string(),
            });
        }

        for consumption in stack.consumed() {
            if !self.stacks.iter().any(|s| s.component() == consumption.stack) {
                return Err(Error::UnknownStack {
                    stack: consumption.stack.clone(),
                });
            }
        }

        stack.apply_tags();

        log::info!(
            "stack {} registered with {} resources",
            stack.name(),
            stack.resources().len()
        );

        self.graph.add_node(stack.component());
        for consumption in stack.consumed() {
            self.graph.add_edge(
                &consumption.stack,
                stack.component(),
                consumption.output.as_deref(),
            );
        }

        self.stacks.push(stack);
        Ok(())
    }

    pub fn stack(&self, component: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.component() == component)
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Export name of another stack's output, for `Fn::ImportValue`
    ///
    /// Fails when the providing stack is not registered or does not export
    /// the output, so a dangling import is caught while composing, not at
    /// provisioning time.
    pub fn export_name(&self, component: &str, output: &str) -> Result<String, Error> {
        let stack = self
            .stack(component)
            .ok_or_else(|| Error::MissingOutput {
                stack: component.to_string(),
                output: output.to_string(),
            })?;

        let found = stack
            .outputs()
            .iter()
            .find(|o| o.name == output)
            .ok_or_else(|| Error::MissingOutput {
                stack: component.to_string(),
                output: output.to_string(),
            })?;

        Ok(found.export_name.clone())
    }

    pub fn deploy_order(&self) -> Result<Vec<String>, Error> {
        self.graph.deploy_order()
    }

    pub fn rollback_order(&self) -> Result<Vec<String>, Error> {
        self.graph.rollback_order()
    }

    /// Reachability graph across every registered stack
    pub fn reachability(&self) -> ReachabilityGraph {
        let mut graph = ReachabilityGraph::new();
        for stack in &self.stacks {
            graph.extend(stack.security_groups().iter().cloned());
        }
        graph
    }

    /// Composition-wide validation
    ///
    /// Confirms the dependency graph is acyclic and the reachability graph
    /// passes the structural policy check.
    pub fn validate(&self) -> Result<(), Error> {
        self.deploy_order()?;
        self.reachability().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn app() -> App {
        App::new(Naming::new("cloud-mesh", "dev"), TagMap::new())
    }

    #[test]
    fn stacks_are_named_by_the_app_policy() {
        let app = app();
        let stack = app.begin_stack("network");
        assert_eq!(stack.name(), "cloud-mesh-dev-network");
        assert_eq!(stack.component(), "network");
    }

    #[test]
    fn registering_the_same_component_twice_fails() {
        let mut app = app();
        app.add_stack(app.begin_stack("network")).unwrap();

        match app.add_stack(app.begin_stack("network")) {
            Err(Error::DuplicateStack { stack }) => assert_eq!(stack, "network"),
            other => panic!("expected a duplicate stack error, got {other:?}"),
        }
    }

    #[test]
    fn imports_resolve_to_the_export_name() {
        let mut app = app();
        let mut network = app.begin_stack("network");
        network
            .output("VpcId", json!({"Ref": "Vpc"}), "Network VPC id")
            .unwrap();
        app.add_stack(network).unwrap();

        let mut cluster = app.begin_stack("cluster");
        let value = cluster.import(&app, "network", "VpcId").unwrap();

        assert_eq!(
            value,
            json!({"Fn::ImportValue": "cloud-mesh-dev-network-VpcId"})
        );
    }

    #[test]
    fn importing_a_missing_output_fails_at_composition_time() {
        let mut app = app();
        app.add_stack(app.begin_stack("network")).unwrap();

        let mut cluster = app.begin_stack("cluster");
        match cluster.import(&app, "network", "VpcId") {
            Err(Error::MissingOutput { stack, output }) => {
                assert_eq!(stack, "network");
                assert_eq!(output, "VpcId");
            }
            other => panic!("expected a missing output error, got {other:?}"),
        }
    }

    #[test]
    fn consumption_edges_become_graph_edges() {
        let mut app = app();
        let mut network = app.begin_stack("network");
        network
            .output("VpcId", json!({"Ref": "Vpc"}), "Network VPC id")
            .unwrap();
        app.add_stack(network).unwrap();

        let mut cluster = app.begin_stack("cluster");
        cluster.import(&app, "network", "VpcId").unwrap();
        app.add_stack(cluster).unwrap();

        let order = app.deploy_order().unwrap();
        assert_eq!(order, vec!["network", "cluster"]);
        assert_eq!(app.graph().edges().len(), 1);
    }

    #[test]
    fn depending_on_an_unregistered_stack_fails() {
        let mut app = app();
        let mut cluster = app.begin_stack("cluster");
        cluster.depends_on("network");

        match app.add_stack(cluster) {
            Err(Error::UnknownStack { stack }) => assert_eq!(stack, "network"),
            other => panic!("expected an unknown stack error, got {other:?}"),
        }
    }

    #[test]
    fn validation_covers_dependency_and_reachability_graphs() {
        let mut app = app();
        app.add_stack(app.begin_stack("network")).unwrap();
        assert!(app.validate().is_ok());
    }
}
