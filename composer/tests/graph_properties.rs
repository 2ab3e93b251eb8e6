use composer::{App, DependencyGraph, Error, Naming, TagMap};
use proptest::prelude::*;
use serde_json::json;

fn component(index: usize) -> String {
    format!("stack{index}")
}

/// Build an app of `stack_count` stacks where every reference pair becomes
/// an import from the lower-indexed stack into the higher-indexed one
fn compose(stack_count: usize, references: &[(usize, usize)]) -> App {
    let mut app = App::new(Naming::new("cloud-mesh", "test"), TagMap::new());

    for index in 0..stack_count {
        let mut stack = app.begin_stack(&component(index));
        stack
            .output("Token", json!({"Ref": "Resource"}), "reference target")
            .unwrap();

        for &(a, b) in references {
            let (a, b) = (a % stack_count, b % stack_count);
            if a == b {
                continue;
            }
            let (provider, consumer) = (a.min(b), a.max(b));
            if consumer == index {
                stack.import(&app, &component(provider), "Token").unwrap();
            }
        }

        app.add_stack(stack).unwrap();
    }

    app
}

proptest! {
    #[test]
    fn forward_reference_combinations_always_order(
        stack_count in 2usize..8,
        references in prop::collection::vec((0usize..8, 0usize..8), 0..24),
    ) {
        let app = compose(stack_count, &references);

        prop_assert!(app.validate().is_ok());

        let order = app.deploy_order().unwrap();
        prop_assert_eq!(order.len(), stack_count);

        let position = |name: &str| order.iter().position(|o| o == name).unwrap();
        for edge in app.graph().edges() {
            prop_assert!(position(&edge.from) < position(&edge.to));
        }
    }

    #[test]
    fn ordering_is_deterministic_across_compositions(
        stack_count in 2usize..8,
        references in prop::collection::vec((0usize..8, 0usize..8), 0..24),
    ) {
        let first = compose(stack_count, &references);
        let second = compose(stack_count, &references);

        prop_assert_eq!(first.deploy_order().unwrap(), second.deploy_order().unwrap());
    }

    #[test]
    fn rollback_reverses_deploy(
        stack_count in 2usize..8,
        references in prop::collection::vec((0usize..8, 0usize..8), 0..24),
    ) {
        let app = compose(stack_count, &references);

        let mut deploy = app.deploy_order().unwrap();
        deploy.reverse();
        prop_assert_eq!(deploy, app.rollback_order().unwrap());
    }

    #[test]
    fn closing_a_chain_into_a_ring_is_a_cycle_error(chain in 2usize..8) {
        let mut graph = DependencyGraph::new();
        for index in 0..chain - 1 {
            graph.add_edge(&component(index), &component(index + 1), None);
        }
        graph.add_edge(&component(chain - 1), &component(0), None);

        prop_assert!(
            matches!(graph.deploy_order(), Err(Error::DependencyCycle { .. })),
            "expected a dependency cycle error"
        );
    }
}
