use crate::config::Config;
use composer::constructs::{EcsCluster, EcsClusterParams, LogGroup, LogGroupParams};
use composer::{App, Error, Stack};
use serde_json::json;

/// ECS cluster and the shared log group every mesh container writes to
pub fn stack(app: &App, _config: &Config) -> Result<Stack, Error> {
    let mut stack = app.begin_stack("cluster");

    // The cluster resource itself carries no VPC property; the placement
    // happens per service. The ordering edge still belongs here.
    stack.depends_on("network");

    let name = stack.name().to_string();

    let cluster = EcsCluster::new(&mut stack, "Mesh", EcsClusterParams { name: &name })?;
    LogGroup::new(
        &mut stack,
        "Cluster",
        LogGroupParams {
            name: &name,
            retention_days: None,
        },
    )?;

    stack.output("ClusterName", json!(name), "ECS cluster name")?;
    stack.output(
        "ClusterArn",
        cluster.handle().att("Arn"),
        "ECS cluster ARN",
    )?;
    stack.output(
        "LogGroupName",
        json!(name),
        "Shared log group for mesh containers",
    )?;

    Ok(stack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use composer::stack::Consumption;
    use composer::{Naming, TagMap};

    #[test]
    fn the_cluster_waits_for_the_network() {
        let app = App::new(Naming::new("cloud-mesh", "dev"), TagMap::new());
        let stack = stack(&app, &Config::default()).unwrap();

        assert_eq!(
            stack.consumed(),
            &[Consumption {
                stack: "network".to_string(),
                output: None
            }]
        );
        assert!(stack.resource("ClusterMesh").is_some());
        assert!(stack.resource("LogGroupCluster").is_some());
        assert!(stack.has_output("ClusterArn"));
    }
}
