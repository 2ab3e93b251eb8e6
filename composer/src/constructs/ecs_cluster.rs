use crate::construct::{escape_logical_id, CfnResource, Handle};
use crate::error::Error;
use crate::stack::Stack;
use serde_json::json;

pub struct EcsClusterParams<'a> {
    pub name: &'a str,
}

/// ECS cluster with Fargate capacity providers and container insights
pub struct EcsCluster {
    handle: Handle,
}

impl EcsCluster {
    pub fn new(stack: &mut Stack, id: &str, params: EcsClusterParams<'_>) -> Result<Self, Error> {
        if params.name.is_empty() {
            return Err(Error::invalid(id, "cluster name must not be empty"));
        }

        let handle = stack.add_resource(CfnResource {
            name: format!("Cluster{}", escape_logical_id(id)),
            resource: json!({
                "Type": "AWS::ECS::Cluster",
                "Properties": {
                    "ClusterName": params.name,
                    "CapacityProviders": ["FARGATE", "FARGATE_SPOT"],
                    "ClusterSettings": [{
                        "Name": "containerInsights",
                        "Value": "enhanced"
                    }]
                }
            }),
        })?;

        Ok(EcsCluster { handle })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::TagMap;

    #[test]
    fn fargate_and_insights_are_always_on() {
        let mut stack = Stack::new("cluster", "cloud-mesh-dev-cluster", TagMap::new());
        let cluster = EcsCluster::new(
            &mut stack,
            "Mesh",
            EcsClusterParams {
                name: "cloud-mesh-dev-cluster",
            },
        )
        .unwrap();

        let props = &stack.resource(cluster.handle().logical_id()).unwrap()["Properties"];
        assert_eq!(props["CapacityProviders"], json!(["FARGATE", "FARGATE_SPOT"]));
        assert_eq!(props["ClusterSettings"][0]["Value"], "enhanced");
    }
}
