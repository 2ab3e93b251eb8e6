use crate::construct::{escape_logical_id, CfnResource, Handle};
use crate::error::Error;
use crate::stack::Stack;
use serde_json::{json, Map, Value};

pub struct CustomResourceParams<'a> {
    /// ARN token of the handler function
    pub service_token: Value,
    /// Property bag handed to the handler on every lifecycle event
    pub properties: Vec<(&'a str, Value)>,
    /// Logical ids this resource must wait for, beyond data dependencies
    pub depends_on: Vec<&'a str>,
}

/// Custom resource backed by a handler function
///
/// The property bag is what the handler diffs between deployments; bumping
/// any value (conventionally `Version`) re-triggers it. `depends_on` is for
/// ordering the provider cannot infer, like waiting for a database cluster
/// the handler connects to.
pub struct CustomResource {
    handle: Handle,
}

impl CustomResource {
    pub fn new(stack: &mut Stack, id: &str, params: CustomResourceParams<'_>) -> Result<Self, Error> {
        let mut properties = Map::new();
        properties.insert("ServiceToken".to_string(), params.service_token);

        for (key, value) in params.properties {
            if key.is_empty() {
                return Err(Error::invalid(id, "property names must not be empty"));
            }
            if properties.insert(key.to_string(), value).is_some() {
                return Err(Error::invalid(id, &format!("duplicate property \"{key}\"")));
            }
        }

        let mut resource = json!({
            "Type": format!("Custom::{}", escape_logical_id(id)),
            "Properties": properties
        });

        if !params.depends_on.is_empty() {
            resource["DependsOn"] = json!(params.depends_on);
        }

        let handle = stack.add_resource(CfnResource {
            name: format!("CustomResource{}", escape_logical_id(id)),
            resource,
        })?;

        Ok(CustomResource { handle })
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
    fn the_bag_and_ordering_hints_are_synthesized() {
        let mut stack = Stack::new("database", "cloud-mesh-dev-database", TagMap::new());
        let resource = CustomResource::new(
            &mut stack,
            "DbInit",
            CustomResourceParams {
                service_token: json!({"Fn::GetAtt": ["FunctionDbInit", "Arn"]}),
                properties: vec![
                    ("DbSecretArn", json!({"Ref": "SecretMeshMaster"})),
                    ("Version", json!("1.0.0")),
                ],
                depends_on: vec!["DbClusterMesh"],
            },
        )
        .unwrap();

        let body = stack.resource(resource.handle().logical_id()).unwrap();
        assert_eq!(body["Type"], "Custom::DbInit");
        assert_eq!(body["DependsOn"], json!(["DbClusterMesh"]));
        assert_eq!(body["Properties"]["Version"], "1.0.0");
        assert!(body["Properties"].get("ServiceToken").is_some());
    }

    #[test]
    fn duplicate_properties_are_rejected() {
        let mut stack = Stack::new("database", "cloud-mesh-dev-database", TagMap::new());
        let result = CustomResource::new(
            &mut stack,
            "DbInit",
            CustomResourceParams {
                service_token: json!({"Fn::GetAtt": ["FunctionDbInit", "Arn"]}),
                properties: vec![("Version", json!("1.0.0")), ("Version", json!("2.0.0"))],
                depends_on: Vec::new(),
            },
        );

        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }
}
