use crate::app::App;
use crate::construct::{CfnResource, Handle};
use crate::error::Error;
use crate::naming::TagMap;
use crate::reachability::GroupNode;
use serde_json::{json, Map, Value};

/// Typed handle exported for consumption by other stacks
#[derive(Clone, Debug)]
pub struct Output {
    pub name: String,
    pub value: Value,
    pub description: String,
    pub export_name: String,
}

/// Record of one cross-stack reference
///
/// `output` is `None` when the dependency carries no data and exists for
/// ordering only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Consumption {
    pub stack: String,
    pub output: Option<String>,
}

/// Independently deployable unit of resource constructs
///
/// A stack is mutated only while it is being composed; once registered with
/// the [`App`] it is read-only. Constructs insert resources under unique
/// logical ids, outputs are exported as `{StackName}-{OutputName}`, and every
/// cross-stack reference goes through [`Stack::import`] so the dependency
/// graph stays complete.
#[derive(Clone, Debug)]
pub struct Stack {
    component: String,
    name: String,
    resources: Vec<CfnResource>,
    outputs: Vec<Output>,
    consumed: Vec<Consumption>,
    security_groups: Vec<GroupNode>,
    tags: TagMap,
}

impl Stack {
    pub(crate) fn new(component: &str, name: &str, tags: TagMap) -> Self {
        Stack {
            component: component.to_string(),
            name: name.to_string(),
            resources: Vec::new(),
            outputs: Vec::new(),
            consumed: Vec::new(),
            security_groups: Vec::new(),
            tags,
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a synthesized resource under its logical id
    ///
    /// Double instantiation of the same id within one stack is a
    /// specification error, not a runtime retry case.
    pub fn add_resource(&mut self, resource: CfnResource) -> Result<Handle, Error> {
        if self.resources.iter().any(|r| r.name == resource.name) {
            return Err(Error::DuplicateId {
                stack: self.name.clone(),
                id: resource.name,
            });
        }

        let handle = Handle::new(&resource.name);
        self.resources.push(resource);
        Ok(handle)
    }

    pub fn resources(&self) -> &[CfnResource] {
        &self.resources
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Value> {
        self.resources
            .iter()
            .find(|r| r.name == logical_id)
            .map(|r| &r.resource)
    }

    pub(crate) fn resource_mut(&mut self, logical_id: &str) -> Option<&mut Value> {
        self.resources
            .iter_mut()
            .find(|r| r.name == logical_id)
            .map(|r| &mut r.resource)
    }

    /// Export a value under `{StackName}-{OutputName}`
    pub fn output(&mut self, name: &str, value: Value, description: &str) -> Result<(), Error> {
        if self.outputs.iter().any(|o| o.name == name) {
            return Err(Error::DuplicateOutput {
                stack: self.name.clone(),
                output: name.to_string(),
            });
        }

        self.outputs.push(Output {
            name: name.to_string(),
            value,
            description: description.to_string(),
            export_name: format!("{}-{}", self.name, name),
        });

        Ok(())
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o.name == name)
    }

    /// Consume another stack's output
    ///
    /// The sole channel for cross-stack references: it fails when the owning
    /// stack has not been registered yet (or lacks the output), and it
    /// records the dependency edge the deploy order is derived from.
    pub fn import(&mut self, app: &App, stack: &str, output: &str) -> Result<Value, Error> {
        let export_name = app.export_name(stack, output)?;

        let consumption = Consumption {
            stack: stack.to_string(),
            output: Some(output.to_string()),
        };

        if !self.consumed.contains(&consumption) {
            self.consumed.push(consumption);
        }

        Ok(json!({ "Fn::ImportValue": export_name }))
    }

    /// Declare an ordering-only dependency on another stack
    ///
    /// Used where provisioning must wait on a stack whose data is not
    /// consumed directly.
    pub fn depends_on(&mut self, stack: &str) {
        let consumption = Consumption {
            stack: stack.to_string(),
            output: None,
        };

        if !self.consumed.contains(&consumption) {
            self.consumed.push(consumption);
        }
    }

    pub fn consumed(&self) -> &[Consumption] {
        &self.consumed
    }

    pub(crate) fn record_security_group(&mut self, node: GroupNode) {
        self.security_groups.push(node);
    }

    pub(crate) fn security_group_mut(&mut self, name: &str) -> Option<&mut GroupNode> {
        self.security_groups.iter_mut().find(|n| n.name == name)
    }

    pub fn security_groups(&self) -> &[GroupNode] {
        &self.security_groups
    }

    /// Apply the stack's tag set to every resource that takes properties
    ///
    /// Runs once after all constructs exist; keys that are already present
    /// are left alone, so re-application with the same map changes nothing.
    pub(crate) fn apply_tags(&mut self) {
        if self.tags.is_empty() {
            return;
        }

        for resource in &mut self.resources {
            let Some(properties) = resource
                .resource
                .get_mut("Properties")
                .and_then(Value::as_object_mut)
            else {
                continue;
            };

            let tags = properties
                .entry("Tags")
                .or_insert_with(|| Value::Array(Vec::new()));

            let Some(tags) = tags.as_array_mut() else {
                continue;
            };

            for (key, value) in self.tags.iter() {
                let present = tags
                    .iter()
                    .any(|t| t.get("Key").and_then(Value::as_str) == Some(key.as_str()));

                if !present {
                    tags.push(json!({ "Key": key, "Value": value }));
                }
            }
        }
    }

    /// Full stack template, resources and exported outputs
    pub fn template(&self) -> Value {
        let mut resources = Map::new();
        for resource in &self.resources {
            resources.insert(resource.name.clone(), resource.resource.clone());
        }

        let mut outputs = Map::new();
        for output in &self.outputs {
            outputs.insert(
                output.name.clone(),
                json!({
                    "Value": output.value,
                    "Description": output.description,
                    "Export": { "Name": output.export_name }
                }),
            );
        }

        json!({ "Resources": resources, "Outputs": outputs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> Stack {
        Stack::new("network", "cloud-mesh-dev-network", TagMap::new())
    }

    fn resource(name: &str) -> CfnResource {
        CfnResource {
            name: name.to_string(),
            resource: json!({ "Type": "AWS::EC2::VPC", "Properties": {} }),
        }
    }

    #[test]
    fn duplicate_logical_ids_fail_fast() {
        let mut stack = stack();
        stack.add_resource(resource("Vpc")).unwrap();

        match stack.add_resource(resource("Vpc")) {
            Err(Error::DuplicateId { stack, id }) => {
                assert_eq!(stack, "cloud-mesh-dev-network");
                assert_eq!(id, "Vpc");
            }
            other => panic!("expected a duplicate id error, got {other:?}"),
        }
    }

    #[test]
    fn outputs_export_under_the_stack_name() {
        let mut stack = stack();
        stack
            .output("VpcId", json!({"Ref": "Vpc"}), "Network VPC id")
            .unwrap();

        assert_eq!(
            stack.outputs()[0].export_name,
            "cloud-mesh-dev-network-VpcId"
        );
        assert!(stack.output("VpcId", json!("x"), "again").is_err());
    }

    #[test]
    fn tags_apply_exactly_once() {
        let mut stack = Stack::new(
            "network",
            "cloud-mesh-dev-network",
            TagMap::new().with("Project", "cloud-mesh"),
        );
        stack.add_resource(resource("Vpc")).unwrap();

        stack.apply_tags();
        stack.apply_tags();

        let tags = stack.resource("Vpc").unwrap()["Properties"]["Tags"]
            .as_array()
            .unwrap()
            .clone();

        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0], json!({ "Key": "Project", "Value": "cloud-mesh" }));
    }

    #[test]
    fn ordering_only_dependencies_are_recorded_without_an_output() {
        let mut stack = stack();
        stack.depends_on("cluster");

        assert_eq!(
            stack.consumed(),
            &[Consumption {
                stack: "cluster".to_string(),
                output: None
            }]
        );
    }
}
