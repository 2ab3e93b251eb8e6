use crate::construct::{escape_logical_id, CfnResource, Handle};
use crate::error::Error;
use crate::stack::Stack;
use serde_json::json;

pub struct LogGroupParams<'a> {
    pub name: &'a str,
    pub retention_days: Option<u32>,
}

/// CloudWatch log group with a short default retention
pub struct LogGroup {
    handle: Handle,
}

impl LogGroup {
    pub fn new(stack: &mut Stack, id: &str, params: LogGroupParams<'_>) -> Result<Self, Error> {
        if params.name.is_empty() {
            return Err(Error::invalid(id, "log group name must not be empty"));
        }

        let retention = params.retention_days.unwrap_or(3);
        let logical_id = format!("LogGroup{}", escape_logical_id(id));

        let handle = stack.add_resource(CfnResource {
            name: logical_id,
            resource: json!({
                "Type": "AWS::Logs::LogGroup",
                "DeletionPolicy": "Delete",
                "Properties": {
                    "LogGroupName": params.name,
                    "RetentionInDays": retention
                }
            }),
        })?;

        Ok(LogGroup { handle })
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
    fn retention_defaults_to_three_days() {
        let mut stack = Stack::new("cluster", "cloud-mesh-dev-cluster", TagMap::new());
        let group = LogGroup::new(
            &mut stack,
            "Cluster",
            LogGroupParams {
                name: "cloud-mesh-dev-cluster",
                retention_days: None,
            },
        )
        .unwrap();

        let resource = stack.resource(group.handle().logical_id()).unwrap();
        assert_eq!(resource["Properties"]["RetentionInDays"], 3);
        assert_eq!(resource["DeletionPolicy"], "Delete");
    }

    #[test]
    fn empty_names_are_rejected() {
        let mut stack = Stack::new("cluster", "cloud-mesh-dev-cluster", TagMap::new());
        assert!(LogGroup::new(
            &mut stack,
            "Cluster",
            LogGroupParams {
                name: "",
                retention_days: None
            }
        )
        .is_err());
    }
}
