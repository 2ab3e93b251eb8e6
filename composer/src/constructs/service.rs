use crate::construct::{escape_logical_id, CfnResource, Handle};
use crate::error::Error;
use crate::stack::Stack;
use serde_json::{json, Value};

pub struct FargateServiceParams<'a> {
    pub name: &'a str,
    pub cluster: Value,
    pub task_definition: Value,
    pub security_groups: Vec<Value>,
    pub subnets: Vec<Value>,
    pub assign_public_ip: Option<bool>,
    pub desired_count: Option<u32>,
}

/// Long-running Fargate service
///
/// Rolling deployments keep at least 80% of tasks healthy, and new tasks
/// get a one minute grace period before their health checks count.
pub struct FargateService {
    handle: Handle,
}

impl FargateService {
    pub fn new(stack: &mut Stack, id: &str, params: FargateServiceParams<'_>) -> Result<Self, Error> {
        if params.name.is_empty() {
            return Err(Error::invalid(id, "service name must not be empty"));
        }
        if params.subnets.is_empty() {
            return Err(Error::invalid(id, "a service needs at least one subnet"));
        }
        if params.security_groups.is_empty() {
            return Err(Error::invalid(id, "a service needs a security group"));
        }

        let assign_public_ip = if params.assign_public_ip.unwrap_or(false) {
            "ENABLED"
        } else {
            "DISABLED"
        };

        let handle = stack.add_resource(CfnResource {
            name: format!("Service{}", escape_logical_id(id)),
            resource: json!({
                "Type": "AWS::ECS::Service",
                "Properties": {
                    "ServiceName": params.name,
                    "Cluster": params.cluster,
                    "TaskDefinition": params.task_definition,
                    "LaunchType": "FARGATE",
                    "DesiredCount": params.desired_count.unwrap_or(1),
                    "DeploymentConfiguration": { "MinimumHealthyPercent": 80 },
                    "HealthCheckGracePeriodSeconds": 60,
                    "NetworkConfiguration": {
                        "AwsvpcConfiguration": {
                            "AssignPublicIp": assign_public_ip,
                            "SecurityGroups": params.security_groups,
                            "Subnets": params.subnets
                        }
                    }
                }
            }),
        })?;

        Ok(FargateService { handle })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}
