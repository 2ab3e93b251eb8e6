use crate::construct::{escape_logical_id, CfnResource, Handle};
use crate::error::Error;
use crate::stack::Stack;
use serde_json::{json, Map, Value};

/// Container health check, wget-style command with the service defaults
#[derive(Clone, Debug)]
pub struct HealthCheck {
    pub command: Vec<String>,
    pub interval_seconds: u32,
    pub timeout_seconds: u32,
    pub retries: u32,
    pub start_period_seconds: u32,
}

impl HealthCheck {
    /// HTTP probe against a local path, the way the services probe
    /// `/health/`
    pub fn http(port: u16, path: &str) -> Self {
        HealthCheck {
            command: vec![
                "CMD-SHELL".to_string(),
                format!("wget --no-verbose --tries=1 --spider http://localhost:{port}{path} || exit 1"),
            ],
            interval_seconds: 30,
            timeout_seconds: 5,
            retries: 3,
            start_period_seconds: 60,
        }
    }
}

/// One container of a task definition
pub struct ContainerSpec<'a> {
    pub name: &'a str,
    /// Image reference token, a plain string or an import/att expression
    pub image: Value,
    pub port: Option<u16>,
    /// Plaintext environment variables
    pub environment: Vec<(&'a str, Value)>,
    /// Variables injected from Secrets Manager, `(name, secret arn token)`
    pub secrets: Vec<(&'a str, Value)>,
    pub health_check: Option<HealthCheck>,
    pub command: Option<Vec<&'a str>>,
    /// awslogs group token, a plain name or an import expression
    pub log_group: Option<Value>,
}

pub struct FargateTaskDefinitionParams<'a> {
    pub family: &'a str,
    pub cpu: Option<u32>,
    pub memory_mib: Option<u32>,
    pub containers: Vec<ContainerSpec<'a>>,
}

/// Fargate task definition with its execution role
///
/// The execution role is granted exactly the secrets the containers
/// reference, plus log delivery.
pub struct FargateTaskDefinition {
    handle: Handle,
}

/// Fargate only accepts fixed cpu/memory pairings
fn fargate_combo_allowed(cpu: u32, memory_mib: u32) -> bool {
    match cpu {
        256 => matches!(memory_mib, 512 | 1024 | 2048),
        512 => (1024..=4096).contains(&memory_mib) && memory_mib % 1024 == 0,
        1024 => (2048..=8192).contains(&memory_mib) && memory_mib % 1024 == 0,
        2048 => (4096..=16384).contains(&memory_mib) && memory_mib % 1024 == 0,
        4096 => (8192..=30720).contains(&memory_mib) && memory_mib % 1024 == 0,
        _ => false,
    }
}

impl FargateTaskDefinition {
    pub fn new(
        stack: &mut Stack,
        id: &str,
        params: FargateTaskDefinitionParams<'_>,
    ) -> Result<Self, Error> {
        if params.family.is_empty() {
            return Err(Error::invalid(id, "task family must not be empty"));
        }
        if params.containers.is_empty() {
            return Err(Error::invalid(id, "a task needs at least one container"));
        }

        let cpu = params.cpu.unwrap_or(256);
        let memory = params.memory_mib.unwrap_or(512);
        if !fargate_combo_allowed(cpu, memory) {
            return Err(Error::invalid(
                id,
                &format!("{cpu} CPU units with {memory} MiB is not a Fargate combination"),
            ));
        }

        let scope = escape_logical_id(id);

        let mut secret_arns = Vec::new();
        let mut containers = Vec::new();
        for container in &params.containers {
            if container.name.is_empty() {
                return Err(Error::invalid(id, "container names must not be empty"));
            }
            secret_arns.extend(container.secrets.iter().map(|(_, arn)| arn.clone()));
            containers.push(Self::container(container));
        }

        let role = stack.add_resource(CfnResource {
            name: format!("ExecutionRole{scope}"),
            resource: Self::execution_role(&secret_arns),
        })?;

        let handle = stack.add_resource(CfnResource {
            name: format!("TaskDefinition{scope}"),
            resource: json!({
                "Type": "AWS::ECS::TaskDefinition",
                "Properties": {
                    "Family": params.family,
                    "Cpu": cpu.to_string(),
                    "Memory": memory.to_string(),
                    "NetworkMode": "awsvpc",
                    "RequiresCompatibilities": ["FARGATE"],
                    "ExecutionRoleArn": role.att("Arn"),
                    "ContainerDefinitions": containers
                }
            }),
        })?;

        Ok(FargateTaskDefinition { handle })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    fn container(spec: &ContainerSpec<'_>) -> Value {
        let mut container = Map::new();
        container.insert("Name".to_string(), json!(spec.name));
        container.insert("Image".to_string(), spec.image.clone());
        container.insert("Essential".to_string(), json!(true));

        if let Some(port) = spec.port {
            container.insert(
                "PortMappings".to_string(),
                json!([{ "ContainerPort": port, "Protocol": "tcp" }]),
            );
        }

        if let Some(command) = &spec.command {
            container.insert("Command".to_string(), json!(command));
        }

        if !spec.environment.is_empty() {
            let environment = spec
                .environment
                .iter()
                .map(|(name, value)| json!({ "Name": name, "Value": value }))
                .collect::<Vec<Value>>();
            container.insert("Environment".to_string(), json!(environment));
        }

        if !spec.secrets.is_empty() {
            let secrets = spec
                .secrets
                .iter()
                .map(|(name, arn)| json!({ "Name": name, "ValueFrom": arn }))
                .collect::<Vec<Value>>();
            container.insert("Secrets".to_string(), json!(secrets));
        }

        if let Some(check) = &spec.health_check {
            container.insert(
                "HealthCheck".to_string(),
                json!({
                    "Command": check.command,
                    "Interval": check.interval_seconds,
                    "Timeout": check.timeout_seconds,
                    "Retries": check.retries,
                    "StartPeriod": check.start_period_seconds
                }),
            );
        }

        if let Some(group) = &spec.log_group {
            container.insert(
                "LogConfiguration".to_string(),
                json!({
                    "LogDriver": "awslogs",
                    "Options": {
                        "awslogs-group": group,
                        "awslogs-region": { "Ref": "AWS::Region" },
                        "awslogs-stream-prefix": spec.name
                    }
                }),
            );
        }

        Value::Object(container)
    }

    fn execution_role(secret_arns: &[Value]) -> Value {
        let mut statements = vec![json!({
            "Effect": "Allow",
            "Action": [
                "ecr:GetAuthorizationToken",
                "ecr:BatchCheckLayerAvailability",
                "ecr:GetDownloadUrlForLayer",
                "ecr:BatchGetImage",
                "logs:CreateLogStream",
                "logs:PutLogEvents"
            ],
            "Resource": "*"
        })];

        if !secret_arns.is_empty() {
            statements.push(json!({
                "Effect": "Allow",
                "Action": ["secretsmanager:GetSecretValue"],
                "Resource": secret_arns
            }));
        }

        json!({
            "Type": "AWS::IAM::Role",
            "Properties": {
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "Service": ["ecs-tasks.amazonaws.com"] },
                        "Action": ["sts:AssumeRole"]
                    }]
                },
                "Path": "/",
                "Policies": [{
                    "PolicyName": "TaskExecutionPolicy",
                    "PolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": statements
                    }
                }]
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::TagMap;

    fn container() -> ContainerSpec<'static> {
        ContainerSpec {
            name: "users-service",
            image: json!("users-service:latest"),
            port: Some(80),
            environment: vec![("PORT", json!("80"))],
            secrets: vec![("DATABASE_PASSWORD", json!({"Ref": "SecretUsers"}))],
            health_check: Some(HealthCheck::http(80, "/health/")),
            command: None,
            log_group: Some(json!("cloud-mesh-dev-cluster")),
        }
    }

    #[test]
    fn defaults_are_the_small_fargate_shape() {
        let mut stack = Stack::new("services", "cloud-mesh-dev-services", TagMap::new());
        let task = FargateTaskDefinition::new(
            &mut stack,
            "Users",
            FargateTaskDefinitionParams {
                family: "users-service",
                cpu: None,
                memory_mib: None,
                containers: vec![container()],
            },
        )
        .unwrap();

        let props = &stack.resource(task.handle().logical_id()).unwrap()["Properties"];
        assert_eq!(props["Cpu"], "256");
        assert_eq!(props["Memory"], "512");
        assert_eq!(props["RequiresCompatibilities"], json!(["FARGATE"]));
    }

    #[test]
    fn invalid_fargate_combinations_are_rejected() {
        let mut stack = Stack::new("services", "cloud-mesh-dev-services", TagMap::new());
        let result = FargateTaskDefinition::new(
            &mut stack,
            "Users",
            FargateTaskDefinitionParams {
                family: "users-service",
                cpu: Some(256),
                memory_mib: Some(4096),
                containers: vec![container()],
            },
        );

        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn health_check_carries_the_documented_timings() {
        let mut stack = Stack::new("services", "cloud-mesh-dev-services", TagMap::new());
        let task = FargateTaskDefinition::new(
            &mut stack,
            "Users",
            FargateTaskDefinitionParams {
                family: "users-service",
                cpu: None,
                memory_mib: None,
                containers: vec![container()],
            },
        )
        .unwrap();

        let check = &stack.resource(task.handle().logical_id()).unwrap()["Properties"]
            ["ContainerDefinitions"][0]["HealthCheck"];
        assert_eq!(check["Interval"], 30);
        assert_eq!(check["Timeout"], 5);
        assert_eq!(check["Retries"], 3);
        assert_eq!(check["StartPeriod"], 60);
        assert!(check["Command"][1].as_str().unwrap().contains("/health/"));
    }

    #[test]
    fn referenced_secrets_are_granted_to_the_execution_role() {
        let mut stack = Stack::new("services", "cloud-mesh-dev-services", TagMap::new());
        FargateTaskDefinition::new(
            &mut stack,
            "Users",
            FargateTaskDefinitionParams {
                family: "users-service",
                cpu: None,
                memory_mib: None,
                containers: vec![container()],
            },
        )
        .unwrap();

        let role = stack.resource("ExecutionRoleUsers").unwrap();
        let statements = role["Properties"]["Policies"][0]["PolicyDocument"]["Statement"]
            .as_array()
            .unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[1]["Action"],
            json!(["secretsmanager:GetSecretValue"])
        );
    }
}
