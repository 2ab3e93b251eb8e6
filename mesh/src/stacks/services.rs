use crate::config::Config;
use crate::stacks::{secret_key, title};
use composer::constructs::{
    ContainerSpec, FargateService, FargateServiceParams, FargateTaskDefinition,
    FargateTaskDefinitionParams, HealthCheck,
};
use composer::{App, Error, Stack};
use serde_json::json;

/// The long-running mesh services
///
/// Every container follows the same environment contract: `PORT`,
/// `DATABASE_NAME` and `DATABASE_READ_HOST` in plaintext, connection
/// credentials through secret references.
pub fn stack(app: &App, config: &Config) -> Result<Stack, Error> {
    let mut stack = app.begin_stack("services");

    let cluster_arn = stack.import(app, "cluster", "ClusterArn")?;
    let cluster_log_group = stack.import(app, "cluster", "LogGroupName")?;
    let master_secret = stack.import(app, "database", "MasterSecretArn")?;
    let read_endpoint = stack.import(app, "database", "ClusterReadEndpoint")?;
    let public_sg = stack.import(app, "network", "PublicSecurityGroupId")?;

    let mut subnets = Vec::new();
    for az in 0..config.max_azs() {
        subnets.push(stack.import(app, "network", &format!("PublicSubnet{az}"))?);
    }

    for service in config.services() {
        let scope = title(&service.name);
        let repository = stack.import(app, "registries", &format!("{scope}ServiceRepositoryUri"))?;
        let password = stack.import(app, "database", &format!("{scope}PasswordSecretArn"))?;
        let name = app.naming().name(&service.name);

        let task = FargateTaskDefinition::new(
            &mut stack,
            &scope,
            FargateTaskDefinitionParams {
                family: &name,
                cpu: None,
                memory_mib: None,
                containers: vec![ContainerSpec {
                    name: &service.name,
                    image: json!({ "Fn::Join": ["", [repository, ":latest"]] }),
                    port: Some(service.port),
                    environment: vec![
                        ("PORT", json!(service.port.to_string())),
                        ("DATABASE_NAME", json!(service.database_name())),
                        ("DATABASE_READ_HOST", read_endpoint.clone()),
                    ],
                    secrets: vec![
                        ("DATABASE_HOST", secret_key(&master_secret, "host")),
                        ("DATABASE_PORT", secret_key(&master_secret, "port")),
                        ("DATABASE_USER", secret_key(&password, "username")),
                        ("DATABASE_PASSWORD", secret_key(&password, "password")),
                    ],
                    health_check: Some(HealthCheck::http(service.port, "/health/")),
                    command: None,
                    log_group: Some(cluster_log_group.clone()),
                }],
            },
        )?;

        FargateService::new(
            &mut stack,
            &scope,
            FargateServiceParams {
                name: &name,
                cluster: cluster_arn.clone(),
                task_definition: task.handle().ref_(),
                security_groups: vec![public_sg.clone()],
                subnets: subnets.clone(),
                assign_public_ip: Some(true),
                desired_count: Some(service.desired_count),
            },
        )?;
    }

    Ok(stack)
}
