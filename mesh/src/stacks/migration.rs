use crate::config::Config;
use crate::stacks::{secret_key, title};
use composer::constructs::{ContainerSpec, FargateTaskDefinition, FargateTaskDefinitionParams};
use composer::{App, Error, Stack};
use serde_json::json;

/// One migration task definition per service
///
/// Nothing here runs on a schedule; the tasks exist to be launched by hand
/// or by CI against the cluster. Credentials come in as secret references,
/// never as literal connection strings.
pub fn stack(app: &App, config: &Config) -> Result<Stack, Error> {
    let mut stack = app.begin_stack("migration");

    let cluster_log_group = stack.import(app, "cluster", "LogGroupName")?;
    let master_secret = stack.import(app, "database", "MasterSecretArn")?;
    let read_endpoint = stack.import(app, "database", "ClusterReadEndpoint")?;

    for service in config.services() {
        let scope = title(&service.name);
        let repository = stack.import(app, "registries", &format!("{scope}ServiceRepositoryUri"))?;
        let password = stack.import(app, "database", &format!("{scope}PasswordSecretArn"))?;

        let family = app.naming().name(&format!("{}-migration", service.name));
        let container_name = format!("{}-migration", service.name);

        let task = FargateTaskDefinition::new(
            &mut stack,
            &format!("{scope}Migration"),
            FargateTaskDefinitionParams {
                family: &family,
                cpu: None,
                memory_mib: None,
                containers: vec![ContainerSpec {
                    name: &container_name,
                    image: json!({ "Fn::Join": ["", [repository, ":latest"]] }),
                    port: None,
                    environment: vec![
                        ("DATABASE_NAME", json!(service.database_name())),
                        ("DATABASE_READ_HOST", read_endpoint.clone()),
                    ],
                    secrets: vec![
                        ("DATABASE_HOST", secret_key(&master_secret, "host")),
                        ("DATABASE_PORT", secret_key(&master_secret, "port")),
                        ("DATABASE_USER", secret_key(&password, "username")),
                        ("DATABASE_PASSWORD", secret_key(&password, "password")),
                    ],
                    health_check: None,
                    command: Some(vec!["alembic", "upgrade", "head"]),
                    log_group: Some(cluster_log_group.clone()),
                }],
            },
        )?;

        stack.output(
            &format!("{scope}MigrationTaskDefinitionArn"),
            task.handle().ref_(),
            &format!("Migration task for the {} service", service.name),
        )?;
    }

    Ok(stack)
}
