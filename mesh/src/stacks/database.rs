use crate::config::Config;
use crate::stacks::title;
use composer::constructs::{
    AuroraCluster, AuroraClusterParams, ContainerSpec, CustomResource, CustomResourceParams,
    FargateService, FargateServiceParams, FargateTaskDefinition, FargateTaskDefinitionParams,
    GeneratedSecret, GeneratedSecretParams, HealthCheck, LambdaFunction, LambdaFunctionParams,
    VpcPlacement,
};
use composer::{App, Error, Stack};
use serde_json::json;

/// Aurora cluster, per-service credentials, the db-admin GUI, and the
/// db-init custom resource
///
/// The custom resource carries every secret ARN plus a `Version` key;
/// bumping the version in cloudmesh.toml is how the initialization is
/// re-run. Its dependency on the Aurora cluster is structural, not a data
/// edge, so it is declared explicitly.
pub fn stack(app: &App, config: &Config) -> Result<Stack, Error> {
    let mut stack = app.begin_stack("database");

    let mut isolated = Vec::new();
    let mut private = Vec::new();
    let mut public = Vec::new();
    for az in 0..config.max_azs() {
        isolated.push(stack.import(app, "network", &format!("IsolatedSubnet{az}"))?);
        private.push(stack.import(app, "network", &format!("PrivateSubnet{az}"))?);
        public.push(stack.import(app, "network", &format!("PublicSubnet{az}"))?);
    }
    let database_sg = stack.import(app, "network", "DatabaseSecurityGroupId")?;
    let public_sg = stack.import(app, "network", "PublicSecurityGroupId")?;
    let function_sg = stack.import(app, "network", "FunctionSecurityGroupId")?;
    let cluster_arn = stack.import(app, "cluster", "ClusterArn")?;
    let cluster_log_group = stack.import(app, "cluster", "LogGroupName")?;

    let cluster_name = stack.name().to_string();
    let aurora = AuroraCluster::new(
        &mut stack,
        "Mesh",
        AuroraClusterParams {
            cluster_name: &cluster_name,
            description: "Subnet group for the mesh database",
            subnets: isolated,
            security_groups: vec![database_sg],
            master_username: None,
        },
    )?;

    let mut service_secrets = Vec::new();
    for service in config.services() {
        let scope = title(&service.name);
        let secret = GeneratedSecret::new(
            &mut stack,
            &format!("{scope}DbPassword"),
            GeneratedSecretParams {
                name: &format!("{}DbPassword", service.name),
                username: &service.database_user,
                description: &format!("Credentials for the {} schema", service.database_name()),
            },
        )?;
        service_secrets.push((service, secret));
    }

    let gui_name = app.naming().name("db-admin");
    let gui_task = FargateTaskDefinition::new(
        &mut stack,
        "DbAdmin",
        FargateTaskDefinitionParams {
            family: &gui_name,
            cpu: None,
            memory_mib: None,
            containers: vec![ContainerSpec {
                name: "db-admin",
                image: json!("phpmyadmin/phpmyadmin:latest"),
                port: Some(80),
                environment: vec![
                    ("PMA_HOST", aurora.endpoint()),
                    ("PMA_PORT", json!("3306")),
                ],
                secrets: Vec::new(),
                health_check: Some(HealthCheck::http(80, "/")),
                command: None,
                log_group: Some(cluster_log_group.clone()),
            }],
        },
    )?;

    FargateService::new(
        &mut stack,
        "DbAdmin",
        FargateServiceParams {
            name: &gui_name,
            cluster: cluster_arn,
            task_definition: gui_task.handle().ref_(),
            security_groups: vec![public_sg],
            subnets: public,
            assign_public_ip: Some(true),
            desired_count: None,
        },
    )?;

    let mut secret_arns = vec![aurora.master_secret().arn()];
    secret_arns.extend(service_secrets.iter().map(|(_, secret)| secret.arn()));

    let function_name = app.naming().name("db-init");
    let db_init = LambdaFunction::new(
        &mut stack,
        "DbInit",
        LambdaFunctionParams {
            name: &function_name,
            description: "Initializes the mesh schemas and database principals",
            code: json!({
                "S3Bucket": config.artifacts_bucket(),
                "S3Key": config.db_init_key()
            }),
            handler: None,
            runtime: None,
            timeout_seconds: None,
            memory_mib: None,
            log_group: cluster_log_group,
            vpc: Some(VpcPlacement {
                subnets: private,
                security_groups: vec![function_sg],
            }),
            policy_statements: vec![json!({
                "Effect": "Allow",
                "Action": ["secretsmanager:GetSecretValue"],
                "Resource": secret_arns
            })],
        },
    )?;

    let password_arns: Vec<(String, serde_json::Value)> = service_secrets
        .iter()
        .map(|(service, secret)| (format!("{}PasswordArn", title(&service.name)), secret.arn()))
        .collect();

    let mut properties = vec![("DbSecretArn", aurora.master_secret().arn())];
    for (key, arn) in &password_arns {
        properties.push((key.as_str(), arn.clone()));
    }
    properties.push(("Version", json!(config.init_version())));

    CustomResource::new(
        &mut stack,
        "DbInit",
        CustomResourceParams {
            service_token: db_init.arn(),
            properties,
            depends_on: vec![aurora.handle().logical_id()],
        },
    )?;

    stack.output("ClusterEndpoint", aurora.endpoint(), "Aurora writer endpoint")?;
    stack.output(
        "ClusterReadEndpoint",
        aurora.read_endpoint(),
        "Aurora reader endpoint",
    )?;
    stack.output("ClusterPort", aurora.port(), "Aurora port")?;
    stack.output(
        "MasterSecretArn",
        aurora.master_secret().arn(),
        "Aurora master credentials secret",
    )?;
    for (service, secret) in &service_secrets {
        stack.output(
            &format!("{}PasswordSecretArn", title(&service.name)),
            secret.arn(),
            &format!("Credentials secret of {}", service.database_user),
        )?;
    }

    Ok(stack)
}
