use crate::construct::{escape_logical_id, CfnResource, Handle};
use crate::constructs::secret::{GeneratedSecret, GeneratedSecretParams};
use crate::error::Error;
use crate::stack::Stack;
use serde_json::{json, Value};

pub struct AuroraClusterParams<'a> {
    pub cluster_name: &'a str,
    pub description: &'a str,
    /// Subnet id tokens the subnet group spans, isolated tier expected
    pub subnets: Vec<Value>,
    /// Security group id tokens attached to the cluster
    pub security_groups: Vec<Value>,
    pub master_username: Option<&'a str>,
}

/// Aurora MySQL cluster with one writer and one reader
///
/// The master credentials live in a generated secret; the cluster resolves
/// them through a dynamic reference so the password never appears in the
/// template.
pub struct AuroraCluster {
    handle: Handle,
    master_secret: GeneratedSecret,
}

impl AuroraCluster {
    pub fn new(stack: &mut Stack, id: &str, params: AuroraClusterParams<'_>) -> Result<Self, Error> {
        if params.cluster_name.is_empty() {
            return Err(Error::invalid(id, "cluster name must not be empty"));
        }
        if params.subnets.is_empty() {
            return Err(Error::invalid(id, "a subnet group needs at least one subnet"));
        }
        if params.security_groups.is_empty() {
            return Err(Error::invalid(id, "the cluster needs a security group"));
        }

        let scope = escape_logical_id(id);
        let master_username = params.master_username.unwrap_or("admin");

        let master_secret = GeneratedSecret::new(
            stack,
            &format!("{id}Master"),
            GeneratedSecretParams {
                name: &format!("{}-master", params.cluster_name),
                username: master_username,
                description: "Aurora master credentials",
            },
        )?;

        let subnet_group = stack.add_resource(CfnResource {
            name: format!("DbSubnetGroup{scope}"),
            resource: json!({
                "Type": "AWS::RDS::DBSubnetGroup",
                "DeletionPolicy": "Delete",
                "Properties": {
                    "DBSubnetGroupName": params.cluster_name,
                    "DBSubnetGroupDescription": params.description,
                    "SubnetIds": params.subnets
                }
            }),
        })?;

        let secret_id = master_secret.handle().logical_id().to_string();

        let handle = stack.add_resource(CfnResource {
            name: format!("DbCluster{scope}"),
            resource: json!({
                "Type": "AWS::RDS::DBCluster",
                "DeletionPolicy": "Delete",
                "Properties": {
                    "Engine": "aurora-mysql",
                    "EngineVersion": "8.0.mysql_aurora.3.11.1",
                    "DBClusterIdentifier": params.cluster_name,
                    "DeletionProtection": false,
                    "DBSubnetGroupName": subnet_group.ref_(),
                    "VpcSecurityGroupIds": params.security_groups,
                    "MasterUsername": {
                        "Fn::Sub": format!(
                            "{{{{resolve:secretsmanager:${{{secret_id}}}:SecretString:username}}}}"
                        )
                    },
                    "MasterUserPassword": {
                        "Fn::Sub": format!(
                            "{{{{resolve:secretsmanager:${{{secret_id}}}:SecretString:password}}}}"
                        )
                    }
                }
            }),
        })?;

        stack.add_resource(CfnResource {
            name: format!("DbWriter{scope}"),
            resource: json!({
                "Type": "AWS::RDS::DBInstance",
                "DeletionPolicy": "Delete",
                "Properties": {
                    "Engine": "aurora-mysql",
                    "DBClusterIdentifier": handle.ref_(),
                    "DBInstanceClass": "db.t4g.medium"
                }
            }),
        })?;

        stack.add_resource(CfnResource {
            name: format!("DbReader{scope}"),
            resource: json!({
                "Type": "AWS::RDS::DBInstance",
                "DeletionPolicy": "Delete",
                "Properties": {
                    "Engine": "aurora-mysql",
                    "DBClusterIdentifier": handle.ref_(),
                    "DBInstanceClass": "db.t4g.medium"
                }
            }),
        })?;

        // Backfills host and port into the master secret once the cluster
        // is up, so consumers can take connection details by secret key
        stack.add_resource(CfnResource {
            name: format!("DbSecretAttachment{scope}"),
            resource: json!({
                "Type": "AWS::SecretsManager::SecretTargetAttachment",
                "Properties": {
                    "SecretId": master_secret.handle().ref_(),
                    "TargetId": handle.ref_(),
                    "TargetType": "AWS::RDS::DBCluster"
                }
            }),
        })?;

        Ok(AuroraCluster {
            handle,
            master_secret,
        })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn master_secret(&self) -> &GeneratedSecret {
        &self.master_secret
    }

    pub fn endpoint(&self) -> Value {
        self.handle.att("Endpoint.Address")
    }

    pub fn read_endpoint(&self) -> Value {
        self.handle.att("ReadEndpoint.Address")
    }

    pub fn port(&self) -> Value {
        self.handle.att("Endpoint.Port")
    }
}
