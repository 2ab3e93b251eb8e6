use crate::construct::{escape_logical_id, CfnResource, Handle};
use crate::error::Error;
use crate::stack::Stack;
use serde_json::{json, Value};

/// VPC attachment for a function that must reach private resources
pub struct VpcPlacement {
    pub subnets: Vec<Value>,
    pub security_groups: Vec<Value>,
}

pub struct LambdaFunctionParams<'a> {
    pub name: &'a str,
    pub description: &'a str,
    /// Code location, an S3 pointer object
    pub code: Value,
    pub handler: Option<&'a str>,
    pub runtime: Option<&'a str>,
    pub timeout_seconds: Option<u32>,
    pub memory_mib: Option<u32>,
    /// Log group token, a plain name or an import expression
    pub log_group: Value,
    pub vpc: Option<VpcPlacement>,
    /// Extra policy statements for the execution role
    pub policy_statements: Vec<Value>,
}

/// Lambda function with its execution role
///
/// Provided runtime with a `bootstrap` handler by default, placed into the
/// VPC's private tier when a placement is given.
pub struct LambdaFunction {
    handle: Handle,
}

impl LambdaFunction {
    pub fn new(stack: &mut Stack, id: &str, params: LambdaFunctionParams<'_>) -> Result<Self, Error> {
        if params.name.is_empty() {
            return Err(Error::invalid(id, "function name must not be empty"));
        }

        let scope = escape_logical_id(id);

        let mut statements = vec![json!({
            "Effect": "Allow",
            "Action": [
                "logs:CreateLogGroup",
                "logs:CreateLogStream",
                "logs:PutLogEvents"
            ],
            "Resource": "*"
        })];

        if params.vpc.is_some() {
            statements.push(json!({
                "Effect": "Allow",
                "Action": [
                    "ec2:CreateNetworkInterface",
                    "ec2:DescribeNetworkInterfaces",
                    "ec2:DeleteNetworkInterface"
                ],
                "Resource": "*"
            }));
        }

        statements.extend(params.policy_statements.iter().cloned());

        let role = stack.add_resource(CfnResource {
            name: format!("FunctionRole{scope}"),
            resource: json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "Service": ["lambda.amazonaws.com"] },
                            "Action": ["sts:AssumeRole"]
                        }]
                    },
                    "Path": "/",
                    "Policies": [{
                        "PolicyName": "FunctionPolicy",
                        "PolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": statements
                        }
                    }]
                }
            }),
        })?;

        let mut properties = json!({
            "FunctionName": params.name,
            "Description": params.description,
            "Handler": params.handler.unwrap_or("bootstrap"),
            "Runtime": params.runtime.unwrap_or("provided.al2023"),
            "Timeout": params.timeout_seconds.unwrap_or(300),
            "MemorySize": params.memory_mib.unwrap_or(256),
            "Role": role.att("Arn"),
            "Code": params.code,
            "LoggingConfig": { "LogGroup": params.log_group }
        });

        if let Some(vpc) = &params.vpc {
            properties["VpcConfig"] = json!({
                "SubnetIds": vpc.subnets,
                "SecurityGroupIds": vpc.security_groups
            });
        }

        let handle = stack.add_resource(CfnResource {
            name: format!("Function{scope}"),
            resource: json!({
                "Type": "AWS::Lambda::Function",
                "Properties": properties
            }),
        })?;

        Ok(LambdaFunction { handle })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn arn(&self) -> Value {
        self.handle.att("Arn")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::TagMap;

    fn params() -> LambdaFunctionParams<'static> {
        LambdaFunctionParams {
            name: "cloud-mesh-dev-db-init",
            description: "database principal initialization",
            code: json!({"S3Bucket": "mesh-artifacts", "S3Key": "db-init.zip"}),
            handler: None,
            runtime: None,
            timeout_seconds: None,
            memory_mib: None,
            log_group: json!("cloud-mesh-dev-db-init"),
            vpc: None,
            policy_statements: Vec::new(),
        }
    }

    #[test]
    fn provided_runtime_defaults_apply() {
        let mut stack = Stack::new("database", "cloud-mesh-dev-database", TagMap::new());
        let function = LambdaFunction::new(&mut stack, "DbInit", params()).unwrap();

        let props = &stack.resource(function.handle().logical_id()).unwrap()["Properties"];
        assert_eq!(props["Handler"], "bootstrap");
        assert_eq!(props["Runtime"], "provided.al2023");
        assert_eq!(props["Timeout"], 300);
        assert_eq!(props["MemorySize"], 256);
        assert!(props.get("VpcConfig").is_none());
    }

    #[test]
    fn vpc_placement_adds_network_permissions() {
        let mut stack = Stack::new("database", "cloud-mesh-dev-database", TagMap::new());
        let mut p = params();
        p.vpc = Some(VpcPlacement {
            subnets: vec![json!({"Fn::ImportValue": "cloud-mesh-dev-network-PrivateSubnet0"})],
            security_groups: vec![json!({"Fn::GetAtt": ["SecurityGroupFn", "GroupId"]})],
        });
        let function = LambdaFunction::new(&mut stack, "DbInit", p).unwrap();

        let props = &stack.resource(function.handle().logical_id()).unwrap()["Properties"];
        assert!(props.get("VpcConfig").is_some());

        let role = stack.resource("FunctionRoleDbInit").unwrap();
        let statements = role["Properties"]["Policies"][0]["PolicyDocument"]["Statement"]
            .as_array()
            .unwrap();
        assert!(statements
            .iter()
            .any(|s| s["Action"][0] == "ec2:CreateNetworkInterface"));
    }
}
