use crate::construct::{escape_logical_id, CfnResource, Handle};
use crate::constructs::log_group::{LogGroup, LogGroupParams};
use crate::error::Error;
use crate::reachability::CidrBlock;
use crate::stack::Stack;
use serde_json::json;

pub struct VpcParams<'a> {
    pub cidr: CidrBlock,
    pub max_azs: Option<u32>,
    pub flow_log_group: &'a str,
    pub flow_log_retention_days: Option<u32>,
}

/// VPC with public, private and isolated subnet tiers across the AZs
///
/// Public subnets route to an internet gateway and map public IPs on
/// launch. Private subnets route out through a single NAT gateway. Isolated
/// subnets have no route out at all. Every subnet is a /24 carved from the
/// VPC range, and all traffic is flow-logged to CloudWatch.
pub struct Vpc {
    handle: Handle,
    public_subnets: Vec<Handle>,
    private_subnets: Vec<Handle>,
    isolated_subnets: Vec<Handle>,
}

impl Vpc {
    pub fn new(stack: &mut Stack, id: &str, params: VpcParams<'_>) -> Result<Self, Error> {
        let max_azs = params.max_azs.unwrap_or(2);
        if max_azs == 0 {
            return Err(Error::invalid(id, "a VPC needs at least one AZ"));
        }
        if params.cidr.prefix() >= 24 {
            return Err(Error::invalid(
                id,
                "the VPC range is too small to carve /24 subnets from",
            ));
        }

        let scope = escape_logical_id(id);

        let handle = stack.add_resource(CfnResource {
            name: format!("Vpc{scope}"),
            resource: json!({
                "Type": "AWS::EC2::VPC",
                "Properties": {
                    "CidrBlock": params.cidr.to_string(),
                    "EnableDnsSupport": true,
                    "EnableDnsHostnames": true
                }
            }),
        })?;

        let gateway = stack.add_resource(CfnResource {
            name: format!("InternetGateway{scope}"),
            resource: json!({ "Type": "AWS::EC2::InternetGateway", "Properties": {} }),
        })?;

        stack.add_resource(CfnResource {
            name: format!("GatewayAttachment{scope}"),
            resource: json!({
                "Type": "AWS::EC2::VPCGatewayAttachment",
                "Properties": {
                    "VpcId": handle.ref_(),
                    "InternetGatewayId": gateway.ref_()
                }
            }),
        })?;

        let mut vpc = Vpc {
            handle,
            public_subnets: Vec::new(),
            private_subnets: Vec::new(),
            isolated_subnets: Vec::new(),
        };

        vpc.subnet_tiers(stack, &scope, &gateway, params.cidr, max_azs)?;
        vpc.flow_logs(
            stack,
            &scope,
            params.flow_log_group,
            params.flow_log_retention_days,
        )?;

        Ok(vpc)
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn public_subnets(&self) -> &[Handle] {
        &self.public_subnets
    }

    pub fn private_subnets(&self) -> &[Handle] {
        &self.private_subnets
    }

    pub fn isolated_subnets(&self) -> &[Handle] {
        &self.isolated_subnets
    }

    fn subnet_tiers(
        &mut self,
        stack: &mut Stack,
        scope: &str,
        gateway: &Handle,
        cidr: CidrBlock,
        max_azs: u32,
    ) -> Result<(), Error> {
        let carve = |index: u32| {
            cidr.subnet(24, index)
                .map_err(|reason| Error::invalid(scope, &reason))
        };

        for az in 0..max_azs {
            let public = self.subnet(
                stack,
                &format!("PublicSubnet{az}{scope}"),
                carve(az)?,
                az,
                true,
            )?;
            self.public_subnets.push(public);

            let private = self.subnet(
                stack,
                &format!("PrivateSubnet{az}{scope}"),
                carve(max_azs + az)?,
                az,
                false,
            )?;
            self.private_subnets.push(private);

            let isolated = self.subnet(
                stack,
                &format!("IsolatedSubnet{az}{scope}"),
                carve(2 * max_azs + az)?,
                az,
                false,
            )?;
            self.isolated_subnets.push(isolated);
        }

        let public_routes = stack.add_resource(CfnResource {
            name: format!("PublicRouteTable{scope}"),
            resource: json!({
                "Type": "AWS::EC2::RouteTable",
                "Properties": { "VpcId": self.handle.ref_() }
            }),
        })?;

        stack.add_resource(CfnResource {
            name: format!("PublicDefaultRoute{scope}"),
            resource: json!({
                "Type": "AWS::EC2::Route",
                "DependsOn": format!("GatewayAttachment{scope}"),
                "Properties": {
                    "RouteTableId": public_routes.ref_(),
                    "DestinationCidrBlock": "0.0.0.0/0",
                    "GatewayId": gateway.ref_()
                }
            }),
        })?;

        let nat_ip = stack.add_resource(CfnResource {
            name: format!("NatIp{scope}"),
            resource: json!({
                "Type": "AWS::EC2::EIP",
                "Properties": { "Domain": "vpc" }
            }),
        })?;

        let nat = stack.add_resource(CfnResource {
            name: format!("NatGateway{scope}"),
            resource: json!({
                "Type": "AWS::EC2::NatGateway",
                "Properties": {
                    "AllocationId": nat_ip.att("AllocationId"),
                    "SubnetId": self.public_subnets[0].ref_()
                }
            }),
        })?;

        let private_routes = stack.add_resource(CfnResource {
            name: format!("PrivateRouteTable{scope}"),
            resource: json!({
                "Type": "AWS::EC2::RouteTable",
                "Properties": { "VpcId": self.handle.ref_() }
            }),
        })?;

        stack.add_resource(CfnResource {
            name: format!("PrivateDefaultRoute{scope}"),
            resource: json!({
                "Type": "AWS::EC2::Route",
                "Properties": {
                    "RouteTableId": private_routes.ref_(),
                    "DestinationCidrBlock": "0.0.0.0/0",
                    "NatGatewayId": nat.ref_()
                }
            }),
        })?;

        // No default route: this is what keeps the isolated tier isolated
        let isolated_routes = stack.add_resource(CfnResource {
            name: format!("IsolatedRouteTable{scope}"),
            resource: json!({
                "Type": "AWS::EC2::RouteTable",
                "Properties": { "VpcId": self.handle.ref_() }
            }),
        })?;

        let tiers = [
            (&public_routes, self.public_subnets.clone(), "Public"),
            (&private_routes, self.private_subnets.clone(), "Private"),
            (&isolated_routes, self.isolated_subnets.clone(), "Isolated"),
        ];

        for (table, subnets, tier) in tiers {
            for (az, subnet) in subnets.iter().enumerate() {
                stack.add_resource(CfnResource {
                    name: format!("{tier}SubnetRoutes{az}{scope}"),
                    resource: json!({
                        "Type": "AWS::EC2::SubnetRouteTableAssociation",
                        "Properties": {
                            "RouteTableId": table.ref_(),
                            "SubnetId": subnet.ref_()
                        }
                    }),
                })?;
            }
        }

        Ok(())
    }

    fn subnet(
        &self,
        stack: &mut Stack,
        logical_id: &str,
        cidr: CidrBlock,
        az: u32,
        public_ips: bool,
    ) -> Result<Handle, Error> {
        stack.add_resource(CfnResource {
            name: logical_id.to_string(),
            resource: json!({
                "Type": "AWS::EC2::Subnet",
                "Properties": {
                    "VpcId": self.handle.ref_(),
                    "CidrBlock": cidr.to_string(),
                    "AvailabilityZone": { "Fn::Select": [az, { "Fn::GetAZs": "" }] },
                    "MapPublicIpOnLaunch": public_ips
                }
            }),
        })
    }

    fn flow_logs(
        &self,
        stack: &mut Stack,
        scope: &str,
        group_name: &str,
        retention_days: Option<u32>,
    ) -> Result<(), Error> {
        let group = LogGroup::new(
            stack,
            &format!("FlowLogs{scope}"),
            LogGroupParams {
                name: group_name,
                retention_days,
            },
        )?;

        let role = stack.add_resource(CfnResource {
            name: format!("FlowLogsRole{scope}"),
            resource: json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "Service": ["vpc-flow-logs.amazonaws.com"] },
                            "Action": ["sts:AssumeRole"]
                        }]
                    },
                    "Path": "/",
                    "Policies": [{
                        "PolicyName": "AppendToLogsPolicy",
                        "PolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": [{
                                "Effect": "Allow",
                                "Action": [
                                    "logs:CreateLogGroup",
                                    "logs:CreateLogStream",
                                    "logs:PutLogEvents"
                                ],
                                "Resource": group.handle().att("Arn")
                            }]
                        }
                    }]
                }
            }),
        })?;

        stack.add_resource(CfnResource {
            name: format!("FlowLog{scope}"),
            resource: json!({
                "Type": "AWS::EC2::FlowLog",
                "Properties": {
                    "ResourceType": "VPC",
                    "ResourceId": self.handle.ref_(),
                    "TrafficType": "ALL",
                    "LogDestinationType": "cloud-watch-logs",
                    "LogGroupName": group_name,
                    "DeliverLogsPermissionArn": role.att("Arn")
                }
            }),
        })?;

        Ok(())
    }
}
