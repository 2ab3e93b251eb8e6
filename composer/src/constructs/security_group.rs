use crate::construct::{escape_logical_id, CfnResource, Handle};
use crate::error::Error;
use crate::reachability::{CidrBlock, GroupNode, IngressRule, Peer, Protocol, Tier};
use crate::stack::Stack;
use serde_json::{json, Value};

pub struct SecurityGroupParams<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub vpc: Value,
    pub tier: Tier,
    pub allow_all_outbound: Option<bool>,
}

/// Source side of an ingress rule, at construction time
pub enum IngressPeer<'a> {
    Cidr(CidrBlock),
    Group(&'a SecurityGroup),
}

/// Security group with default-deny ingress
///
/// Every group is also registered as a node of the stack's reachability
/// graph, under its tier. Ingress is strictly additive through
/// [`SecurityGroup::allow_from`]; there is no way to remove a rule once
/// granted.
pub struct SecurityGroup {
    handle: Handle,
    name: String,
}

impl SecurityGroup {
    pub fn new(stack: &mut Stack, id: &str, params: SecurityGroupParams<'_>) -> Result<Self, Error> {
        if params.name.is_empty() {
            return Err(Error::invalid(id, "security group name must not be empty"));
        }

        let allow_all_outbound = params.allow_all_outbound.unwrap_or(true);
        let logical_id = format!("SecurityGroup{}", escape_logical_id(id));

        let egress = if allow_all_outbound {
            json!([{
                "IpProtocol": "-1",
                "CidrIp": "0.0.0.0/0",
                "Description": "Allow all outbound traffic"
            }])
        } else {
            json!([])
        };

        let handle = stack.add_resource(CfnResource {
            name: logical_id,
            resource: json!({
                "Type": "AWS::EC2::SecurityGroup",
                "Properties": {
                    "GroupName": params.name,
                    "GroupDescription": params.description,
                    "VpcId": params.vpc,
                    "SecurityGroupIngress": [],
                    "SecurityGroupEgress": egress
                }
            }),
        })?;

        stack.record_security_group(GroupNode {
            name: params.name.to_string(),
            tier: params.tier,
            allow_all_outbound,
            ingress: Vec::new(),
        });

        Ok(SecurityGroup {
            handle,
            name: params.name.to_string(),
        })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Security group id token, for service and cluster placements
    pub fn group_id(&self) -> Value {
        self.handle.att("GroupId")
    }

    /// Grant ingress from a peer on one port
    ///
    /// The rule lands both in the synthesized resource and in the stack's
    /// reachability graph node, so the structural validator sees exactly
    /// what would be provisioned.
    pub fn allow_from(
        &self,
        stack: &mut Stack,
        peer: IngressPeer<'_>,
        protocol: Protocol,
        port: u16,
        description: &str,
    ) -> Result<(), Error> {
        if description.is_empty() {
            return Err(Error::invalid(
                self.handle.logical_id(),
                "every ingress rule needs a description",
            ));
        }

        let mut rule = json!({
            "IpProtocol": protocol.as_str(),
            "FromPort": port,
            "ToPort": port,
            "Description": description
        });

        let graph_peer = match &peer {
            IngressPeer::Cidr(cidr) => {
                rule["CidrIp"] = json!(cidr.to_string());
                Peer::Cidr(*cidr)
            }
            IngressPeer::Group(group) => {
                rule["SourceSecurityGroupId"] = group.group_id();
                Peer::Group(group.name.clone())
            }
        };

        let resource = stack
            .resource_mut(self.handle.logical_id())
            .ok_or_else(|| {
                Error::invalid(self.handle.logical_id(), "security group resource is gone")
            })?;

        match resource["Properties"]["SecurityGroupIngress"].as_array_mut() {
            Some(ingress) => ingress.push(rule),
            None => {
                return Err(Error::invalid(
                    self.handle.logical_id(),
                    "security group resource has no ingress list",
                ))
            }
        }

        let node = stack.security_group_mut(&self.name).ok_or_else(|| {
            Error::invalid(self.handle.logical_id(), "security group node is gone")
        })?;

        node.ingress.push(IngressRule {
            peer: graph_peer,
            protocol,
            port,
            description: description.to_string(),
        });

        Ok(())
    }
}
