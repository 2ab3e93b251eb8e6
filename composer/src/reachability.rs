use crate::error::Error;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// IPv4 range in `a.b.c.d/prefix` notation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CidrBlock {
    addr: Ipv4Addr,
    prefix: u8,
}

impl CidrBlock {
    pub fn anywhere() -> Self {
        CidrBlock {
            addr: Ipv4Addr::UNSPECIFIED,
            prefix: 0,
        }
    }

    /// A prefix of zero matches every address
    pub fn is_unrestricted(&self) -> bool {
        self.prefix == 0
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Carve the `index`-th `new_prefix`-sized block out of this range
    pub fn subnet(&self, new_prefix: u8, index: u32) -> Result<CidrBlock, String> {
        if new_prefix <= self.prefix || new_prefix > 32 {
            return Err(format!("/{new_prefix} does not subdivide {self}"));
        }

        let spare_bits = new_prefix - self.prefix;
        if spare_bits < 32 && u64::from(index) >= 1u64 << spare_bits {
            return Err(format!("{self} has no /{new_prefix} subnet #{index}"));
        }

        let block = if new_prefix == 32 {
            1
        } else {
            1u32 << (32 - new_prefix)
        };
        let network_mask = if self.prefix == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix)
        };

        let base = u32::from(self.addr) & network_mask;
        let addr = base + index * block;

        Ok(CidrBlock {
            addr: Ipv4Addr::from(addr),
            prefix: new_prefix,
        })
    }
}

impl FromStr for CidrBlock {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = value
            .split_once('/')
            .ok_or_else(|| format!("\"{value}\" is not in a.b.c.d/prefix notation"))?;

        let addr = addr
            .parse::<Ipv4Addr>()
            .map_err(|e| format!("\"{addr}\" is not an IPv4 address: {e}"))?;

        let prefix = prefix
            .parse::<u8>()
            .ok()
            .filter(|p| *p <= 32)
            .ok_or_else(|| format!("\"{prefix}\" is not a prefix length between 0 and 32"))?;

        Ok(CidrBlock { addr, prefix })
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

/// Network role of a security group
///
/// The tier drives the structural validation rule: database and isolated
/// groups must never be reachable from an unrestricted range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Public,
    Database,
    Isolated,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Public => "public",
            Tier::Database => "database",
            Tier::Isolated => "isolated",
        }
    }

    fn is_protected(&self) -> bool {
        matches!(self, Tier::Database | Tier::Isolated)
    }
}

/// Source side of an ingress rule
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Peer {
    Cidr(CidrBlock),
    /// Another security group, by its group name
    Group(String),
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::Cidr(cidr) => write!(f, "{cidr}"),
            Peer::Group(name) => write!(f, "sg:{name}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

/// One permitted reachability path, immutable once declared
#[derive(Clone, Debug)]
pub struct IngressRule {
    pub peer: Peer,
    pub protocol: Protocol,
    pub port: u16,
    pub description: String,
}

/// Security group as a node of the reachability graph
#[derive(Clone, Debug)]
pub struct GroupNode {
    pub name: String,
    pub tier: Tier,
    pub allow_all_outbound: bool,
    pub ingress: Vec<IngressRule>,
}

/// Directed graph of security groups and their ingress edges
///
/// Assembled from every stack after composition. All reachability is
/// additive: a node with no ingress rules accepts nothing.
#[derive(Clone, Debug, Default)]
pub struct ReachabilityGraph {
    nodes: Vec<GroupNode>,
}

impl ReachabilityGraph {
    pub fn new() -> Self {
        ReachabilityGraph::default()
    }

    pub fn add_node(&mut self, node: GroupNode) {
        self.nodes.push(node);
    }

    pub fn extend(&mut self, nodes: impl IntoIterator<Item = GroupNode>) {
        self.nodes.extend(nodes);
    }

    pub fn nodes(&self) -> &[GroupNode] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&GroupNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Structural policy check
    ///
    /// A database- or isolated-tier group with an ingress edge from an
    /// unrestricted CIDR is rejected outright. The underlying resource layer
    /// would happily provision it, which is exactly why the check lives here.
    pub fn validate(&self) -> Result<(), Error> {
        for node in &self.nodes {
            if !node.tier.is_protected() {
                continue;
            }

            for rule in &node.ingress {
                if let Peer::Cidr(cidr) = &rule.peer {
                    if cidr.is_unrestricted() {
                        return Err(Error::OpenIngress {
                            group: node.name.clone(),
                            tier: node.tier.as_str().to_string(),
                            peer: cidr.to_string(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}
