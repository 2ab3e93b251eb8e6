use crate::config::Config;
use composer::constructs::{IngressPeer, SecurityGroup, SecurityGroupParams, Vpc, VpcParams};
use composer::reachability::{CidrBlock, Protocol, Tier};
use composer::{App, Error, Stack};

/// VPC, subnet tiers, and the three security groups of the mesh
///
/// Reachability is declared here once: the public tier takes HTTP from
/// anywhere, the database tier takes MySQL from the public tier and the
/// db-init function only, and the function tier takes nothing.
pub fn stack(app: &App, config: &Config) -> Result<Stack, Error> {
    let mut stack = app.begin_stack("network");

    let cidr: CidrBlock = config
        .cidr()
        .parse()
        .map_err(|reason: String| Error::invalid("Network", reason))?;
    let flow_log_group = format!("{}-flow-logs", stack.name());

    let vpc = Vpc::new(
        &mut stack,
        "Mesh",
        VpcParams {
            cidr,
            max_azs: Some(config.max_azs()),
            flow_log_group: &flow_log_group,
            flow_log_retention_days: None,
        },
    )?;

    let public = SecurityGroup::new(
        &mut stack,
        "Public",
        SecurityGroupParams {
            name: &app.naming().name("public-sg"),
            description: "Service containers reachable from the internet",
            vpc: vpc.handle().ref_(),
            tier: Tier::Public,
            allow_all_outbound: None,
        },
    )?;

    let database = SecurityGroup::new(
        &mut stack,
        "Database",
        SecurityGroupParams {
            name: &app.naming().name("database-sg"),
            description: "Aurora cluster in the isolated tier",
            vpc: vpc.handle().ref_(),
            tier: Tier::Database,
            allow_all_outbound: None,
        },
    )?;

    let function = SecurityGroup::new(
        &mut stack,
        "Function",
        SecurityGroupParams {
            name: &app.naming().name("function-sg"),
            description: "db-init function in the private tier",
            vpc: vpc.handle().ref_(),
            tier: Tier::Isolated,
            allow_all_outbound: None,
        },
    )?;

    public.allow_from(
        &mut stack,
        IngressPeer::Cidr(CidrBlock::anywhere()),
        Protocol::Tcp,
        80,
        "HTTP from anywhere",
    )?;
    database.allow_from(
        &mut stack,
        IngressPeer::Group(&public),
        Protocol::Tcp,
        3306,
        "MySQL from the public service tier",
    )?;
    database.allow_from(
        &mut stack,
        IngressPeer::Group(&function),
        Protocol::Tcp,
        3306,
        "MySQL from the db-init function",
    )?;

    stack.output("VpcId", vpc.handle().ref_(), "Mesh VPC id")?;

    let tiers = [
        ("PublicSubnet", vpc.public_subnets()),
        ("PrivateSubnet", vpc.private_subnets()),
        ("IsolatedSubnet", vpc.isolated_subnets()),
    ];
    for (prefix, subnets) in tiers {
        for (az, subnet) in subnets.iter().enumerate() {
            stack.output(
                &format!("{prefix}{az}"),
                subnet.ref_(),
                &format!("{prefix} in AZ {az}"),
            )?;
        }
    }

    stack.output(
        "PublicSecurityGroupId",
        public.group_id(),
        "Security group of the public service tier",
    )?;
    stack.output(
        "DatabaseSecurityGroupId",
        database.group_id(),
        "Security group of the Aurora cluster",
    )?;
    stack.output(
        "FunctionSecurityGroupId",
        function.group_id(),
        "Security group of the db-init function",
    )?;

    Ok(stack)
}
