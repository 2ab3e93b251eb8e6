//! Resource constructs
//!
//! Each construct validates its parameters, applies documented defaults, and
//! registers one or more CloudFormation resources with the owning stack. The
//! caller gets back opaque handles, never the resource bodies.

pub mod aurora;
pub mod custom_resource;
pub mod ecr;
pub mod ecs_cluster;
pub mod lambda;
pub mod log_group;
pub mod secret;
pub mod security_group;
pub mod service;
pub mod task_definition;
pub mod vpc;

pub use aurora::{AuroraCluster, AuroraClusterParams};
pub use custom_resource::{CustomResource, CustomResourceParams};
pub use ecr::{EcrRepository, EcrRepositoryParams};
pub use ecs_cluster::{EcsCluster, EcsClusterParams};
pub use lambda::{LambdaFunction, LambdaFunctionParams, VpcPlacement};
pub use log_group::{LogGroup, LogGroupParams};
pub use secret::{GeneratedSecret, GeneratedSecretParams};
pub use security_group::{IngressPeer, SecurityGroup, SecurityGroupParams};
pub use service::{FargateService, FargateServiceParams};
pub use task_definition::{
    ContainerSpec, FargateTaskDefinition, FargateTaskDefinitionParams, HealthCheck,
};
pub use vpc::{Vpc, VpcParams};
