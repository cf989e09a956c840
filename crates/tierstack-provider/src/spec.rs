//! Request types passed to the provider collaborator.
//!
//! These carry only what the provider needs to create a resource. The
//! richer descriptors returned to callers live in the builder crates.

use std::path::PathBuf;

use serde::Serialize;
use tierstack_common::types::{Cidr, CpuArchitecture, Protocol, RegistryCredential, ResourceId};

use crate::output::Output;

/// The network a topology is built into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpcHandle {
    /// VPC identifier.
    pub id: ResourceId,
    /// Address range of the VPC.
    pub cidr_block: Cidr,
}

/// Request for a subnet.
#[derive(Debug, Clone)]
pub struct SubnetSpec {
    /// Resource name.
    pub name: String,
    /// Owning VPC.
    pub vpc_id: ResourceId,
    /// Address range.
    pub cidr_block: Cidr,
    /// Placement zone.
    pub availability_zone: String,
    /// Whether instances get a public address by default.
    pub map_public_ip_on_launch: bool,
}

/// Request for a NAT gateway.
#[derive(Debug, Clone)]
pub struct NatGatewaySpec {
    /// Resource name.
    pub name: String,
    /// Public subnet the gateway lives in.
    pub subnet_id: ResourceId,
    /// Static address the gateway translates to.
    pub allocation_id: ResourceId,
}

/// A single route entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSpec {
    /// Destination block.
    pub destination: Cidr,
    /// NAT gateway that receives matching traffic.
    pub nat_gateway_id: ResourceId,
}

/// Request for a route table.
#[derive(Debug, Clone)]
pub struct RouteTableSpec {
    /// Resource name.
    pub name: String,
    /// Owning VPC.
    pub vpc_id: ResourceId,
    /// Routes in the table.
    pub routes: Vec<RouteSpec>,
}

/// Request to bind a subnet to a route table.
#[derive(Debug, Clone)]
pub struct RouteTableAssociationSpec {
    /// Resource name.
    pub name: String,
    /// Route table being bound.
    pub route_table_id: ResourceId,
    /// Subnet being bound.
    pub subnet_id: ResourceId,
}

/// Source or destination of a security rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RulePeer {
    /// An address block.
    Cidr(Cidr),
    /// Members of another security group.
    Group(ResourceId),
    /// Members of the group the rule belongs to.
    SelfGroup,
}

/// One ingress or egress rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityRule {
    /// Matched protocol.
    pub protocol: Protocol,
    /// First port of the range.
    pub from_port: u16,
    /// Last port of the range (inclusive).
    pub to_port: u16,
    /// Peer the rule admits traffic from (ingress) or to (egress).
    pub peer: RulePeer,
}

/// Request for a security group.
#[derive(Debug, Clone)]
pub struct SecurityGroupSpec {
    /// Resource name.
    pub name: String,
    /// Owning VPC.
    pub vpc_id: ResourceId,
    /// Human-readable description.
    pub description: String,
    /// Inbound rules.
    pub ingress: Vec<SecurityRule>,
    /// Outbound rules.
    pub egress: Vec<SecurityRule>,
}

/// Request for a container registry repository.
#[derive(Debug, Clone)]
pub struct RepositorySpec {
    /// Repository name.
    pub name: String,
    /// Allow deleting the repository while it still holds images.
    pub force_delete: bool,
}

/// A created repository.
#[derive(Debug, Clone)]
pub struct RepositoryHandle {
    /// Repository identifier.
    pub id: ResourceId,
    /// Pushable repository URL.
    pub url: Output<String>,
    /// Registry the repository belongs to.
    pub registry_id: Output<String>,
}

/// Token returned by the registry's authorization endpoint.
#[derive(Debug, Clone)]
pub struct AuthorizationToken {
    /// Base64 of `username:password`.
    pub authorization_token: String,
    /// Registry endpoint the token is valid for.
    pub proxy_endpoint: String,
}

/// Request to build an image and push it to a repository.
#[derive(Debug, Clone)]
pub struct ImageBuildSpec {
    /// Resource name.
    pub name: String,
    /// Repository the image belongs to.
    pub repository_id: ResourceId,
    /// Build context directory.
    pub context: PathBuf,
    /// Dockerfile path.
    pub dockerfile: PathBuf,
    /// Repository URL to tag and push to.
    pub image_name: Output<String>,
    /// Credential used for the push.
    pub registry: Output<RegistryCredential>,
}

/// A built and (eventually) pushed image.
#[derive(Debug, Clone)]
pub struct PushedImage {
    /// Image identifier.
    pub id: ResourceId,
    /// Pullable image name, known once the push completes.
    pub image_name: Output<String>,
    /// Content-addressed reference, known once the push completes.
    pub repo_digest: Output<String>,
}

/// Request for a log group.
#[derive(Debug, Clone)]
pub struct LogGroupSpec {
    /// Log group name.
    pub name: String,
    /// Days events are kept.
    pub retention_days: u32,
}

/// Request for an IAM role.
#[derive(Debug, Clone)]
pub struct RoleSpec {
    /// Role name.
    pub name: String,
    /// JSON trust policy.
    pub assume_role_policy: String,
}

/// Request to attach a managed policy to a role.
#[derive(Debug, Clone)]
pub struct PolicyAttachmentSpec {
    /// Resource name.
    pub name: String,
    /// Role receiving the policy.
    pub role_id: ResourceId,
    /// Managed policy ARN.
    pub policy_arn: String,
}

/// Health check of a target group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheckSpec {
    /// Probed HTTP path.
    pub path: String,
    /// Probed port.
    pub port: u16,
}

/// Request for a load balancer target group.
#[derive(Debug, Clone)]
pub struct TargetGroupSpec {
    /// Resource name.
    pub name: String,
    /// Owning VPC.
    pub vpc_id: ResourceId,
    /// Port targets receive traffic on.
    pub port: u16,
    /// Target health check.
    pub health_check: HealthCheckSpec,
}

/// Request for an application load balancer.
#[derive(Debug, Clone)]
pub struct LoadBalancerSpec {
    /// Resource name.
    pub name: String,
    /// Whether the balancer is reachable only from inside the network.
    pub internal: bool,
    /// Subnets the balancer spans.
    pub subnet_ids: Vec<ResourceId>,
    /// Security groups attached to the balancer.
    pub security_group_ids: Vec<ResourceId>,
}

/// A created load balancer.
#[derive(Debug, Clone)]
pub struct LoadBalancerHandle {
    /// Balancer identifier.
    pub id: ResourceId,
    /// DNS name, known once the balancer is provisioned.
    pub dns_name: Output<String>,
}

/// Request for a listener forwarding to a target group.
#[derive(Debug, Clone)]
pub struct ListenerSpec {
    /// Resource name.
    pub name: String,
    /// Balancer the listener belongs to.
    pub load_balancer_id: ResourceId,
    /// Port the listener accepts traffic on.
    pub port: u16,
    /// Target group receiving forwarded traffic.
    pub target_group_id: ResourceId,
}

/// The single container of a task definition.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Container name.
    pub name: String,
    /// Image to run.
    pub image: Output<String>,
    /// CPU units reserved.
    pub cpu: u32,
    /// Memory (MiB) reserved.
    pub memory: u32,
    /// Whether the task stops when this container stops.
    pub essential: bool,
    /// Port the container listens on; the host port is the same.
    pub container_port: u16,
    /// Environment, in declaration order.
    pub environment: Vec<(String, Output<String>)>,
}

/// Request for a task definition.
#[derive(Debug, Clone)]
pub struct TaskDefinitionSpec {
    /// Task family.
    pub family: String,
    /// Runtime platform architecture.
    pub cpu_architecture: CpuArchitecture,
    /// Role the agent assumes to pull images and ship logs.
    pub execution_role_id: ResourceId,
    /// Log group receiving container output.
    pub log_group_id: ResourceId,
    /// The container.
    pub container: ContainerSpec,
}

/// Request for a load-balanced compute service.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    /// Service name.
    pub name: String,
    /// Cluster the service runs on.
    pub cluster_id: ResourceId,
    /// Task definition to run.
    pub task_definition_id: ResourceId,
    /// Number of replicas.
    pub desired_count: u32,
    /// Subnets tasks are placed in.
    pub subnet_ids: Vec<ResourceId>,
    /// Security groups attached to tasks.
    pub security_group_ids: Vec<ResourceId>,
    /// Whether tasks get a public address.
    pub assign_public_ip: bool,
    /// Target group tasks register with.
    pub target_group_id: ResourceId,
    /// Container registered with the target group.
    pub container_name: String,
    /// Port registered with the target group.
    pub container_port: u16,
}
