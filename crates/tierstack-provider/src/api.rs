//! Cloud provider collaborator traits.
//!
//! Stack construction consumes these contracts and never reimplements
//! them. Each trait covers one concern so a test double only has to
//! implement what the code under test touches.

use async_trait::async_trait;
use tierstack_common::error::Result;
use tierstack_common::types::ResourceId;

use crate::spec::{
    AuthorizationToken, ImageBuildSpec, ListenerSpec, LoadBalancerHandle, LoadBalancerSpec,
    LogGroupSpec, NatGatewaySpec, PolicyAttachmentSpec, PushedImage, RepositoryHandle,
    RepositorySpec, RoleSpec, RouteTableAssociationSpec, RouteTableSpec, SecurityGroupSpec,
    ServiceSpec, SubnetSpec, TargetGroupSpec, TaskDefinitionSpec, VpcHandle,
};

/// Container registry operations.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Creates (or adopts) a repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be created.
    async fn create_repository(&self, spec: &RepositorySpec) -> Result<RepositoryHandle>;

    /// Fetches a short-lived authorization token for a registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the token request fails.
    async fn authorization_token(&self, registry_id: &str) -> Result<AuthorizationToken>;
}

/// Image build and push mechanics.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Declares an image build whose push waits for the spec's deferred
    /// repository URL and credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the build cannot be declared.
    async fn build_and_push(&self, spec: ImageBuildSpec) -> Result<PushedImage>;
}

/// Virtual network operations.
#[async_trait]
pub trait NetworkApi: Send + Sync {
    /// Returns the account's default VPC.
    ///
    /// # Errors
    ///
    /// Returns an error if no default VPC exists.
    async fn default_vpc(&self) -> Result<VpcHandle>;

    /// Looks up a VPC by id.
    ///
    /// # Errors
    ///
    /// Returns `StackError::NotFound` if the VPC does not exist.
    async fn vpc(&self, id: &ResourceId) -> Result<VpcHandle>;

    /// Lists the zones available in the region.
    ///
    /// # Errors
    ///
    /// Returns an error if the zones cannot be listed.
    async fn availability_zones(&self) -> Result<Vec<String>>;

    /// Creates a subnet.
    ///
    /// # Errors
    ///
    /// Returns an error if the VPC is unknown or the block is unavailable.
    async fn create_subnet(&self, spec: &SubnetSpec) -> Result<ResourceId>;

    /// Allocates a static public address.
    ///
    /// # Errors
    ///
    /// Returns an error if no address can be allocated.
    async fn allocate_address(&self, name: &str) -> Result<ResourceId>;

    /// Creates a NAT gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the subnet or address is unknown.
    async fn create_nat_gateway(&self, spec: &NatGatewaySpec) -> Result<ResourceId>;

    /// Creates a route table.
    ///
    /// # Errors
    ///
    /// Returns an error if a route target is unknown.
    async fn create_route_table(&self, spec: &RouteTableSpec) -> Result<ResourceId>;

    /// Binds a subnet to a route table.
    ///
    /// # Errors
    ///
    /// Returns an error if either side is unknown.
    async fn associate_route_table(&self, spec: &RouteTableAssociationSpec) -> Result<ResourceId>;

    /// Creates a security group with its rules.
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced group is unknown.
    async fn create_security_group(&self, spec: &SecurityGroupSpec) -> Result<ResourceId>;
}

/// Container orchestration, load balancing, logging, and IAM operations.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Creates a container cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster cannot be created.
    async fn create_cluster(&self, name: &str) -> Result<ResourceId>;

    /// Creates a log group.
    ///
    /// # Errors
    ///
    /// Returns an error if the log group cannot be created.
    async fn create_log_group(&self, spec: &LogGroupSpec) -> Result<ResourceId>;

    /// Creates an IAM role.
    ///
    /// # Errors
    ///
    /// Returns an error if the trust policy is rejected.
    async fn create_role(&self, spec: &RoleSpec) -> Result<ResourceId>;

    /// Attaches a managed policy to a role.
    ///
    /// # Errors
    ///
    /// Returns an error if the role is unknown.
    async fn attach_role_policy(&self, spec: &PolicyAttachmentSpec) -> Result<ResourceId>;

    /// Creates a target group.
    ///
    /// # Errors
    ///
    /// Returns an error if the VPC is unknown.
    async fn create_target_group(&self, spec: &TargetGroupSpec) -> Result<ResourceId>;

    /// Creates a load balancer.
    ///
    /// # Errors
    ///
    /// Returns an error if a subnet or security group is unknown.
    async fn create_load_balancer(&self, spec: &LoadBalancerSpec) -> Result<LoadBalancerHandle>;

    /// Creates a listener on a load balancer.
    ///
    /// # Errors
    ///
    /// Returns an error if the balancer or target group is unknown.
    async fn create_listener(&self, spec: &ListenerSpec) -> Result<ResourceId>;

    /// Registers a task definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the role or log group is unknown.
    async fn create_task_definition(&self, spec: &TaskDefinitionSpec) -> Result<ResourceId>;

    /// Creates a service running a task definition.
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced resource is unknown.
    async fn create_service(&self, spec: &ServiceSpec) -> Result<ResourceId>;
}

/// Everything a full stack needs from a provider.
pub trait CloudProvider: RegistryApi + ImageBuilder + NetworkApi + ComputeApi {}

impl<T> CloudProvider for T where T: RegistryApi + ImageBuilder + NetworkApi + ComputeApi {}
