//! Load-balanced container services.
//!
//! A service runs one task definition with a single container, registers it
//! with a balancer's target group, and places its tasks on one tier of
//! subnets. Environment values are deferred outputs: a service can be
//! declared before the address it will call is known.

use std::collections::HashSet;

use tierstack_common::config::TierConfig;
use tierstack_common::constants;
use tierstack_common::error::{Result, StackError};
use tierstack_common::types::{CpuArchitecture, ResourceId, SubnetTier};
use tierstack_image::publisher::ImageReference;
use tierstack_network::security::SecurityGroupDescriptor;
use tierstack_network::topology::SubnetSet;
use tierstack_provider::spec::{ContainerSpec, ServiceSpec, TaskDefinitionSpec};
use tierstack_provider::{ComputeApi, Output};

use crate::balancer::LoadBalancerDescriptor;
use crate::iam::TaskExecution;

/// A created cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDescriptor {
    /// Cluster identifier.
    pub id: ResourceId,
    /// Declared name.
    pub name: String,
}

/// Creates a cluster.
///
/// # Errors
///
/// Returns the provider's error if the cluster cannot be created.
pub async fn create_cluster<P>(provider: &P, name: &str) -> Result<ClusterDescriptor>
where
    P: ComputeApi + ?Sized,
{
    let id = provider.create_cluster(name).await?;
    tracing::info!(id = %id, name, "cluster declared");
    Ok(ClusterDescriptor {
        id,
        name: name.into(),
    })
}

/// One container environment variable.
#[derive(Debug, Clone)]
pub struct EnvVar {
    /// Variable name.
    pub name: String,
    /// Value, possibly not known yet.
    pub value: Output<String>,
}

impl EnvVar {
    /// A variable with a value known now.
    #[must_use]
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Output::known(value.into()),
        }
    }

    /// A variable whose value resolves later.
    #[must_use]
    pub fn deferred(name: impl Into<String>, value: Output<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Container sizing and platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSettings {
    /// Container name.
    pub name: String,
    /// Runtime platform architecture.
    pub cpu_architecture: CpuArchitecture,
    /// CPU units reserved.
    pub cpu: u32,
    /// Memory (MiB) reserved.
    pub memory: u32,
    /// Port the container listens on.
    pub container_port: u16,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            name: constants::CONTAINER_NAME.into(),
            cpu_architecture: CpuArchitecture::Arm64,
            cpu: constants::DEFAULT_CONTAINER_CPU,
            memory: constants::DEFAULT_CONTAINER_MEMORY,
            container_port: constants::DEFAULT_CONTAINER_PORT,
        }
    }
}

impl From<&TierConfig> for ContainerSettings {
    fn from(tier: &TierConfig) -> Self {
        Self {
            cpu_architecture: tier.cpu_architecture,
            cpu: tier.cpu,
            memory: tier.memory,
            container_port: tier.container_port,
            ..Self::default()
        }
    }
}

/// Inputs of [`compose_service`].
#[derive(Debug, Clone)]
pub struct ServiceRequest<'a> {
    name: &'a str,
    cluster: &'a ClusterDescriptor,
    execution: &'a TaskExecution,
    image: &'a ImageReference,
    load_balancer: &'a LoadBalancerDescriptor,
    subnets: &'a SubnetSet,
    security_group: &'a SecurityGroupDescriptor,
    environment: Vec<EnvVar>,
    desired_count: u32,
    assign_public_ip: Option<bool>,
    container: ContainerSettings,
}

impl<'a> ServiceRequest<'a> {
    /// A request for one replica with default container settings.
    ///
    /// Tasks get a public address when placed on public subnets.
    #[must_use]
    pub fn new(
        name: &'a str,
        cluster: &'a ClusterDescriptor,
        execution: &'a TaskExecution,
        image: &'a ImageReference,
        load_balancer: &'a LoadBalancerDescriptor,
        subnets: &'a SubnetSet,
        security_group: &'a SecurityGroupDescriptor,
    ) -> Self {
        Self {
            name,
            cluster,
            execution,
            image,
            load_balancer,
            subnets,
            security_group,
            environment: Vec::new(),
            desired_count: 1,
            assign_public_ip: None,
            container: ContainerSettings::default(),
        }
    }

    /// Appends an environment variable.
    #[must_use]
    pub fn env(mut self, var: EnvVar) -> Self {
        self.environment.push(var);
        self
    }

    /// Sets the number of replicas.
    #[must_use]
    pub const fn desired_count(mut self, count: u32) -> Self {
        self.desired_count = count;
        self
    }

    /// Overrides whether tasks get a public address.
    #[must_use]
    pub const fn assign_public_ip(mut self, assign: bool) -> Self {
        self.assign_public_ip = Some(assign);
        self
    }

    /// Replaces the container settings.
    #[must_use]
    pub fn container(mut self, container: ContainerSettings) -> Self {
        self.container = container;
        self
    }

    fn validate(&self) -> Result<()> {
        let tier = self.subnets.tier();
        let group = self.security_group;
        if group.role.subnet_tier() != tier {
            return Err(StackError::mismatch(format!(
                "service {} places {} security group {} on {tier} subnets",
                self.name, group.role, group.id
            )));
        }
        if self.load_balancer.kind.subnet_tier() != tier {
            return Err(StackError::mismatch(format!(
                "service {} on {tier} subnets cannot register with {} load balancer {}",
                self.name, self.load_balancer.kind, self.load_balancer.name
            )));
        }
        if self.load_balancer.target_port != self.container.container_port {
            return Err(StackError::Config {
                message: format!(
                    "service {} listens on {} but load balancer {} targets port {}",
                    self.name,
                    self.container.container_port,
                    self.load_balancer.name,
                    self.load_balancer.target_port
                ),
            });
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.environment.iter().find(|v| !seen.insert(v.name.as_str())) {
            return Err(StackError::Config {
                message: format!(
                    "service {} sets environment variable {} twice",
                    self.name, dup.name
                ),
            });
        }
        Ok(())
    }
}

/// A created service.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// Service identifier.
    pub id: ResourceId,
    /// Declared name.
    pub name: String,
    /// Cluster the service runs on.
    pub cluster_id: ResourceId,
    /// Task definition the service runs.
    pub task_definition_id: ResourceId,
    /// Image the container runs.
    pub image: ImageReference,
    /// Balancer fronting the service.
    pub load_balancer_id: ResourceId,
    /// Target group tasks register with.
    pub target_group_id: ResourceId,
    /// Where tasks are placed.
    pub subnets: SubnetSet,
    /// Group attached to tasks.
    pub security_group_id: ResourceId,
    /// Number of replicas.
    pub desired_count: u32,
    /// Environment, in declaration order.
    pub environment: Vec<EnvVar>,
    /// Whether tasks get a public address.
    pub assign_public_ip: bool,
    /// Container name and sizing.
    pub container: ContainerSettings,
}

impl ServiceDescriptor {
    /// Returns the value of an environment variable.
    #[must_use]
    pub fn env(&self, name: &str) -> Option<&Output<String>> {
        self.environment
            .iter()
            .find(|v| v.name == name)
            .map(|v| &v.value)
    }
}

/// Creates the task definition and the service running it.
///
/// Never waits on the image name or environment values; they are handed
/// to the provider as they are.
///
/// # Errors
///
/// Returns `StackError::TopologyMismatch` when the security group or the
/// balancer belongs to another tier than the subnets, `StackError::Config`
/// for a port mismatch or a repeated variable, or the provider's error.
pub async fn compose_service<P>(provider: &P, request: ServiceRequest<'_>) -> Result<ServiceDescriptor>
where
    P: ComputeApi + ?Sized,
{
    request.validate()?;
    let name = request.name;
    let container = request.container.clone();

    let task_definition_id = provider
        .create_task_definition(&TaskDefinitionSpec {
            family: format!("{name}-task"),
            cpu_architecture: container.cpu_architecture,
            execution_role_id: request.execution.role_id.clone(),
            log_group_id: request.execution.log_group_id.clone(),
            container: ContainerSpec {
                name: container.name.clone(),
                image: request.image.image_name.clone(),
                cpu: container.cpu,
                memory: container.memory,
                essential: true,
                container_port: container.container_port,
                environment: request
                    .environment
                    .iter()
                    .map(|v| (v.name.clone(), v.value.clone()))
                    .collect(),
            },
        })
        .await?;

    let assign_public_ip = request
        .assign_public_ip
        .unwrap_or(request.subnets.tier() == SubnetTier::Public);
    let id = provider
        .create_service(&ServiceSpec {
            name: name.into(),
            cluster_id: request.cluster.id.clone(),
            task_definition_id: task_definition_id.clone(),
            desired_count: request.desired_count,
            subnet_ids: request.subnets.ids(),
            security_group_ids: vec![request.security_group.id.clone()],
            assign_public_ip,
            target_group_id: request.load_balancer.target_group_id.clone(),
            container_name: container.name.clone(),
            container_port: container.container_port,
        })
        .await?;

    tracing::info!(
        id = %id,
        name,
        tier = %request.subnets.tier(),
        replicas = request.desired_count,
        env = request.environment.len(),
        "service declared"
    );
    Ok(ServiceDescriptor {
        id,
        name: name.into(),
        cluster_id: request.cluster.id.clone(),
        task_definition_id,
        image: request.image.clone(),
        load_balancer_id: request.load_balancer.id.clone(),
        target_group_id: request.load_balancer.target_group_id.clone(),
        subnets: request.subnets.clone(),
        security_group_id: request.security_group.id.clone(),
        desired_count: request.desired_count,
        environment: request.environment,
        assign_public_ip,
        container,
    })
}
