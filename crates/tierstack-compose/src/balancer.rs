//! Application load balancers.
//!
//! A balancer is created together with its target group and a listener
//! forwarding to it. Internal balancers go on private subnets behind the
//! internal group; public balancers go on public subnets behind the
//! external group. Any other pairing is rejected before anything is created.

use tierstack_common::config::TierConfig;
use tierstack_common::error::{Result, StackError};
use tierstack_common::types::{LoadBalancerKind, ResourceId};
use tierstack_network::security::SecurityGroupDescriptor;
use tierstack_network::topology::SubnetSet;
use tierstack_provider::spec::{HealthCheckSpec, ListenerSpec, LoadBalancerSpec, TargetGroupSpec};
use tierstack_provider::{ComputeApi, Output};

/// Inputs of [`build_load_balancer`].
#[derive(Debug, Clone)]
pub struct LoadBalancerRequest<'a> {
    /// Balancer name; the target group and listener are named after it.
    pub name: &'a str,
    /// Internal or public.
    pub kind: LoadBalancerKind,
    /// Network the target group lives in.
    pub vpc_id: &'a ResourceId,
    /// Subnets the balancer spans.
    pub subnets: &'a SubnetSet,
    /// Groups attached to the balancer.
    pub security_groups: Vec<&'a SecurityGroupDescriptor>,
    /// Target health check.
    pub health_check: HealthCheckSpec,
    /// Port targets receive traffic on.
    pub target_port: u16,
    /// Port the listener accepts traffic on.
    pub listener_port: u16,
}

impl<'a> LoadBalancerRequest<'a> {
    /// Builds a request from a tier's settings.
    #[must_use]
    pub fn for_tier(
        tier: &'a TierConfig,
        kind: LoadBalancerKind,
        vpc_id: &'a ResourceId,
        subnets: &'a SubnetSet,
        security_groups: Vec<&'a SecurityGroupDescriptor>,
    ) -> Self {
        Self {
            name: &tier.load_balancer_name,
            kind,
            vpc_id,
            subnets,
            security_groups,
            health_check: HealthCheckSpec {
                path: tier.health_check_path.clone(),
                port: tier.health_check_port,
            },
            target_port: tier.container_port,
            listener_port: tier.listener_port,
        }
    }
}

/// A created load balancer.
#[derive(Debug, Clone)]
pub struct LoadBalancerDescriptor {
    /// Balancer identifier.
    pub id: ResourceId,
    /// Declared name.
    pub name: String,
    /// Internal or public.
    pub kind: LoadBalancerKind,
    /// DNS name, known once the balancer is provisioned.
    pub dns_name: Output<String>,
    /// Target group services register with.
    pub target_group_id: ResourceId,
    /// Listener forwarding to the target group.
    pub listener_id: ResourceId,
    /// Probed HTTP path.
    pub health_check_path: String,
    /// Probed port.
    pub health_check_port: u16,
    /// Port targets receive traffic on.
    pub target_port: u16,
    /// Port the listener accepts traffic on.
    pub listener_port: u16,
    /// Subnets the balancer spans.
    pub subnet_ids: Vec<ResourceId>,
    /// Groups attached to the balancer.
    pub security_group_ids: Vec<ResourceId>,
}

impl LoadBalancerDescriptor {
    /// Returns `http://<dns-name><path>` once the DNS name is known.
    #[must_use]
    pub fn url(&self, path: &str) -> Output<String> {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        self.dns_name.map(move |dns| format!("http://{dns}{path}"))
    }
}

fn check_placement(request: &LoadBalancerRequest<'_>) -> Result<()> {
    let kind = request.kind;
    if request.subnets.tier() != kind.subnet_tier() {
        return Err(StackError::mismatch(format!(
            "{kind} load balancer {} cannot span {} subnets",
            request.name,
            request.subnets.tier()
        )));
    }
    if request.security_groups.is_empty() {
        return Err(StackError::topology(format!(
            "load balancer {} needs at least one security group",
            request.name
        )));
    }
    if let Some(group) = request
        .security_groups
        .iter()
        .find(|g| g.role != kind.security_role())
    {
        return Err(StackError::mismatch(format!(
            "{kind} load balancer {} cannot carry {} security group {}",
            request.name, group.role, group.id
        )));
    }
    Ok(())
}

/// Creates the target group, the balancer and its listener, in that order.
///
/// # Errors
///
/// Returns `StackError::TopologyMismatch` when the subnets or groups do not
/// belong to the balancer's tier, `StackError::Topology` when no group is
/// given, or the provider's error.
pub async fn build_load_balancer<P>(
    provider: &P,
    request: &LoadBalancerRequest<'_>,
) -> Result<LoadBalancerDescriptor>
where
    P: ComputeApi + ?Sized,
{
    check_placement(request)?;
    let name = request.name;

    let target_group_id = provider
        .create_target_group(&TargetGroupSpec {
            name: format!("{name}-tg"),
            vpc_id: request.vpc_id.clone(),
            port: request.target_port,
            health_check: request.health_check.clone(),
        })
        .await?;

    let subnet_ids = request.subnets.ids();
    let security_group_ids: Vec<ResourceId> =
        request.security_groups.iter().map(|g| g.id.clone()).collect();
    let handle = provider
        .create_load_balancer(&LoadBalancerSpec {
            name: name.into(),
            internal: request.kind == LoadBalancerKind::Internal,
            subnet_ids: subnet_ids.clone(),
            security_group_ids: security_group_ids.clone(),
        })
        .await?;

    let listener_id = provider
        .create_listener(&ListenerSpec {
            name: format!("{name}-listener"),
            load_balancer_id: handle.id.clone(),
            port: request.listener_port,
            target_group_id: target_group_id.clone(),
        })
        .await?;

    tracing::info!(
        id = %handle.id,
        name,
        kind = %request.kind,
        health_check = %request.health_check.path,
        "load balancer declared"
    );
    Ok(LoadBalancerDescriptor {
        id: handle.id,
        name: name.into(),
        kind: request.kind,
        dns_name: handle.dns_name,
        target_group_id,
        listener_id,
        health_check_path: request.health_check.path.clone(),
        health_check_port: request.health_check.port,
        target_port: request.target_port,
        listener_port: request.listener_port,
        subnet_ids,
        security_group_ids,
    })
}
