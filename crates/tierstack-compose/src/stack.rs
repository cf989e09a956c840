//! The two-tier stack program.
//!
//! Checks the configuration and the subnet plan up front, then declares,
//! in dependency order: both images, the network topology, the
//! security groups, the cluster and execution resources, the internal
//! balancer and the API service behind it, then the public balancer and
//! the web service, which receives the API address as `ApiAddress`.

use std::sync::Arc;

use serde::Serialize;
use tierstack_common::config::StackConfig;
use tierstack_common::constants;
use tierstack_common::error::Result;
use tierstack_common::types::{LoadBalancerKind, ResourceId};
use tierstack_image::publisher::{ImagePublisher, ImageReference};
use tierstack_network::security::{SecurityGroups, build_security_groups};
use tierstack_network::topology::{Topology, TopologyRequest, build_topology, plan_placements};
use tierstack_provider::{CloudProvider, NetworkApi, Output};

use crate::balancer::{LoadBalancerDescriptor, LoadBalancerRequest, build_load_balancer};
use crate::iam::{TaskExecution, create_task_execution};
use crate::service::{
    ClusterDescriptor, ContainerSettings, EnvVar, ServiceDescriptor, ServiceRequest,
    compose_service, create_cluster,
};

/// One deployed tier.
#[derive(Debug, Clone)]
pub struct TierDeployment {
    /// Published image.
    pub image: ImageReference,
    /// Balancer fronting the tier.
    pub load_balancer: LoadBalancerDescriptor,
    /// Service running the image.
    pub service: ServiceDescriptor,
}

/// Everything a stack declared, plus its exported values.
#[derive(Debug, Clone)]
pub struct StackOutputs {
    /// Public entry point: `http://<public-dns>/`.
    pub url: Output<String>,
    /// API health endpoint: `http://<internal-dns><api-health-path>`.
    pub api_url: Output<String>,
    /// The network.
    pub topology: Topology,
    /// Both security groups.
    pub security_groups: SecurityGroups,
    /// The cluster both services run on.
    pub cluster: ClusterDescriptor,
    /// Execution role and log group.
    pub execution: TaskExecution,
    /// Internal API tier.
    pub api: TierDeployment,
    /// Public web tier.
    pub web: TierDeployment,
}

/// Exported values once every deferred input has resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedOutputs {
    /// Public entry point.
    pub url: String,
    /// API health endpoint.
    pub api_url: String,
    /// Pushed API image.
    pub api_image: String,
    /// Pushed web image.
    pub web_image: String,
}

impl StackOutputs {
    /// Waits for every exported value.
    ///
    /// # Errors
    ///
    /// Returns `StackError::Deferred` wrapping the first failed value.
    pub async fn resolve(&self) -> Result<ResolvedOutputs> {
        Ok(ResolvedOutputs {
            url: self.url.resolve().await?,
            api_url: self.api_url.resolve().await?,
            api_image: self.api.image.image_name.resolve().await?,
            web_image: self.web.image.image_name.resolve().await?,
        })
    }
}

/// Declares the full two-tier stack described by `config`.
///
/// Returns as soon as every resource is declared; deferred values (DNS
/// names, image names, URLs) resolve once the provider settles them.
///
/// # Errors
///
/// Returns the first error of any step. Nothing after the failing step is
/// declared.
pub async fn declare_stack<P>(provider: Arc<P>, config: &StackConfig) -> Result<StackOutputs>
where
    P: CloudProvider + ?Sized + 'static,
{
    config.validate()?;
    tracing::info!(project = %config.project, region = %config.region, "declaring stack");

    let vpc = match &config.vpc_id {
        Some(id) => provider.vpc(&ResourceId::new(id.as_str())).await?,
        None => provider.default_vpc().await?,
    };
    let availability_zones = if config.availability_zones.is_empty() {
        provider.availability_zones().await?
    } else {
        config.availability_zones.clone()
    };
    let topology_request = TopologyRequest {
        name: config.project.clone(),
        vpc: vpc.clone(),
        public_cidrs: config.public_subnets.clone(),
        private_cidrs: config.private_subnets.clone(),
        availability_zones,
    };
    // Blocks outside the VPC range fail here, before anything is declared.
    let _ = plan_placements(&topology_request)?;

    let publisher = ImagePublisher::new(Arc::clone(&provider));
    let api_image = publisher
        .publish(&config.api.repository, &config.build_context)
        .await?;
    let web_image = publisher
        .publish(&config.web.repository, &config.build_context)
        .await?;

    let topology = build_topology(provider.as_ref(), &topology_request).await?;
    let security_groups =
        build_security_groups(provider.as_ref(), &config.project, &vpc, &config.external_ingress)
            .await?;

    let cluster = create_cluster(provider.as_ref(), &config.scoped("cluster")).await?;
    let execution =
        create_task_execution(provider.as_ref(), &config.project, config.log_retention_days)
            .await?;

    // ── API tier: private subnets, internal group, internal balancer ──
    let private = topology.private_set()?;
    let internal = security_groups.internal.descriptor();
    let api_lb = build_load_balancer(
        provider.as_ref(),
        &LoadBalancerRequest::for_tier(
            &config.api,
            LoadBalancerKind::Internal,
            &vpc.id,
            &private,
            vec![internal],
        ),
    )
    .await?;
    let api_service = compose_service(
        provider.as_ref(),
        ServiceRequest::new(
            &config.api.service_name,
            &cluster,
            &execution,
            &api_image,
            &api_lb,
            &private,
            internal,
        )
        .container(ContainerSettings::from(&config.api))
        .desired_count(config.api.desired_count),
    )
    .await?;
    let api_url = api_lb.url(&config.api.health_check_path);

    // ── Web tier: public subnets, external group, public balancer ──
    let public = topology.public_set()?;
    let external = security_groups.external.descriptor();
    let web_lb = build_load_balancer(
        provider.as_ref(),
        &LoadBalancerRequest::for_tier(
            &config.web,
            LoadBalancerKind::Public,
            &vpc.id,
            &public,
            vec![external],
        ),
    )
    .await?;
    let web_service = compose_service(
        provider.as_ref(),
        ServiceRequest::new(
            &config.web.service_name,
            &cluster,
            &execution,
            &web_image,
            &web_lb,
            &public,
            external,
        )
        .container(ContainerSettings::from(&config.web))
        .desired_count(config.web.desired_count)
        .env(EnvVar::deferred(constants::API_ADDRESS_ENV, api_url.clone())),
    )
    .await?;
    let url = web_lb.url(constants::WEB_HEALTH_CHECK_PATH);

    tracing::info!(project = %config.project, "stack declared");
    Ok(StackOutputs {
        url,
        api_url,
        topology,
        security_groups,
        cluster,
        execution,
        api: TierDeployment {
            image: api_image,
            load_balancer: api_lb,
            service: api_service,
        },
        web: TierDeployment {
            image: web_image,
            load_balancer: web_lb,
            service: web_service,
        },
    })
}
