//! In-memory recording provider.
//!
//! Implements every collaborator trait against a ledger instead of a real
//! cloud. Ids are generated, references are checked, and attributes a real
//! provider only knows after creation (DNS names, repository URLs,
//! registry ids) stay pending until [`MemoryProvider::settle`] is called.
//! The ledger can be snapshotted with [`MemoryProvider::records`].

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tierstack_common::constants;
use tierstack_common::error::{Result, StackError};
use tierstack_common::types::{Cidr, ResourceId};
use tokio::sync::Mutex;

use crate::api::{ComputeApi, ImageBuilder, NetworkApi, RegistryApi};
use crate::output::{Output, Resolver};
use crate::record::{ResourceKind, ResourceRecord};
use crate::spec::{
    AuthorizationToken, ImageBuildSpec, ListenerSpec, LoadBalancerHandle, LoadBalancerSpec,
    LogGroupSpec, NatGatewaySpec, PolicyAttachmentSpec, PushedImage, RepositoryHandle,
    RepositorySpec, RoleSpec, RouteTableAssociationSpec, RouteTableSpec, RulePeer,
    SecurityGroupSpec, ServiceSpec, SubnetSpec, TargetGroupSpec, TaskDefinitionSpec, VpcHandle,
};

type Properties = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone)]
struct Settings {
    region: String,
    account_id: String,
    default_vpc: VpcHandle,
    zones: Vec<String>,
    token_override: Option<String>,
}

#[derive(Debug)]
struct Entry {
    record: ResourceRecord,
    deferred: Vec<(String, Output<String>)>,
}

#[derive(Debug, Default)]
struct Ledger {
    entries: Vec<Entry>,
    pending: Vec<(Resolver<String>, String)>,
    subnet_blocks: Vec<(ResourceId, Cidr)>,
    associated_subnets: HashSet<ResourceId>,
    token_fetches: usize,
}

/// A resource about to be written to the ledger.
struct Declaration {
    kind: ResourceKind,
    name: String,
    depends_on: Vec<ResourceId>,
    properties: Properties,
    deferred: Vec<(String, Output<String>)>,
}

impl Declaration {
    fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            depends_on: Vec::new(),
            properties: Properties::new(),
            deferred: Vec::new(),
        }
    }

    fn depends_on<'a>(mut self, ids: impl IntoIterator<Item = &'a ResourceId>) -> Self {
        for id in ids {
            if !self.depends_on.contains(id) {
                self.depends_on.push(id.clone());
            }
        }
        self
    }

    fn property(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        let _ = self.properties.insert(key.into(), value.into());
        self
    }

    fn deferred(mut self, key: &str, value: &Output<String>) -> Self {
        self.deferred.push((key.into(), value.clone()));
        self
    }
}

impl Entry {
    fn output(&self, key: &str) -> Option<Output<String>> {
        self.deferred
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.clone())
    }
}

impl Ledger {
    fn find(&self, id: &ResourceId) -> Option<&Entry> {
        self.entries.iter().find(|e| &e.record.id == id)
    }

    fn named(&self, kind: ResourceKind, name: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.record.kind == kind && e.record.name == name)
    }

    fn require(&self, id: &ResourceId, kind: ResourceKind) -> Result<()> {
        match self.find(id) {
            Some(entry) if entry.record.kind == kind => Ok(()),
            _ => Err(StackError::NotFound {
                kind: kind.label(),
                id: id.to_string(),
            }),
        }
    }

    fn require_all<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a ResourceId>,
        kind: ResourceKind,
    ) -> Result<()> {
        ids.into_iter().try_for_each(|id| self.require(id, kind))
    }

    fn declare(&mut self, declaration: Declaration) -> Result<ResourceId> {
        let duplicate = self
            .entries
            .iter()
            .any(|e| e.record.kind == declaration.kind && e.record.name == declaration.name);
        if duplicate {
            return Err(StackError::Config {
                message: format!(
                    "duplicate {} name \"{}\"",
                    declaration.kind, declaration.name
                ),
            });
        }

        let id = ResourceId::generate(declaration.kind.id_prefix());
        tracing::debug!(kind = %declaration.kind, id = %id, name = %declaration.name, "resource declared");
        self.entries.push(Entry {
            record: ResourceRecord {
                id: id.clone(),
                kind: declaration.kind,
                name: declaration.name,
                depends_on: declaration.depends_on,
                properties: declaration.properties,
                created_at: Utc::now(),
            },
            deferred: declaration.deferred,
        });
        Ok(id)
    }

    /// A value the provider will only reveal at settle time.
    fn defer(&mut self, value: String) -> Output<String> {
        let (output, resolver) = Output::pending();
        self.pending.push((resolver, value));
        output
    }

    fn annotate(&mut self, id: &ResourceId, key: &str, value: impl Into<serde_json::Value>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| &e.record.id == id) {
            let _ = entry.record.properties.insert(key.into(), value.into());
        }
    }
}

/// Recording provider backed by an in-memory ledger.
#[derive(Debug, Clone)]
pub struct MemoryProvider {
    ledger: Arc<Mutex<Ledger>>,
    settings: Arc<Settings>,
}

impl MemoryProvider {
    /// Creates a provider for a region with a default VPC and three zones.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        let region = region.into();
        let default_vpc = VpcHandle {
            id: ResourceId::generate(ResourceKind::Vpc.id_prefix()),
            cidr_block: constants::DEFAULT_VPC_CIDR
                .parse()
                .unwrap_or(Cidr::ANYWHERE),
        };
        let zones = ["a", "b", "c"]
            .iter()
            .map(|suffix| format!("{region}{suffix}"))
            .collect();

        let mut ledger = Ledger::default();
        ledger.entries.push(Entry {
            record: ResourceRecord {
                id: default_vpc.id.clone(),
                kind: ResourceKind::Vpc,
                name: "default".into(),
                depends_on: Vec::new(),
                properties: Declaration::new(ResourceKind::Vpc, "default")
                    .property("cidr_block", default_vpc.cidr_block.to_string())
                    .property("default", true)
                    .properties,
                created_at: Utc::now(),
            },
            deferred: Vec::new(),
        });

        Self {
            ledger: Arc::new(Mutex::new(ledger)),
            settings: Arc::new(Settings {
                region,
                account_id: "000000000000".into(),
                default_vpc,
                zones,
                token_override: None,
            }),
        }
    }

    /// Uses a specific account id for registry ids and URLs.
    #[must_use]
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.settings).account_id = account_id.into();
        self
    }

    /// Replaces the zones reported by [`NetworkApi::availability_zones`].
    #[must_use]
    pub fn with_availability_zones(mut self, zones: Vec<String>) -> Self {
        Arc::make_mut(&mut self.settings).zones = zones;
        self
    }

    /// Serves this raw (already encoded) token from the authorization endpoint.
    #[must_use]
    pub fn with_authorization_token(mut self, token: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.settings).token_override = Some(token.into());
        self
    }

    /// Returns the region this provider simulates.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.settings.region
    }

    /// Resolves every attribute still pending, returning how many were settled.
    pub async fn settle(&self) -> usize {
        let pending = std::mem::take(&mut self.ledger.lock().await.pending);
        let count = pending.len();
        for (resolver, value) in pending {
            resolver.resolve(value);
        }
        tracing::debug!(count, "deferred attributes settled");
        count
    }

    /// Returns a snapshot of every declared resource, in declaration order.
    pub async fn records(&self) -> Vec<ResourceRecord> {
        let ledger = self.ledger.lock().await;
        ledger
            .entries
            .iter()
            .map(|entry| {
                let mut record = entry.record.clone();
                for (key, value) in &entry.deferred {
                    let _ = record
                        .properties
                        .insert(key.clone(), value.to_string().into());
                }
                record
            })
            .collect()
    }

    /// Returns how many authorization tokens have been handed out.
    pub async fn token_fetches(&self) -> usize {
        self.ledger.lock().await.token_fetches
    }

    /// Returns the snapshot filtered to one kind.
    pub async fn records_of(&self, kind: ResourceKind) -> Vec<ResourceRecord> {
        self.records()
            .await
            .into_iter()
            .filter(|r| r.kind == kind)
            .collect()
    }

    fn registry_host(&self) -> String {
        format!(
            "{}.dkr.ecr.{}.amazonaws.com",
            self.settings.account_id, self.settings.region
        )
    }
}

#[async_trait]
impl RegistryApi for MemoryProvider {
    async fn create_repository(&self, spec: &RepositorySpec) -> Result<RepositoryHandle> {
        let mut ledger = self.ledger.lock().await;
        if let Some(entry) = ledger.named(ResourceKind::Repository, &spec.name) {
            if let (Some(url), Some(registry_id)) =
                (entry.output("repository_url"), entry.output("registry_id"))
            {
                tracing::debug!(id = %entry.record.id, name = %spec.name, "repository reused");
                return Ok(RepositoryHandle {
                    id: entry.record.id.clone(),
                    url,
                    registry_id,
                });
            }
        }
        let url = ledger.defer(format!("{}/{}", self.registry_host(), spec.name));
        let registry_id = ledger.defer(self.settings.account_id.clone());
        let id = ledger.declare(
            Declaration::new(ResourceKind::Repository, &spec.name)
                .property("force_delete", spec.force_delete)
                .deferred("repository_url", &url)
                .deferred("registry_id", &registry_id),
        )?;
        Ok(RepositoryHandle {
            id,
            url,
            registry_id,
        })
    }

    async fn authorization_token(&self, registry_id: &str) -> Result<AuthorizationToken> {
        if registry_id != self.settings.account_id {
            return Err(StackError::NotFound {
                kind: "registry",
                id: registry_id.into(),
            });
        }
        self.ledger.lock().await.token_fetches += 1;
        let authorization_token = self.settings.token_override.clone().unwrap_or_else(|| {
            let secret = uuid::Uuid::new_v4().simple().to_string();
            STANDARD.encode(format!("{}:{secret}", constants::REGISTRY_USERNAME))
        });
        Ok(AuthorizationToken {
            authorization_token,
            proxy_endpoint: format!("https://{}", self.registry_host()),
        })
    }
}

#[async_trait]
impl ImageBuilder for MemoryProvider {
    async fn build_and_push(&self, spec: ImageBuildSpec) -> Result<PushedImage> {
        let id = {
            let mut ledger = self.ledger.lock().await;
            ledger.require(&spec.repository_id, ResourceKind::Repository)?;
            let existing = ledger
                .named(ResourceKind::Image, &spec.name)
                .filter(|e| e.record.depends_on.contains(&spec.repository_id))
                .map(|e| e.record.id.clone());
            match existing {
                Some(id) => {
                    tracing::debug!(id = %id, name = %spec.name, "image pushed again");
                    id
                }
                None => ledger.declare(
                    Declaration::new(ResourceKind::Image, &spec.name)
                        .depends_on([&spec.repository_id])
                        .property("context", spec.context.display().to_string())
                        .property("dockerfile", spec.dockerfile.display().to_string()),
                )?,
            }
        };

        let ledger = Arc::clone(&self.ledger);
        let image_id = id.clone();
        let dockerfile = spec.dockerfile.display().to_string();
        let image_name = spec
            .registry
            .zip(&spec.image_name)
            .then(move |(credential, url)| async move {
                let mut ledger = ledger.lock().await;
                ledger.annotate(&image_id, "registry_server", credential.server);
                ledger.annotate(&image_id, "pushed_as", credential.username);
                Ok(format!("{url}:latest"))
            });
        let repo_digest = image_name.map(move |name| {
            let repository = name.trim_end_matches(":latest").to_string();
            let digest = Sha256::digest(format!("{name}\n{dockerfile}").as_bytes());
            format!("{repository}@sha256:{digest:x}")
        });

        let mut ledger = self.ledger.lock().await;
        if let Some(entry) = ledger.entries.iter_mut().find(|e| e.record.id == id) {
            entry
                .deferred
                .retain(|(key, _)| key != "image_name" && key != "repo_digest");
            entry.deferred.push(("image_name".into(), image_name.clone()));
            entry.deferred.push(("repo_digest".into(), repo_digest.clone()));
        }
        Ok(PushedImage {
            id,
            image_name,
            repo_digest,
        })
    }
}

#[async_trait]
impl NetworkApi for MemoryProvider {
    async fn default_vpc(&self) -> Result<VpcHandle> {
        Ok(self.settings.default_vpc.clone())
    }

    async fn vpc(&self, id: &ResourceId) -> Result<VpcHandle> {
        if *id == self.settings.default_vpc.id {
            return Ok(self.settings.default_vpc.clone());
        }
        Err(StackError::NotFound {
            kind: ResourceKind::Vpc.label(),
            id: id.to_string(),
        })
    }

    async fn availability_zones(&self) -> Result<Vec<String>> {
        Ok(self.settings.zones.clone())
    }

    async fn create_subnet(&self, spec: &SubnetSpec) -> Result<ResourceId> {
        let vpc = self.vpc(&spec.vpc_id).await?;
        if !vpc.cidr_block.contains(&spec.cidr_block) {
            return Err(StackError::Provider {
                operation: "create_subnet",
                message: format!("{} is outside VPC range {}", spec.cidr_block, vpc.cidr_block),
            });
        }
        if !self.settings.zones.contains(&spec.availability_zone) {
            return Err(StackError::Provider {
                operation: "create_subnet",
                message: format!("unknown availability zone {}", spec.availability_zone),
            });
        }

        let mut ledger = self.ledger.lock().await;
        if let Some((other, _)) = ledger
            .subnet_blocks
            .iter()
            .find(|(_, block)| block.overlaps(&spec.cidr_block))
        {
            return Err(StackError::Provider {
                operation: "create_subnet",
                message: format!("{} conflicts with subnet {other}", spec.cidr_block),
            });
        }
        let id = ledger.declare(
            Declaration::new(ResourceKind::Subnet, &spec.name)
                .depends_on([&spec.vpc_id])
                .property("cidr_block", spec.cidr_block.to_string())
                .property("availability_zone", spec.availability_zone.clone())
                .property("map_public_ip_on_launch", spec.map_public_ip_on_launch),
        )?;
        ledger.subnet_blocks.push((id.clone(), spec.cidr_block));
        Ok(id)
    }

    async fn allocate_address(&self, name: &str) -> Result<ResourceId> {
        let mut ledger = self.ledger.lock().await;
        let host = ledger.entries.len() % 254 + 1;
        ledger.declare(
            Declaration::new(ResourceKind::ElasticIp, name)
                .property("public_ip", format!("203.0.113.{host}")),
        )
    }

    async fn create_nat_gateway(&self, spec: &NatGatewaySpec) -> Result<ResourceId> {
        let mut ledger = self.ledger.lock().await;
        ledger.require(&spec.subnet_id, ResourceKind::Subnet)?;
        ledger.require(&spec.allocation_id, ResourceKind::ElasticIp)?;
        ledger.declare(
            Declaration::new(ResourceKind::NatGateway, &spec.name)
                .depends_on([&spec.subnet_id, &spec.allocation_id])
                .property("subnet_id", spec.subnet_id.to_string())
                .property("allocation_id", spec.allocation_id.to_string()),
        )
    }

    async fn create_route_table(&self, spec: &RouteTableSpec) -> Result<ResourceId> {
        let _ = self.vpc(&spec.vpc_id).await?;
        let routes = serde_json::to_value(&spec.routes)?;
        let mut ledger = self.ledger.lock().await;
        ledger.require_all(
            spec.routes.iter().map(|r| &r.nat_gateway_id),
            ResourceKind::NatGateway,
        )?;
        ledger.declare(
            Declaration::new(ResourceKind::RouteTable, &spec.name)
                .depends_on([&spec.vpc_id])
                .depends_on(spec.routes.iter().map(|r| &r.nat_gateway_id))
                .property("routes", routes),
        )
    }

    async fn associate_route_table(&self, spec: &RouteTableAssociationSpec) -> Result<ResourceId> {
        let mut ledger = self.ledger.lock().await;
        ledger.require(&spec.route_table_id, ResourceKind::RouteTable)?;
        ledger.require(&spec.subnet_id, ResourceKind::Subnet)?;
        if ledger.associated_subnets.contains(&spec.subnet_id) {
            return Err(StackError::Provider {
                operation: "associate_route_table",
                message: format!("subnet {} already has a route table", spec.subnet_id),
            });
        }
        let id = ledger.declare(
            Declaration::new(ResourceKind::RouteTableAssociation, &spec.name)
                .depends_on([&spec.route_table_id, &spec.subnet_id])
                .property("route_table_id", spec.route_table_id.to_string())
                .property("subnet_id", spec.subnet_id.to_string()),
        )?;
        let _ = ledger.associated_subnets.insert(spec.subnet_id.clone());
        Ok(id)
    }

    async fn create_security_group(&self, spec: &SecurityGroupSpec) -> Result<ResourceId> {
        let _ = self.vpc(&spec.vpc_id).await?;
        let peers: Vec<&ResourceId> = spec
            .ingress
            .iter()
            .chain(&spec.egress)
            .filter_map(|rule| match &rule.peer {
                RulePeer::Group(id) => Some(id),
                RulePeer::Cidr(_) | RulePeer::SelfGroup => None,
            })
            .collect();
        let ingress = serde_json::to_value(&spec.ingress)?;
        let egress = serde_json::to_value(&spec.egress)?;

        let mut ledger = self.ledger.lock().await;
        ledger.require_all(peers.iter().copied(), ResourceKind::SecurityGroup)?;
        ledger.declare(
            Declaration::new(ResourceKind::SecurityGroup, &spec.name)
                .depends_on([&spec.vpc_id])
                .depends_on(peers)
                .property("description", spec.description.clone())
                .property("ingress", ingress)
                .property("egress", egress),
        )
    }
}

#[async_trait]
impl ComputeApi for MemoryProvider {
    async fn create_cluster(&self, name: &str) -> Result<ResourceId> {
        self.ledger
            .lock()
            .await
            .declare(Declaration::new(ResourceKind::Cluster, name))
    }

    async fn create_log_group(&self, spec: &LogGroupSpec) -> Result<ResourceId> {
        self.ledger.lock().await.declare(
            Declaration::new(ResourceKind::LogGroup, &spec.name)
                .property("retention_days", spec.retention_days),
        )
    }

    async fn create_role(&self, spec: &RoleSpec) -> Result<ResourceId> {
        let policy: serde_json::Value =
            serde_json::from_str(&spec.assume_role_policy).map_err(|e| StackError::Provider {
                operation: "create_role",
                message: format!("malformed trust policy: {e}"),
            })?;
        self.ledger.lock().await.declare(
            Declaration::new(ResourceKind::Role, &spec.name).property("assume_role_policy", policy),
        )
    }

    async fn attach_role_policy(&self, spec: &PolicyAttachmentSpec) -> Result<ResourceId> {
        let mut ledger = self.ledger.lock().await;
        ledger.require(&spec.role_id, ResourceKind::Role)?;
        ledger.declare(
            Declaration::new(ResourceKind::RolePolicyAttachment, &spec.name)
                .depends_on([&spec.role_id])
                .property("policy_arn", spec.policy_arn.clone()),
        )
    }

    async fn create_target_group(&self, spec: &TargetGroupSpec) -> Result<ResourceId> {
        let _ = self.vpc(&spec.vpc_id).await?;
        let health_check = serde_json::to_value(&spec.health_check)?;
        self.ledger.lock().await.declare(
            Declaration::new(ResourceKind::TargetGroup, &spec.name)
                .depends_on([&spec.vpc_id])
                .property("port", spec.port)
                .property("protocol", "HTTP")
                .property("target_type", "ip")
                .property("health_check", health_check),
        )
    }

    async fn create_load_balancer(&self, spec: &LoadBalancerSpec) -> Result<LoadBalancerHandle> {
        if spec.subnet_ids.is_empty() {
            return Err(StackError::Provider {
                operation: "create_load_balancer",
                message: format!("load balancer {} needs at least one subnet", spec.name),
            });
        }
        let mut ledger = self.ledger.lock().await;
        ledger.require_all(&spec.subnet_ids, ResourceKind::Subnet)?;
        ledger.require_all(&spec.security_group_ids, ResourceKind::SecurityGroup)?;

        let serial = uuid::Uuid::new_v4().as_u128() % 10_000_000_000;
        let scheme = if spec.internal { "internal-" } else { "" };
        let dns_name = ledger.defer(format!(
            "{scheme}{}-{serial}.{}.elb.amazonaws.com",
            spec.name.to_lowercase(),
            self.settings.region
        ));
        let id = ledger.declare(
            Declaration::new(ResourceKind::LoadBalancer, &spec.name)
                .depends_on(&spec.subnet_ids)
                .depends_on(&spec.security_group_ids)
                .property("internal", spec.internal)
                .deferred("dns_name", &dns_name),
        )?;
        Ok(LoadBalancerHandle { id, dns_name })
    }

    async fn create_listener(&self, spec: &ListenerSpec) -> Result<ResourceId> {
        let mut ledger = self.ledger.lock().await;
        ledger.require(&spec.load_balancer_id, ResourceKind::LoadBalancer)?;
        ledger.require(&spec.target_group_id, ResourceKind::TargetGroup)?;
        ledger.declare(
            Declaration::new(ResourceKind::Listener, &spec.name)
                .depends_on([&spec.load_balancer_id, &spec.target_group_id])
                .property("port", spec.port)
                .property("protocol", "HTTP"),
        )
    }

    async fn create_task_definition(&self, spec: &TaskDefinitionSpec) -> Result<ResourceId> {
        let mut ledger = self.ledger.lock().await;
        ledger.require(&spec.execution_role_id, ResourceKind::Role)?;
        ledger.require(&spec.log_group_id, ResourceKind::LogGroup)?;

        let container = &spec.container;
        let mut declaration = Declaration::new(ResourceKind::TaskDefinition, &spec.family)
            .depends_on([&spec.execution_role_id, &spec.log_group_id])
            .property("requires_compatibilities", "FARGATE")
            .property("network_mode", "awsvpc")
            .property("cpu_architecture", spec.cpu_architecture.to_string())
            .property("container_name", container.name.clone())
            .property("cpu", container.cpu)
            .property("memory", container.memory)
            .property("essential", container.essential)
            .property("container_port", container.container_port)
            .property("host_port", container.container_port)
            .deferred("image", &container.image);
        for (name, value) in &container.environment {
            declaration = declaration.deferred(&format!("env.{name}"), value);
        }
        ledger.declare(declaration)
    }

    async fn create_service(&self, spec: &ServiceSpec) -> Result<ResourceId> {
        let mut ledger = self.ledger.lock().await;
        ledger.require(&spec.cluster_id, ResourceKind::Cluster)?;
        ledger.require(&spec.task_definition_id, ResourceKind::TaskDefinition)?;
        ledger.require(&spec.target_group_id, ResourceKind::TargetGroup)?;
        ledger.require_all(&spec.subnet_ids, ResourceKind::Subnet)?;
        ledger.require_all(&spec.security_group_ids, ResourceKind::SecurityGroup)?;
        ledger.declare(
            Declaration::new(ResourceKind::Service, &spec.name)
                .depends_on([
                    &spec.cluster_id,
                    &spec.task_definition_id,
                    &spec.target_group_id,
                ])
                .depends_on(&spec.subnet_ids)
                .depends_on(&spec.security_group_ids)
                .property("launch_type", "FARGATE")
                .property("desired_count", spec.desired_count)
                .property("assign_public_ip", spec.assign_public_ip)
                .property("container_name", spec.container_name.clone())
                .property("container_port", spec.container_port),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tierstack_common::types::RegistryCredential;

    use super::*;
    use crate::spec::RouteSpec;

    fn subnet(vpc: &VpcHandle, name: &str, cidr: &str) -> SubnetSpec {
        SubnetSpec {
            name: name.into(),
            vpc_id: vpc.id.clone(),
            cidr_block: cidr.parse().unwrap(),
            availability_zone: "us-east-1a".into(),
            map_public_ip_on_launch: true,
        }
    }

    #[tokio::test]
    async fn default_vpc_is_recorded() {
        let provider = MemoryProvider::new("us-east-1");
        let vpc = provider.default_vpc().await.unwrap();
        let records = provider.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, vpc.id);
        assert_eq!(records[0].property("cidr_block"), Some("172.31.0.0/16"));
    }

    #[tokio::test]
    async fn overlapping_subnets_are_rejected() {
        let provider = MemoryProvider::new("us-east-1");
        let vpc = provider.default_vpc().await.unwrap();
        let _ = provider
            .create_subnet(&subnet(&vpc, "a", "172.31.100.0/24"))
            .await
            .unwrap();
        let err = provider
            .create_subnet(&subnet(&vpc, "b", "172.31.100.0/25"))
            .await
            .unwrap_err();
        assert!(matches!(err, StackError::Provider { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn subnet_outside_vpc_is_rejected() {
        let provider = MemoryProvider::new("us-east-1");
        let vpc = provider.default_vpc().await.unwrap();
        let result = provider.create_subnet(&subnet(&vpc, "a", "10.0.0.0/24")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected_per_kind() {
        let provider = MemoryProvider::new("us-east-1");
        let _ = provider.create_cluster("cluster").await.unwrap();
        assert!(provider.create_cluster("cluster").await.is_err());
        let _ = provider.allocate_address("cluster").await.unwrap();
    }

    #[tokio::test]
    async fn nat_gateway_requires_known_subnet() {
        let provider = MemoryProvider::new("us-east-1");
        let eip = provider.allocate_address("eip").await.unwrap();
        let err = provider
            .create_nat_gateway(&NatGatewaySpec {
                name: "nat".into(),
                subnet_id: ResourceId::new("subnet-missing"),
                allocation_id: eip,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StackError::NotFound { kind: "subnet", .. }));
    }

    #[tokio::test]
    async fn route_table_records_dependencies() {
        let provider = MemoryProvider::new("us-east-1");
        let vpc = provider.default_vpc().await.unwrap();
        let public = provider
            .create_subnet(&subnet(&vpc, "public", "172.31.100.0/24"))
            .await
            .unwrap();
        let eip = provider.allocate_address("eip").await.unwrap();
        let nat = provider
            .create_nat_gateway(&NatGatewaySpec {
                name: "nat".into(),
                subnet_id: public,
                allocation_id: eip,
            })
            .await
            .unwrap();
        let table = provider
            .create_route_table(&RouteTableSpec {
                name: "private".into(),
                vpc_id: vpc.id.clone(),
                routes: vec![RouteSpec {
                    destination: Cidr::ANYWHERE,
                    nat_gateway_id: nat.clone(),
                }],
            })
            .await
            .unwrap();
        let record = provider
            .records()
            .await
            .into_iter()
            .find(|r| r.id == table)
            .unwrap();
        assert!(record.depends_on.contains(&nat));
        assert!(record.depends_on.contains(&vpc.id));
    }

    #[tokio::test]
    async fn subnet_can_only_be_associated_once() {
        let provider = MemoryProvider::new("us-east-1");
        let vpc = provider.default_vpc().await.unwrap();
        let private = provider
            .create_subnet(&subnet(&vpc, "private", "172.31.200.0/24"))
            .await
            .unwrap();
        let table = provider
            .create_route_table(&RouteTableSpec {
                name: "rt".into(),
                vpc_id: vpc.id.clone(),
                routes: Vec::new(),
            })
            .await
            .unwrap();
        let assoc = |name: &str| RouteTableAssociationSpec {
            name: name.into(),
            route_table_id: table.clone(),
            subnet_id: private.clone(),
        };
        let _ = provider.associate_route_table(&assoc("first")).await.unwrap();
        assert!(provider.associate_route_table(&assoc("second")).await.is_err());
    }

    #[tokio::test]
    async fn repository_attributes_wait_for_settle() {
        let provider = MemoryProvider::new("eu-west-1").with_account_id("123456789012");
        let repo = provider
            .create_repository(&RepositorySpec {
                name: "infra-api".into(),
                force_delete: true,
            })
            .await
            .unwrap();
        assert!(!repo.url.is_settled());
        assert_eq!(provider.settle().await, 2);
        assert_eq!(
            repo.url.resolve().await.unwrap(),
            "123456789012.dkr.ecr.eu-west-1.amazonaws.com/infra-api"
        );
        assert_eq!(repo.registry_id.resolve().await.unwrap(), "123456789012");
    }

    #[tokio::test]
    async fn repository_with_same_name_is_reused() {
        let provider = MemoryProvider::new("us-east-1");
        let spec = RepositorySpec {
            name: "infra-api".into(),
            force_delete: true,
        };
        let first = provider.create_repository(&spec).await.unwrap();
        let second = provider.create_repository(&spec).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(provider.records_of(ResourceKind::Repository).await.len(), 1);
        assert_eq!(provider.settle().await, 2);
        assert_eq!(
            second.url.resolve().await.unwrap(),
            first.url.resolve().await.unwrap()
        );
    }

    #[tokio::test]
    async fn token_decodes_to_registry_user() {
        let provider = MemoryProvider::new("us-east-1");
        let token = provider.authorization_token("000000000000").await.unwrap();
        let decoded = STANDARD.decode(token.authorization_token).unwrap();
        let decoded = String::from_utf8(decoded).unwrap();
        assert!(decoded.starts_with("AWS:"));
        assert!(token.proxy_endpoint.starts_with("https://"));
    }

    #[tokio::test]
    async fn unknown_registry_has_no_token() {
        let provider = MemoryProvider::new("us-east-1");
        assert!(provider.authorization_token("999").await.is_err());
    }

    #[tokio::test]
    async fn push_waits_for_credential_and_never_records_password() {
        let provider = MemoryProvider::new("us-east-1");
        let repo = provider
            .create_repository(&RepositorySpec {
                name: "infra-web".into(),
                force_delete: true,
            })
            .await
            .unwrap();
        let (registry, resolver) = Output::pending();
        let image = provider
            .build_and_push(ImageBuildSpec {
                name: "infra-web".into(),
                repository_id: repo.id.clone(),
                context: PathBuf::from("."),
                dockerfile: PathBuf::from("./infra-web/Dockerfile"),
                image_name: repo.url.clone(),
                registry,
            })
            .await
            .unwrap();

        let _ = provider.settle().await;
        assert!(!image.image_name.is_settled());

        resolver.resolve(RegistryCredential {
            server: "https://registry".into(),
            username: "AWS".into(),
            password: "hunter2".into(),
        });
        let name = image.image_name.resolve().await.unwrap();
        assert!(name.ends_with("/infra-web:latest"), "got: {name}");
        let digest = image.repo_digest.resolve().await.unwrap();
        assert!(digest.contains("@sha256:"), "got: {digest}");

        let snapshot = serde_json::to_string(&provider.records().await).unwrap();
        assert!(snapshot.contains("\"pushed_as\":\"AWS\""));
        assert!(!snapshot.contains("hunter2"));
    }

    #[tokio::test]
    async fn load_balancer_dns_is_pending_until_settle() {
        let provider = MemoryProvider::new("us-east-1");
        let vpc = provider.default_vpc().await.unwrap();
        let private = provider
            .create_subnet(&subnet(&vpc, "private", "172.31.200.0/24"))
            .await
            .unwrap();
        let lb = provider
            .create_load_balancer(&LoadBalancerSpec {
                name: "apiLoadBalancer".into(),
                internal: true,
                subnet_ids: vec![private],
                security_group_ids: Vec::new(),
            })
            .await
            .unwrap();

        let record = provider.records_of(ResourceKind::LoadBalancer).await;
        assert_eq!(record[0].property("dns_name"), Some("(known after apply)"));

        let _ = provider.settle().await;
        let dns = lb.dns_name.resolve().await.unwrap();
        assert!(dns.starts_with("internal-apiloadbalancer-"), "got: {dns}");
        let record = provider.records_of(ResourceKind::LoadBalancer).await;
        assert_eq!(record[0].property("dns_name"), Some(dns.as_str()));
    }

    #[tokio::test]
    async fn malformed_trust_policy_is_rejected() {
        let provider = MemoryProvider::new("us-east-1");
        let result = provider
            .create_role(&RoleSpec {
                name: "role".into(),
                assume_role_policy: "{not json".into(),
            })
            .await;
        assert!(matches!(result, Err(StackError::Provider { .. })));
    }
}
