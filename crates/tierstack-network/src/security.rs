//! Security groups of a two-tier stack.
//!
//! The external group admits its own members plus a configured allow-list
//! and may send anywhere. The internal group admits only members of the
//! external group, never an address block, and may send anywhere.

use serde::Serialize;
use tierstack_common::config::IngressRuleConfig;
use tierstack_common::constants::MAX_PORT;
use tierstack_common::error::{Result, StackError};
use tierstack_common::types::{Cidr, Protocol, ResourceId, SecurityRole};
use tierstack_provider::NetworkApi;
use tierstack_provider::spec::{RulePeer, SecurityGroupSpec, SecurityRule, VpcHandle};

/// A created security group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityGroupDescriptor {
    /// Group identifier.
    pub id: ResourceId,
    /// Declared name.
    pub name: String,
    /// Role in the topology.
    pub role: SecurityRole,
    /// Inbound rules.
    pub ingress: Vec<SecurityRule>,
    /// Outbound rules.
    pub egress: Vec<SecurityRule>,
}

impl SecurityGroupDescriptor {
    /// Returns whether some ingress rule admits members of `group`.
    #[must_use]
    pub fn trusts(&self, group: &ResourceId) -> bool {
        self.ingress
            .iter()
            .any(|r| matches!(&r.peer, RulePeer::Group(id) if id == group))
    }

    /// Returns whether some ingress rule admits an address block.
    #[must_use]
    pub fn has_cidr_ingress(&self) -> bool {
        self.ingress
            .iter()
            .any(|r| matches!(r.peer, RulePeer::Cidr(_)))
    }
}

/// The internet-facing group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalGroup(SecurityGroupDescriptor);

impl ExternalGroup {
    /// Returns the underlying descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &SecurityGroupDescriptor {
        &self.0
    }

    /// Returns the group id.
    #[must_use]
    pub const fn id(&self) -> &ResourceId {
        &self.0.id
    }
}

/// The group that only trusts the external group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InternalGroup(SecurityGroupDescriptor);

impl InternalGroup {
    /// Returns the underlying descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &SecurityGroupDescriptor {
        &self.0
    }

    /// Returns the group id.
    #[must_use]
    pub const fn id(&self) -> &ResourceId {
        &self.0.id
    }
}

/// Both groups of a stack.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityGroups {
    /// Internet-facing group.
    pub external: ExternalGroup,
    /// Group trusting only the external group.
    pub internal: InternalGroup,
}

fn all_tcp(peer: RulePeer) -> SecurityRule {
    SecurityRule {
        protocol: Protocol::Tcp,
        from_port: 0,
        to_port: MAX_PORT,
        peer,
    }
}

fn open_egress() -> Vec<SecurityRule> {
    vec![all_tcp(RulePeer::Cidr(Cidr::ANYWHERE))]
}

/// Creates the external group from an ingress allow-list.
///
/// # Errors
///
/// Returns `StackError::Config` for an empty allow-list, or the provider's
/// error if the group cannot be created.
pub async fn create_external_group<P>(
    provider: &P,
    name: &str,
    vpc: &VpcHandle,
    allow: &[IngressRuleConfig],
) -> Result<ExternalGroup>
where
    P: NetworkApi + ?Sized,
{
    if allow.is_empty() {
        return Err(StackError::Config {
            message: "external security group needs at least one ingress rule".into(),
        });
    }
    if allow.iter().any(IngressRuleConfig::is_wide_open) {
        tracing::warn!(group = name, "external ingress admits every port from every address");
    }

    let mut ingress = vec![all_tcp(RulePeer::SelfGroup)];
    ingress.extend(allow.iter().map(|rule| SecurityRule {
        protocol: rule.protocol,
        from_port: rule.from_port,
        to_port: rule.to_port,
        peer: RulePeer::Cidr(rule.cidr),
    }));
    let egress = open_egress();

    let id = provider
        .create_security_group(&SecurityGroupSpec {
            name: name.into(),
            vpc_id: vpc.id.clone(),
            description: "internet-facing tier".into(),
            ingress: ingress.clone(),
            egress: egress.clone(),
        })
        .await?;
    tracing::info!(id = %id, rules = ingress.len(), "external security group created");
    Ok(ExternalGroup(SecurityGroupDescriptor {
        id,
        name: name.into(),
        role: SecurityRole::External,
        ingress,
        egress,
    }))
}

/// Creates the internal group, trusting only members of `external`.
///
/// # Errors
///
/// Returns the provider's error if the group cannot be created.
pub async fn create_internal_group<P>(
    provider: &P,
    name: &str,
    vpc: &VpcHandle,
    external: &ExternalGroup,
) -> Result<InternalGroup>
where
    P: NetworkApi + ?Sized,
{
    let ingress = vec![all_tcp(RulePeer::Group(external.id().clone()))];
    let egress = open_egress();

    let id = provider
        .create_security_group(&SecurityGroupSpec {
            name: name.into(),
            vpc_id: vpc.id.clone(),
            description: "internal tier, reachable from the external tier only".into(),
            ingress: ingress.clone(),
            egress: egress.clone(),
        })
        .await?;
    tracing::info!(id = %id, trusts = %external.id(), "internal security group created");
    Ok(InternalGroup(SecurityGroupDescriptor {
        id,
        name: name.into(),
        role: SecurityRole::Internal,
        ingress,
        egress,
    }))
}

/// Creates the external group, then the internal group that trusts it.
///
/// # Errors
///
/// Returns the first creation error; the internal group is never created
/// if the external one fails.
pub async fn build_security_groups<P>(
    provider: &P,
    prefix: &str,
    vpc: &VpcHandle,
    allow: &[IngressRuleConfig],
) -> Result<SecurityGroups>
where
    P: NetworkApi + ?Sized,
{
    let external = create_external_group(provider, &format!("{prefix}-external"), vpc, allow).await?;
    let internal =
        create_internal_group(provider, &format!("{prefix}-internal"), vpc, &external).await?;
    Ok(SecurityGroups { external, internal })
}
