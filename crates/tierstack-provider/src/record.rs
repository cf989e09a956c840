//! Snapshot of declared resources.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tierstack_common::types::ResourceId;

/// Type of a declared resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Virtual network.
    Vpc,
    /// Subnet.
    Subnet,
    /// Static public address.
    ElasticIp,
    /// NAT gateway.
    NatGateway,
    /// Route table.
    RouteTable,
    /// Subnet to route table binding.
    RouteTableAssociation,
    /// Security group.
    SecurityGroup,
    /// Container cluster.
    Cluster,
    /// Registry repository.
    Repository,
    /// Built and pushed image.
    Image,
    /// IAM role.
    Role,
    /// Managed policy attached to a role.
    RolePolicyAttachment,
    /// Log group.
    LogGroup,
    /// Load balancer target group.
    TargetGroup,
    /// Load balancer.
    LoadBalancer,
    /// Load balancer listener.
    Listener,
    /// Task definition.
    TaskDefinition,
    /// Compute service.
    Service,
}

impl ResourceKind {
    /// Returns the human-readable kind name used in errors and plans.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Vpc => "vpc",
            Self::Subnet => "subnet",
            Self::ElasticIp => "elastic ip",
            Self::NatGateway => "nat gateway",
            Self::RouteTable => "route table",
            Self::RouteTableAssociation => "route table association",
            Self::SecurityGroup => "security group",
            Self::Cluster => "cluster",
            Self::Repository => "repository",
            Self::Image => "image",
            Self::Role => "role",
            Self::RolePolicyAttachment => "role policy attachment",
            Self::LogGroup => "log group",
            Self::TargetGroup => "target group",
            Self::LoadBalancer => "load balancer",
            Self::Listener => "listener",
            Self::TaskDefinition => "task definition",
            Self::Service => "service",
        }
    }

    /// Returns the prefix of generated ids for this kind.
    #[must_use]
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::Vpc => "vpc",
            Self::Subnet => "subnet",
            Self::ElasticIp => "eipalloc",
            Self::NatGateway => "nat",
            Self::RouteTable => "rtb",
            Self::RouteTableAssociation => "rtbassoc",
            Self::SecurityGroup => "sg",
            Self::Cluster => "cluster",
            Self::Repository => "repo",
            Self::Image => "image",
            Self::Role => "role",
            Self::RolePolicyAttachment => "rpa",
            Self::LogGroup => "lg",
            Self::TargetGroup => "tg",
            Self::LoadBalancer => "alb",
            Self::Listener => "listener",
            Self::TaskDefinition => "taskdef",
            Self::Service => "svc",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A declared resource as seen by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Provider-assigned identifier.
    pub id: ResourceId,
    /// Resource type.
    pub kind: ResourceKind,
    /// Declared name.
    pub name: String,
    /// Resources that must exist before this one.
    pub depends_on: Vec<ResourceId>,
    /// Provider-side attributes; deferred attributes show their state at snapshot time.
    pub properties: serde_json::Map<String, serde_json::Value>,
    /// When the resource was declared.
    pub created_at: DateTime<Utc>,
}

impl ResourceRecord {
    /// Returns a string property, if present.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(serde_json::Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serialization_roundtrip() {
        let mut properties = serde_json::Map::new();
        let _ = properties.insert("cidr_block".into(), "172.31.100.0/24".into());
        let record = ResourceRecord {
            id: ResourceId::new("subnet-1"),
            kind: ResourceKind::Subnet,
            name: "infra-public-0".into(),
            depends_on: vec![ResourceId::new("vpc-1")],
            properties,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).expect("serialize");
        assert!(json.contains("\"kind\":\"subnet\""), "got: {json}");
        let back: ResourceRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.property("cidr_block"), Some("172.31.100.0/24"));
        assert_eq!(back.depends_on, record.depends_on);
    }

    #[test]
    fn labels_and_prefixes_are_distinct() {
        assert_eq!(ResourceKind::NatGateway.to_string(), "nat gateway");
        assert_eq!(ResourceKind::SecurityGroup.id_prefix(), "sg");
    }
}
