//! Domain primitive types used across the tierstack workspace.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StackError};

/// Provider-assigned identifier of a declared resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    /// Creates a resource ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random ID carrying the provider's kind prefix, e.g. `subnet-1a2b3c4d`.
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{prefix}-{}", &suffix[..17]))
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An IPv4 network in CIDR notation.
///
/// Host bits must be zero: `172.31.100.0/24` is accepted, `172.31.100.7/24` is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Cidr {
    /// The route destination matching every IPv4 address.
    pub const ANYWHERE: Self = Self {
        network: Ipv4Addr::UNSPECIFIED,
        prefix: 0,
    };

    /// Creates a CIDR block from a network address and prefix length.
    ///
    /// # Errors
    ///
    /// Returns `StackError::Topology` if the prefix exceeds 32 or the
    /// address has host bits set.
    pub fn new(network: Ipv4Addr, prefix: u8) -> Result<Self> {
        if prefix > 32 {
            return Err(StackError::topology(format!(
                "prefix length /{prefix} exceeds 32"
            )));
        }
        let cidr = Self { network, prefix };
        if u32::from(network) & !cidr.mask() != 0 {
            return Err(StackError::topology(format!(
                "{network}/{prefix} has host bits set"
            )));
        }
        Ok(cidr)
    }

    /// Returns the network address.
    #[must_use]
    pub const fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// Returns the prefix length.
    #[must_use]
    pub const fn prefix(&self) -> u8 {
        self.prefix
    }

    const fn mask(&self) -> u32 {
        if self.prefix == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix)
        }
    }

    /// Returns whether `other` lies entirely within this block.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        other.prefix >= self.prefix && u32::from(other.network) & self.mask() == u32::from(self.network)
    }

    /// Returns whether the two blocks share any address.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// Returns whether this block matches every address.
    #[must_use]
    pub const fn is_anywhere(&self) -> bool {
        self.prefix == 0
    }
}

impl FromStr for Cidr {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| StackError::topology(format!("\"{s}\" is not in CIDR notation")))?;
        let network: Ipv4Addr = addr
            .parse()
            .map_err(|_| StackError::topology(format!("\"{addr}\" is not an IPv4 address")))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| StackError::topology(format!("\"{prefix}\" is not a prefix length")))?;
        Self::new(network, prefix)
    }
}

impl TryFrom<String> for Cidr {
    type Error = StackError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Cidr> for String {
    fn from(value: Cidr) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// Whether a subnet routes directly to the internet or egresses via NAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetTier {
    /// Internet-routable subnet.
    Public,
    /// Subnet whose egress is forced through the NAT gateway.
    Private,
}

impl fmt::Display for SubnetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
        }
    }
}

/// Role of a security group in the two-tier topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityRole {
    /// Internet-facing group.
    External,
    /// Group that only trusts the external group.
    Internal,
}

impl SecurityRole {
    /// Returns the subnet tier this role is allowed to be placed on.
    #[must_use]
    pub const fn subnet_tier(self) -> SubnetTier {
        match self {
            Self::External => SubnetTier::Public,
            Self::Internal => SubnetTier::Private,
        }
    }
}

impl fmt::Display for SecurityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::External => write!(f, "external"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Visibility of a load balancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadBalancerKind {
    /// Reachable only from inside the network.
    Internal,
    /// Internet-facing.
    Public,
}

impl LoadBalancerKind {
    /// Returns the subnet tier this balancer must be placed on.
    #[must_use]
    pub const fn subnet_tier(self) -> SubnetTier {
        match self {
            Self::Internal => SubnetTier::Private,
            Self::Public => SubnetTier::Public,
        }
    }

    /// Returns the security-group role this balancer must carry.
    #[must_use]
    pub const fn security_role(self) -> SecurityRole {
        match self {
            Self::Internal => SecurityRole::Internal,
            Self::Public => SecurityRole::External,
        }
    }
}

impl fmt::Display for LoadBalancerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => write!(f, "internal"),
            Self::Public => write!(f, "public"),
        }
    }
}

/// CPU architecture of the container runtime platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CpuArchitecture {
    /// 64-bit ARM (Graviton).
    #[default]
    #[serde(rename = "ARM64")]
    Arm64,
    /// 64-bit x86.
    #[serde(rename = "X86_64")]
    X86_64,
}

impl fmt::Display for CpuArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arm64 => write!(f, "ARM64"),
            Self::X86_64 => write!(f, "X86_64"),
        }
    }
}

/// IP protocol matched by a security rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP.
    #[default]
    Tcp,
    /// UDP.
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// Credential used to push to a container registry.
///
/// Derived from a short-lived authorization token for a single publish and
/// never persisted. `Debug` output redacts the password.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredential {
    /// Registry endpoint the credential is valid for.
    pub server: String,
    /// Registry user name.
    pub username: String,
    /// Registry password.
    pub password: String,
}

impl fmt::Debug for RegistryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredential")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
