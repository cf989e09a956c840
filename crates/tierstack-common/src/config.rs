//! Configuration model for a two-tier stack.
//!
//! A stack is described by one [`StackConfig`], loaded from YAML or taken
//! from [`StackConfig::default`], which reproduces the stock deployment:
//! an API tier behind an internal balancer and a web tier behind a public one.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Result, StackError};
use crate::types::{Cidr, CpuArchitecture, Protocol};

/// Root configuration of a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    /// Prefix applied to every resource name.
    #[serde(default = "default_project")]
    pub project: String,
    /// Provider region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Target VPC; the provider's default VPC when absent.
    #[serde(default)]
    pub vpc_id: Option<String>,
    /// Zones subnets are spread across; the provider's zones when empty.
    #[serde(default)]
    pub availability_zones: Vec<String>,
    /// Internet-routable subnet blocks.
    #[serde(default = "default_public_subnets")]
    pub public_subnets: Vec<Cidr>,
    /// NAT-routed subnet blocks.
    #[serde(default = "default_private_subnets")]
    pub private_subnets: Vec<Cidr>,
    /// Directory holding one `<repository>/Dockerfile` per tier.
    #[serde(default = "default_build_context")]
    pub build_context: PathBuf,
    /// Ingress allow-list of the external security group.
    pub external_ingress: Vec<IngressRuleConfig>,
    /// Days container logs are retained.
    #[serde(default = "default_log_retention")]
    pub log_retention_days: u32,
    /// Internal API tier.
    #[serde(default = "TierConfig::api")]
    pub api: TierConfig,
    /// Public web tier.
    #[serde(default = "TierConfig::web")]
    pub web: TierConfig,
}

/// One entry of the external ingress allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRuleConfig {
    /// Matched protocol.
    #[serde(default)]
    pub protocol: Protocol,
    /// First port of the allowed range.
    pub from_port: u16,
    /// Last port of the allowed range (inclusive).
    pub to_port: u16,
    /// Allowed source block.
    pub cidr: Cidr,
}

impl IngressRuleConfig {
    /// Every TCP port from every address.
    #[must_use]
    pub const fn open_tcp() -> Self {
        Self {
            protocol: Protocol::Tcp,
            from_port: 0,
            to_port: constants::MAX_PORT,
            cidr: Cidr::ANYWHERE,
        }
    }

    /// Returns whether the rule admits every port from every address.
    #[must_use]
    pub fn is_wide_open(&self) -> bool {
        self.cidr.is_anywhere() && self.from_port == 0 && self.to_port == constants::MAX_PORT
    }
}

/// Per-tier settings: image, balancer health check, and container sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    /// Registry repository, also the Dockerfile directory under the build context.
    pub repository: String,
    /// Compute service name.
    pub service_name: String,
    /// Load balancer name.
    pub load_balancer_name: String,
    /// Path probed by the target group health check.
    pub health_check_path: String,
    /// Port probed by the target group health check.
    #[serde(default = "default_container_port")]
    pub health_check_port: u16,
    /// Port the container listens on.
    #[serde(default = "default_container_port")]
    pub container_port: u16,
    /// Port the balancer listener accepts traffic on.
    #[serde(default = "default_listener_port")]
    pub listener_port: u16,
    /// Runtime platform architecture.
    #[serde(default)]
    pub cpu_architecture: CpuArchitecture,
    /// CPU units reserved for the container.
    #[serde(default = "default_cpu")]
    pub cpu: u32,
    /// Memory (MiB) reserved for the container.
    #[serde(default = "default_memory")]
    pub memory: u32,
    /// Number of replicas.
    #[serde(default = "default_desired_count")]
    pub desired_count: u32,
}

impl TierConfig {
    /// Preset of the internal API tier.
    #[must_use]
    pub fn api() -> Self {
        Self::preset("api", constants::API_HEALTH_CHECK_PATH)
    }

    /// Preset of the public web tier.
    #[must_use]
    pub fn web() -> Self {
        Self::preset("web", constants::WEB_HEALTH_CHECK_PATH)
    }

    fn preset(tier: &str, health_check_path: &str) -> Self {
        Self {
            repository: format!("{}-{tier}", constants::DEFAULT_PROJECT),
            service_name: format!("{tier}Service"),
            load_balancer_name: format!("{tier}LoadBalancer"),
            health_check_path: health_check_path.into(),
            health_check_port: constants::DEFAULT_CONTAINER_PORT,
            container_port: constants::DEFAULT_CONTAINER_PORT,
            listener_port: constants::DEFAULT_LISTENER_PORT,
            cpu_architecture: CpuArchitecture::Arm64,
            cpu: constants::DEFAULT_CONTAINER_CPU,
            memory: constants::DEFAULT_CONTAINER_MEMORY,
            desired_count: 1,
        }
    }

    fn validate(&self, tier: &str) -> Result<()> {
        let fail = |message: String| Err(StackError::Config { message });
        if self.repository.is_empty() || self.service_name.is_empty() {
            return fail(format!("{tier}: repository and service_name must be set"));
        }
        if self.load_balancer_name.is_empty() {
            return fail(format!("{tier}: load_balancer_name must be set"));
        }
        if !self.health_check_path.starts_with('/') {
            return fail(format!(
                "{tier}: health_check_path \"{}\" must start with '/'",
                self.health_check_path
            ));
        }
        if self.container_port == 0 || self.health_check_port == 0 || self.listener_port == 0 {
            return fail(format!("{tier}: ports must be non-zero"));
        }
        if self.cpu == 0 || self.memory == 0 {
            return fail(format!("{tier}: cpu and memory must be non-zero"));
        }
        Ok(())
    }
}

impl StackConfig {
    /// Loads a configuration file and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML, or
    /// fails [`StackConfig::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading stack configuration");
        let content = std::fs::read_to_string(path).map_err(|e| StackError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// Parses and validates a YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or invalid.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Checks the configuration for values no stack can be built from.
    ///
    /// # Errors
    ///
    /// Returns `StackError::Topology` for missing or overlapping subnet
    /// blocks, and `StackError::Config` for any other invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.project.is_empty() {
            return Err(StackError::Config {
                message: "project must not be empty".into(),
            });
        }
        if self.external_ingress.is_empty() {
            return Err(StackError::Config {
                message: "external_ingress must list at least one rule".into(),
            });
        }
        for rule in &self.external_ingress {
            if rule.from_port > rule.to_port {
                return Err(StackError::Config {
                    message: format!(
                        "ingress port range {}-{} is reversed",
                        rule.from_port, rule.to_port
                    ),
                });
            }
        }
        if self.public_subnets.is_empty() {
            return Err(StackError::topology(
                "public_subnets must list at least one block to anchor the NAT gateway",
            ));
        }
        if self.private_subnets.is_empty() {
            return Err(StackError::topology(
                "private_subnets must list at least one block for the api tier",
            ));
        }
        let blocks: Vec<&Cidr> = self.public_subnets.iter().chain(&self.private_subnets).collect();
        for (i, block) in blocks.iter().enumerate() {
            if let Some(other) = blocks[i + 1..].iter().find(|o| o.overlaps(block)) {
                return Err(StackError::topology(format!(
                    "subnet block {block} overlaps {other}"
                )));
            }
        }
        if self.api.repository == self.web.repository {
            return Err(StackError::Config {
                message: "api and web tiers must publish to different repositories".into(),
            });
        }
        self.api.validate("api")?;
        self.web.validate("web")
    }

    /// Returns a resource name scoped to this project.
    #[must_use]
    pub fn scoped(&self, name: &str) -> String {
        format!("{}-{name}", self.project)
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            project: default_project(),
            region: default_region(),
            vpc_id: None,
            availability_zones: Vec::new(),
            public_subnets: default_public_subnets(),
            private_subnets: default_private_subnets(),
            build_context: default_build_context(),
            external_ingress: vec![IngressRuleConfig::open_tcp()],
            log_retention_days: default_log_retention(),
            api: TierConfig::api(),
            web: TierConfig::web(),
        }
    }
}

fn default_project() -> String {
    constants::DEFAULT_PROJECT.into()
}

fn default_region() -> String {
    constants::DEFAULT_REGION.into()
}

fn parse_defaults(blocks: &[&str]) -> Vec<Cidr> {
    blocks.iter().filter_map(|b| b.parse().ok()).collect()
}

fn default_public_subnets() -> Vec<Cidr> {
    parse_defaults(&constants::DEFAULT_PUBLIC_SUBNETS)
}

fn default_private_subnets() -> Vec<Cidr> {
    parse_defaults(&constants::DEFAULT_PRIVATE_SUBNETS)
}

fn default_build_context() -> PathBuf {
    PathBuf::from(".")
}

const fn default_log_retention() -> u32 {
    constants::DEFAULT_LOG_RETENTION_DAYS
}

const fn default_container_port() -> u16 {
    constants::DEFAULT_CONTAINER_PORT
}

const fn default_listener_port() -> u16 {
    constants::DEFAULT_LISTENER_PORT
}

const fn default_cpu() -> u32 {
    constants::DEFAULT_CONTAINER_CPU
}

const fn default_memory() -> u32 {
    constants::DEFAULT_CONTAINER_MEMORY
}

const fn default_desired_count() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const MINIMAL: &str = r#"
external_ingress:
  - from_port: 443
    to_port: 443
    cidr: "0.0.0.0/0"
"#;

    #[test]
    fn default_config_is_valid() {
        let config = StackConfig::default();
        config.validate().expect("default must validate");
        assert_eq!(config.public_subnets.len(), 2);
        assert_eq!(config.private_subnets.len(), 2);
        assert_eq!(config.api.health_check_path, "/WeatherForecast");
        assert_eq!(config.web.health_check_path, "/");
        assert_eq!(config.api.repository, "infra-api");
        assert!(config.external_ingress[0].is_wide_open());
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let config = StackConfig::from_yaml(MINIMAL).expect("parse");
        assert_eq!(config.project, "infra");
        assert_eq!(config.external_ingress.len(), 1);
        assert_eq!(config.external_ingress[0].protocol, Protocol::Tcp);
        assert!(!config.external_ingress[0].is_wide_open());
        assert_eq!(config.web.container_port, 5000);
        assert_eq!(config.api.cpu_architecture, CpuArchitecture::Arm64);
    }

    #[test]
    fn yaml_without_external_ingress_is_rejected() {
        let err = StackConfig::from_yaml("project: demo\n").unwrap_err();
        assert!(matches!(err, StackError::Yaml { .. }), "got: {err}");
    }

    #[test]
    fn empty_external_ingress_is_rejected() {
        let err = StackConfig::from_yaml("external_ingress: []\n").unwrap_err();
        assert!(err.to_string().contains("external_ingress"), "got: {err}");
    }

    #[test]
    fn malformed_subnet_is_rejected() {
        let yaml = format!("{MINIMAL}public_subnets: [\"172.31.100.9/24\"]\n");
        assert!(StackConfig::from_yaml(&yaml).is_err());
    }

    #[test]
    fn health_check_path_needs_leading_slash() {
        let mut config = StackConfig::default();
        config.api.health_check_path = "WeatherForecast".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("health_check_path"), "got: {err}");
    }

    #[test]
    fn empty_subnet_lists_are_rejected_by_name() {
        for field in ["public_subnets", "private_subnets"] {
            let mut config = StackConfig::default();
            if field == "public_subnets" {
                config.public_subnets.clear();
            } else {
                config.private_subnets.clear();
            }
            let err = config.validate().unwrap_err();
            assert!(matches!(err, StackError::Topology { .. }), "got: {err}");
            assert!(err.to_string().contains(field), "got: {err}");
        }
    }

    #[test]
    fn overlapping_subnet_blocks_are_rejected() {
        let mut config = StackConfig::default();
        config.private_subnets = vec!["172.31.100.128/25".parse().unwrap()];
        let err = config.validate().unwrap_err();
        assert!(matches!(err, StackError::Topology { .. }), "got: {err}");
    }

    #[test]
    fn shared_repository_is_rejected() {
        let mut config = StackConfig::default();
        config.web.repository = config.api.repository.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn yaml_roundtrip_preserves_config() {
        let config = StackConfig::default();
        let yaml = config.to_yaml().expect("serialize");
        let back = StackConfig::from_yaml(&yaml).expect("parse");
        assert_eq!(back, config);
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(MINIMAL.as_bytes()).expect("write");
        let config = StackConfig::load(file.path()).expect("load");
        assert_eq!(config.external_ingress[0].from_port, 443);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = StackConfig::load(Path::new("/nonexistent/tierstack.yaml")).unwrap_err();
        assert!(matches!(err, StackError::Io { .. }));
    }

    #[test]
    fn scoped_names_carry_project() {
        let config = StackConfig::default();
        assert_eq!(config.scoped("cluster"), "infra-cluster");
    }
}
