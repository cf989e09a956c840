//! System-wide constants and default values.

/// Application name used in CLI output.
pub const APP_NAME: &str = "tierstack";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "tstk";

/// Default configuration file looked up by the CLI.
pub const DEFAULT_CONFIG_FILE: &str = "tierstack.yaml";

/// Default resource name prefix.
pub const DEFAULT_PROJECT: &str = "infra";

/// Default provider region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default public subnet blocks, carved from the default VPC range.
pub const DEFAULT_PUBLIC_SUBNETS: [&str; 2] = ["172.31.100.0/24", "172.31.101.0/24"];

/// Default private subnet blocks, carved from the default VPC range.
pub const DEFAULT_PRIVATE_SUBNETS: [&str; 2] = ["172.31.200.0/24", "172.31.201.0/24"];

/// CIDR block of a provider's default VPC.
pub const DEFAULT_VPC_CIDR: &str = "172.31.0.0/16";

/// Port both tiers listen on inside their containers.
pub const DEFAULT_CONTAINER_PORT: u16 = 5000;

/// Port the load balancer listeners accept traffic on.
pub const DEFAULT_LISTENER_PORT: u16 = 80;

/// Health-check path of the API tier.
pub const API_HEALTH_CHECK_PATH: &str = "/WeatherForecast";

/// Health-check path of the web tier.
pub const WEB_HEALTH_CHECK_PATH: &str = "/";

/// Environment variable through which the web tier learns the API address.
pub const API_ADDRESS_ENV: &str = "ApiAddress";

/// Name of the single container in every task definition.
pub const CONTAINER_NAME: &str = "awsx-ecs";

/// CPU units reserved for the container.
pub const DEFAULT_CONTAINER_CPU: u32 = 128;

/// Memory (MiB) reserved for the container.
pub const DEFAULT_CONTAINER_MEMORY: u32 = 512;

/// Days container logs are retained.
pub const DEFAULT_LOG_RETENTION_DAYS: u32 = 1;

/// Highest TCP/UDP port number.
pub const MAX_PORT: u16 = 65_535;

/// Service principal allowed to assume the task execution role.
pub const TASK_EXECUTION_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

/// Managed policy granting the permissions a task execution role needs.
pub const TASK_EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";

/// Registry user name embedded in authorization tokens.
pub const REGISTRY_USERNAME: &str = "AWS";
