//! # tierstack-compose
//!
//! Composition of a two-tier stack on top of the network and image crates.
//!
//! Handles:
//! - **Balancer**: Load balancers with a health-checked target group and a
//!   listener, checked against the tier of their subnets and groups.
//! - **Service**: Task definitions and load-balanced services, with
//!   environment values that may still be pending.
//! - **Iam**: The task execution role and the log group containers write to.
//! - **Graph**: Dependency ordering of declared resources.
//! - **Stack**: The full program: topology, groups, images, the internal API
//!   tier and the public web tier that calls it.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod balancer;
pub mod graph;
pub mod iam;
pub mod service;
pub mod stack;

pub use stack::{ResolvedOutputs, StackOutputs, declare_stack};
