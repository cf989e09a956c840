//! # tierstack-network
//!
//! Network primitives of a two-tier stack.
//!
//! Handles:
//! - **Topology**: Public subnets, the NAT gateway anchored in one of them,
//!   the shared private route table, and private subnets bound to it.
//! - **Security**: The external group and the internal group that trusts it.
//!
//! Construction order is carried by the types: a NAT gateway can only be
//! created from a [`topology::PublicSubnet`], a private subnet only from a
//! [`topology::RouteTableDescriptor`], and the internal group only from an
//! [`security::ExternalGroup`].

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod security;
pub mod topology;
