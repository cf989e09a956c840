//! # tierstack-provider
//!
//! The seam between stack construction and the outside world.
//!
//! Handles:
//! - **Output**: Deferred values that resolve after their resource is created.
//! - **Spec**: Plain request types passed to the provider.
//! - **Api**: Async collaborator traits, split by concern.
//! - **Memory**: A recording provider backing `tstk plan` and the test suites.
//! - **Record**: Snapshot of every declared resource.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod api;
pub mod memory;
pub mod output;
pub mod record;
pub mod spec;

pub use api::{CloudProvider, ComputeApi, ImageBuilder, NetworkApi, RegistryApi};
pub use memory::MemoryProvider;
pub use output::{Output, Resolver};
