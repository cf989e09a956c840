//! # tierstack-image
//!
//! Container image publishing for the tierstack workspace.
//!
//! Handles:
//! - **Credential**: Turning a registry authorization token into a
//!   username/password/server triple.
//! - **Publisher**: Creating the repository, building the image, and
//!   pushing it with a freshly resolved credential.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod credential;
pub mod publisher;
