//! Resource-management API interaction module
//!
//! This module provides the transport side of the crate: credentials, the
//! HTTP pipeline, the management client and raw response handling.
//!
//! # Module Structure
//!
//! - [`auth`] - Token credentials and token caching
//! - [`client`] - Main management client for making API requests
//! - [`http`] - HTTP pipeline for REST calls
//! - [`response`] - Raw and decoded responses
//!
//! # Example
//!
//! ```ignore
//! use armkit::arm::auth::EnvironmentCredential;
//! use armkit::arm::client::{ArmClient, ClientOptions, DEFAULT_ENDPOINT};
//! use std::sync::Arc;
//!
//! async fn example() -> armkit::Result<()> {
//!     let client = ArmClient::new(
//!         DEFAULT_ENDPOINT,
//!         Arc::new(EnvironmentCredential),
//!         ClientOptions::default(),
//!     )?;
//!     let groups = client.get("/subscriptions/0000/resourcegroups", None).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod response;
