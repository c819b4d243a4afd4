//! armkit - paged listing and long-running operations for a cloud
//! resource-management REST API
//!
//! # Module Structure
//!
//! - [`paging`] - [`Pageable`] turns first/next page fetches into lazy streams
//! - [`lro`] - [`Operation`] tracks a server-side job to a terminal status
//! - [`blocking`] - Synchronous wrappers over both
//! - [`arm`] - Credentials, HTTP pipeline and the management client
//! - [`resource`] - Resource ids, the resource registry and generic collections
//! - [`diagnostics`] - Tracing scopes around client calls
//! - [`error`] - Crate error type

pub mod arm;
pub mod blocking;
pub mod diagnostics;
pub mod error;
pub mod lro;
pub mod paging;
pub mod resource;

pub use arm::client::{ArmClient, ClientOptions, ServiceVersion};
pub use arm::response::{RawResponse, Response};
pub use error::{Error, RequestError, Result};
pub use lro::{Operation, OperationError, OperationStatus, PollResponse, PollingPolicy, WaitUntil};
pub use paging::{ContinuationToken, Page, Pageable};
pub use resource::{GenericResource, ResourceCollection, ResourceId};
