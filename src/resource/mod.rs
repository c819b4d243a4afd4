//! Resource abstraction layer
//!
//! This module provides a data-driven approach to managing resources.
//! Resource definitions are loaded from JSON files at compile time, allowing
//! new resource types to be added without code changes.
//!
//! # Architecture
//!
//! - [`ResourceId`] - Parsing and building resource identifiers
//! - registry - Loads and caches resource definitions from embedded JSON
//! - [`ResourceCollection`] - Create/get/list/exists/delete for one resource type
//!
//! # Resource Definitions
//!
//! Resources are defined in JSON files under `src/resources/`:
//! - `network.json` - DNS, relay and CDN resources
//! - `compute.json` - Container and maintenance resources
//! - `data.json` - Databases, data factories, API management and resource groups
//!
//! # Example
//!
//! ```ignore
//! use armkit::resource::{get_resource, ResourceCollection, ResourceId};
//!
//! async fn list_zones(client: ArmClient) -> armkit::Result<()> {
//!     let parent = ResourceId::parse("/subscriptions/s/resourceGroups/g")?;
//!     let zones = ResourceCollection::new(client, parent, get_resource("dns-zones").unwrap().clone())?;
//!     for zone in zones.get_all().collect_items().await? {
//!         println!("{:?}", zone.name);
//!     }
//!     Ok(())
//! }
//! ```

mod collection;
mod id;
mod registry;

pub use collection::{GenericResource, ResourceCollection};
pub use id::ResourceId;
pub use registry::*;
