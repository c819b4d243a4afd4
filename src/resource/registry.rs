//! Resource Registry - Load resource definitions from JSON
//!
//! This module loads all resource type definitions from embedded JSON files
//! and provides lookup functions for collections and the CLI.

use super::id::ResourceId;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/network.json"),
    include_str!("../resources/compute.json"),
    include_str!("../resources/data.json"),
];

/// Where instances of a resource type live
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentScope {
    Subscription,
    ResourceGroup,
    /// Child of another resource, named by its full type (`Microsoft.Network/dnsZones`)
    Resource(String),
}

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    /// Used for diagnostic scope names (`{display_name}Collection.Get`)
    pub display_name: String,
    /// Provider namespace, e.g. `Microsoft.Network`
    pub provider: String,
    /// Last type segment, e.g. `dnsZones`
    pub resource_type: String,
    pub api_version: String,
    pub parent: ParentScope,
}

impl ResourceDef {
    /// Full type name, e.g. `Microsoft.Network/dnsZones`
    ///
    /// Child types include the parent's types: `Microsoft.Network/dnsZones/A`.
    pub fn full_type(&self) -> String {
        match &self.parent {
            ParentScope::Resource(parent) => format!("{}/{}", parent, self.resource_type),
            _ => format!("{}/{}", self.provider, self.resource_type),
        }
    }

    /// Check that `parent` can hold resources of this type
    pub fn validate_parent(&self, parent: &ResourceId) -> Result<()> {
        let expected = match &self.parent {
            ParentScope::Subscription => "Microsoft.Resources/subscriptions".to_string(),
            ParentScope::ResourceGroup => "Microsoft.Resources/resourceGroups".to_string(),
            ParentScope::Resource(parent_type) => parent_type.clone(),
        };

        let actual = parent.resource_type();
        if actual.eq_ignore_ascii_case(&expected) {
            Ok(())
        } else {
            Err(Error::InvalidResourceId {
                id: parent.to_string(),
                reason: format!("Invalid resource type {actual} expected {expected}"),
            })
        }
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        final_config
    })
}

/// Get a resource definition by key
pub fn get_resource(key: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(key)
}

/// Get all resource keys, sorted
pub fn get_all_resource_keys() -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect();
    keys.sort_unstable();
    keys
}
