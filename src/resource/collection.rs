//! Resource Collection
//!
//! Generic create/get/list/exists/delete over one resource type under one
//! parent, driven by a [`ResourceDef`] from the registry.

use super::id::ResourceId;
use super::registry::ResourceDef;
use crate::arm::client::ArmClient;
use crate::arm::response::{RawResponse, Response};
use crate::diagnostics::DiagnosticScope;
use crate::error::{Error, Result};
use crate::lro::{Operation, OperationLocation, OperationStatus, PollResponse, WaitUntil};
use crate::paging::{ContinuationToken, Page, Pageable};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// Resource body shared by every resource type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenericResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub properties: Value,
}

impl GenericResource {
    /// `properties.provisioningState`, if reported
    pub fn provisioning_state(&self) -> Option<&str> {
        self.properties.get("provisioningState").and_then(|v| v.as_str())
    }
}

/// Resources of one type under one parent
#[derive(Clone)]
pub struct ResourceCollection {
    client: ArmClient,
    parent: ResourceId,
    def: ResourceDef,
}

impl ResourceCollection {
    /// Create a collection; fails if `parent` cannot hold this resource type
    pub fn new(client: ArmClient, parent: ResourceId, def: ResourceDef) -> Result<Self> {
        def.validate_parent(&parent)?;
        Ok(Self {
            client,
            parent,
            def,
        })
    }

    pub fn parent(&self) -> &ResourceId {
        &self.parent
    }

    pub fn definition(&self) -> &ResourceDef {
        &self.def
    }

    fn scope(&self, operation: &str) -> DiagnosticScope {
        DiagnosticScope::new(format!("{}Collection.{}", self.def.display_name, operation))
    }

    fn collection_path(&self) -> String {
        self.parent
            .collection_path(&self.def.provider, &self.def.resource_type)
    }

    fn resource_path(&self, name: &str) -> Result<String> {
        if name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "resource name must not be empty".to_string(),
            ));
        }
        Ok(format!(
            "{}/{}",
            self.collection_path(),
            urlencoding::encode(name)
        ))
    }

    /// Create or replace a resource
    ///
    /// With [`WaitUntil::Completed`] the returned operation has already been
    /// polled to a terminal status.
    pub async fn create_or_update(
        &self,
        wait_until: WaitUntil,
        name: &str,
        data: &GenericResource,
        cancel: &CancellationToken,
    ) -> Result<Operation<GenericResource>> {
        let path = self.resource_path(name)?;
        let body = serde_json::to_value(data)?;
        let scope = self.scope("CreateOrUpdate");

        let raw = scope
            .run(async {
                self.client
                    .put(&path, Some(&self.def.api_version), &body)
                    .await?
                    .error_for_status()
            })
            .await?;

        // 202 without a location fails in Operation::start
        let long_running = raw.status() == 202
            || (OperationLocation::from_response(&raw).is_some()
                && (raw.status() != 200 || has_async_header(&raw)));

        let mut operation = if long_running {
            let client = self.client.clone();
            let api_version = self.def.api_version.clone();
            Operation::start(raw, move |location| {
                let scope = scope.clone();
                let client = client.clone();
                let path = path.clone();
                let api_version = api_version.clone();
                scope.wrap(async move {
                    let status = poll_status(&client, &location).await?;
                    if status.status() != OperationStatus::Succeeded {
                        return Ok(status.map(|()| GenericResource::default()));
                    }
                    // Final state comes from the resource itself
                    let raw = client.get(&path, Some(&api_version)).await?.error_for_status()?;
                    Ok(PollResponse::succeeded(raw.json()?).with_raw(raw))
                })
            })?
        } else {
            let value = raw.json()?;
            Operation::from_value(value, raw)
        };

        if wait_until == WaitUntil::Completed {
            operation
                .wait_until_complete(&self.client.options().polling, cancel)
                .await?;
        }

        Ok(operation)
    }

    /// Get a resource; a missing resource is [`Error::Request`] with status 404
    pub async fn get(&self, name: &str) -> Result<Response<GenericResource>> {
        let path = self.resource_path(name)?;
        self.scope("Get")
            .run(async {
                let raw = self
                    .client
                    .get(&path, Some(&self.def.api_version))
                    .await?
                    .error_for_status()?;
                Ok(Response::new(raw.json()?, raw))
            })
            .await
    }

    /// Check whether a resource exists; 404 is `false`, other failures are errors
    pub async fn exists(&self, name: &str) -> Result<Response<bool>> {
        let path = self.resource_path(name)?;
        self.scope("Exists")
            .run(async {
                let raw = self.client.get(&path, Some(&self.def.api_version)).await?;
                if raw.status() == 404 {
                    return Ok(Response::new(false, raw));
                }
                let raw = raw.error_for_status()?;
                Ok(Response::new(true, raw))
            })
            .await
    }

    /// List all resources of this type under the parent
    pub fn get_all(&self) -> Pageable<GenericResource> {
        let first_client = self.client.clone();
        let next_client = self.client.clone();
        let first_scope = self.scope("GetAll");
        let next_scope = first_scope.clone();
        let path = self.collection_path();
        let api_version = self.def.api_version.clone();

        Pageable::new(
            move |hint: Option<u32>| {
                let client = first_client.clone();
                let api_version = api_version.clone();
                let path = match hint {
                    Some(top) => format!("{path}?$top={top}"),
                    None => path.clone(),
                };
                first_scope.clone().wrap(async move {
                    Page::from_json(client.get(&path, Some(&api_version)).await?)
                })
            },
            move |token: ContinuationToken, _hint| {
                let client = next_client.clone();
                next_scope.clone().wrap(async move {
                    Page::from_json(client.get_url(token.as_str()).await?)
                })
            },
        )
    }

    /// Delete a resource
    pub async fn delete(
        &self,
        wait_until: WaitUntil,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Operation<()>> {
        let path = self.resource_path(name)?;
        let scope = self.scope("Delete");

        let raw = scope
            .run(async {
                self.client
                    .delete(&path, Some(&self.def.api_version))
                    .await?
                    .error_for_status()
            })
            .await?;

        // 202 without a location fails in Operation::start
        let mut operation = if raw.status() == 202 || has_async_header(&raw) {
            let client = self.client.clone();
            Operation::start(raw, move |location| {
                let client = client.clone();
                scope.clone().wrap(async move { poll_status(&client, &location).await })
            })?
        } else {
            Operation::from_value((), raw)
        };

        if wait_until == WaitUntil::Completed {
            operation
                .wait_until_complete(&self.client.options().polling, cancel)
                .await?;
        }

        Ok(operation)
    }
}

fn has_async_header(raw: &RawResponse) -> bool {
    raw.header("azure-asyncoperation").is_some() || raw.header("operation-location").is_some()
}

/// One GET against an operation location, classified without a result value
async fn poll_status(client: &ArmClient, location: &OperationLocation) -> Result<PollResponse<()>> {
    let raw = client.get_url(location.as_str()).await?;
    PollResponse::from_raw(raw, |_| Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm::auth::StaticTokenCredential;
    use crate::arm::client::ClientOptions;
    use crate::resource::get_resource;
    use std::sync::Arc;

    fn collection(parent: &str) -> Result<ResourceCollection> {
        let client = ArmClient::new(
            "https://mgmt.example",
            Arc::new(StaticTokenCredential::new("t")),
            ClientOptions::default(),
        )?;
        ResourceCollection::new(
            client,
            ResourceId::parse(parent)?,
            get_resource("dns-zones").unwrap().clone(),
        )
    }

    #[test]
    fn test_resource_path_encodes_name() {
        let zones = collection("/subscriptions/s/resourceGroups/g").unwrap();
        assert_eq!(
            zones.resource_path("my zone").unwrap(),
            "/subscriptions/s/resourceGroups/g/providers/Microsoft.Network/dnsZones/my%20zone"
        );
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let zones = collection("/subscriptions/s/resourceGroups/g").unwrap();
        assert!(matches!(
            zones.resource_path("  "),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_wrong_parent_is_rejected() {
        let result = collection("/subscriptions/s");
        assert!(matches!(result, Err(Error::InvalidResourceId { .. })));
    }

    #[test]
    fn test_generic_resource_serialization_skips_empty() {
        let resource = GenericResource {
            location: Some("global".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&resource).unwrap(),
            serde_json::json!({"location": "global"})
        );
    }

    #[test]
    fn test_provisioning_state() {
        let resource: GenericResource = serde_json::from_value(serde_json::json!({
            "name": "z",
            "properties": {"provisioningState": "Succeeded"}
        }))
        .unwrap();
        assert_eq!(resource.provisioning_state(), Some("Succeeded"));
    }
}
