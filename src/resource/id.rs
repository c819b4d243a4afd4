//! Resource identifiers
//!
//! `/subscriptions/{s}/resourceGroups/{g}/providers/{ns}/{type}/{name}[/{type}/{name}...]`

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

const PROVIDERS: &str = "providers";

/// Parsed management resource identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    /// (key, value) segment pairs in path order
    pairs: Vec<(String, String)>,
}

impl ResourceId {
    pub fn parse(id: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidResourceId {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let Some(rest) = id.strip_prefix('/') else {
            return Err(invalid("must start with '/'"));
        };

        let segments: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("empty path segment"));
        }
        if segments.len() % 2 != 0 {
            return Err(invalid("expected key/value segment pairs"));
        }
        if !segments[0].eq_ignore_ascii_case("subscriptions") {
            return Err(invalid("must start with /subscriptions"));
        }

        let pairs: Vec<(String, String)> = segments
            .chunks(2)
            .map(|pair| (pair[0].to_string(), pair[1].to_string()))
            .collect();

        if pairs
            .last()
            .is_some_and(|(key, _)| key.eq_ignore_ascii_case(PROVIDERS))
        {
            return Err(invalid("missing resource type after provider namespace"));
        }

        Ok(Self { pairs })
    }

    fn value_of(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.value_of("subscriptions")
    }

    pub fn resource_group_name(&self) -> Option<&str> {
        self.value_of("resourceGroups")
    }

    /// Innermost provider namespace
    pub fn provider_namespace(&self) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(PROVIDERS))
            .map(|(_, v)| v.as_str())
    }

    /// Last segment
    pub fn name(&self) -> &str {
        self.pairs.last().map(|(_, v)| v.as_str()).unwrap_or_default()
    }

    /// Full resource type, e.g. `Microsoft.Network/dnsZones/A`
    pub fn resource_type(&self) -> String {
        let mut namespace: Option<&str> = None;
        let mut types: Vec<&str> = Vec::new();

        for (key, value) in &self.pairs {
            if key.eq_ignore_ascii_case(PROVIDERS) {
                namespace = Some(value);
                types.clear();
            } else if namespace.is_some() {
                types.push(key);
            }
        }

        match namespace {
            Some(ns) => format!("{}/{}", ns, types.join("/")),
            None => {
                let key = self.pairs.last().map(|(k, _)| k.as_str()).unwrap_or_default();
                format!("Microsoft.Resources/{key}")
            }
        }
    }

    /// Containing resource, `None` for a subscription
    pub fn parent(&self) -> Option<Self> {
        if self.pairs.len() <= 1 {
            return None;
        }
        let mut pairs = self.pairs[..self.pairs.len() - 1].to_vec();
        if pairs
            .last()
            .is_some_and(|(key, _)| key.eq_ignore_ascii_case(PROVIDERS))
        {
            pairs.pop();
        }
        Some(Self { pairs })
    }

    /// Path of the collection of `resource_type` resources under this id
    ///
    /// The provider segment is only added when this id is not already inside
    /// `provider`. `Microsoft.Resources` types (resource groups) hang directly
    /// off the subscription.
    pub fn collection_path(&self, provider: &str, resource_type: &str) -> String {
        let same_provider = self
            .provider_namespace()
            .is_some_and(|ns| ns.eq_ignore_ascii_case(provider));
        let builtin = provider.eq_ignore_ascii_case("Microsoft.Resources");

        if same_provider || builtin {
            format!("{self}/{resource_type}")
        } else {
            format!("{self}/{PROVIDERS}/{provider}/{resource_type}")
        }
    }

    /// Id of the child resource `name` of type `resource_type`
    pub fn child(&self, provider: &str, resource_type: &str, name: &str) -> Result<Self> {
        Self::parse(&format!("{}/{}", self.collection_path(provider, resource_type), name))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.pairs {
            write!(f, "/{key}/{value}")?;
        }
        Ok(())
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZONE: &str =
        "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.Network/dnsZones/example.com";

    #[test]
    fn test_parse_components() {
        let id = ResourceId::parse(ZONE).unwrap();
        assert_eq!(id.subscription_id(), Some("sub-1"));
        assert_eq!(id.resource_group_name(), Some("rg-1"));
        assert_eq!(id.provider_namespace(), Some("Microsoft.Network"));
        assert_eq!(id.resource_type(), "Microsoft.Network/dnsZones");
        assert_eq!(id.name(), "example.com");
        assert_eq!(id.to_string(), ZONE);
    }

    #[test]
    fn test_builtin_types() {
        let sub = ResourceId::parse("/subscriptions/s").unwrap();
        assert_eq!(sub.resource_type(), "Microsoft.Resources/subscriptions");
        assert!(sub.parent().is_none());

        let group = ResourceId::parse("/subscriptions/s/resourceGroups/g/").unwrap();
        assert_eq!(group.resource_type(), "Microsoft.Resources/resourceGroups");
        assert_eq!(group.parent().unwrap(), sub);
    }

    #[test]
    fn test_parent_skips_provider_pair() {
        let id = ResourceId::parse(ZONE).unwrap();
        let parent = id.parent().unwrap();
        assert_eq!(parent.to_string(), "/subscriptions/sub-1/resourceGroups/rg-1");
    }

    #[test]
    fn test_child_of_same_provider() {
        let zone = ResourceId::parse(ZONE).unwrap();
        let record = zone.child("Microsoft.Network", "A", "www").unwrap();
        assert_eq!(record.to_string(), format!("{ZONE}/A/www"));
        assert_eq!(record.resource_type(), "Microsoft.Network/dnsZones/A");
        assert_eq!(record.parent().unwrap(), zone);
    }

    #[test]
    fn test_collection_path() {
        let group = ResourceId::parse("/subscriptions/s/resourceGroups/g").unwrap();
        assert_eq!(
            group.collection_path("Microsoft.Relay", "namespaces"),
            "/subscriptions/s/resourceGroups/g/providers/Microsoft.Relay/namespaces"
        );

        let sub = ResourceId::parse("/subscriptions/s").unwrap();
        assert_eq!(
            sub.collection_path("Microsoft.Resources", "resourceGroups"),
            "/subscriptions/s/resourceGroups"
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "subscriptions/s",
            "/subscriptions",
            "/subscriptions//resourceGroups/g",
            "/tenants/t",
            "/subscriptions/s/resourceGroups/g/providers/Microsoft.Network",
        ] {
            let err = ResourceId::parse(bad).unwrap_err();
            assert!(
                matches!(err, Error::InvalidResourceId { .. }),
                "expected {bad} to be rejected"
            );
        }
    }
}
