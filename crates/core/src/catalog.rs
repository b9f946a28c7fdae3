//! Tool descriptors and the in-memory catalog cache.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

/// Describes a tool exposed by the upstream resource server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within a catalog.
    pub name: String,
    /// Human- and model-readable description.
    #[serde(default)]
    pub description: String,
    /// Argument definition as a [JSON schema](https://json-schema.org/).
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// Cache population state, for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogStatus {
    /// Nothing fetched yet, or explicitly invalidated.
    Empty,
    /// A catalog is cached.
    Populated {
        /// Number of cached descriptors.
        tools: usize,
    },
}

/// An explicit in-memory cache for the tool catalog.
///
/// The cache is owned by one upstream client rather than living in a
/// module-level singleton, so separate orchestrator instances (test
/// instances especially) never share hidden state. The upstream owns the
/// tool set and may change it at any time, so a cached catalog is always
/// potentially stale; `invalidate` forces the next reader to refetch.
///
/// Population is idempotent: a second concurrent populate simply
/// replaces the cache with an equivalent catalog, and readers never
/// block on one in progress.
#[derive(Debug, Default)]
pub struct CatalogCache {
    tools: RwLock<Option<Arc<Vec<ToolDescriptor>>>>,
}

impl CatalogCache {
    /// Creates an empty cache.
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the cached catalog, if any.
    pub async fn get(&self) -> Option<Arc<Vec<ToolDescriptor>>> {
        self.tools.read().await.clone()
    }

    /// Stores a freshly fetched catalog and returns the shared handle.
    pub async fn populate(
        &self,
        tools: Vec<ToolDescriptor>,
    ) -> Arc<Vec<ToolDescriptor>> {
        let tools = Arc::new(tools);
        *self.tools.write().await = Some(Arc::clone(&tools));
        tools
    }

    /// Drops the cached catalog.
    pub async fn invalidate(&self) {
        *self.tools.write().await = None;
    }

    /// Reports the population state.
    pub async fn status(&self) -> CatalogStatus {
        match &*self.tools.read().await {
            None => CatalogStatus::Empty,
            Some(tools) => CatalogStatus::Populated { tools: tools.len() },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_owned(),
            description: format!("The {name} tool"),
            input_schema: json!({ "type": "object" }),
        }
    }

    #[test]
    fn test_descriptor_wire_names() {
        let raw = json!({
            "name": "fetch_scripture",
            "description": "Fetches a passage",
            "inputSchema": {
                "type": "object",
                "properties": { "reference": { "type": "string" } },
                "required": ["reference"],
            },
        });
        let descriptor: ToolDescriptor =
            serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(descriptor.name, "fetch_scripture");
        assert_eq!(
            descriptor.input_schema["required"],
            json!(["reference"])
        );

        // The schema field keeps its wire spelling on the way out.
        let encoded = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(encoded, raw);
    }

    #[test]
    fn test_descriptor_defaults() {
        let descriptor: ToolDescriptor =
            serde_json::from_value(json!({ "name": "bare" })).unwrap();
        assert_eq!(descriptor.description, "");
        assert_eq!(descriptor.input_schema, Value::Null);
    }

    #[tokio::test]
    async fn test_populate_invalidate_status() {
        let cache = CatalogCache::new();
        assert_eq!(cache.status().await, CatalogStatus::Empty);
        assert!(cache.get().await.is_none());

        cache.populate(vec![descriptor("a"), descriptor("b")]).await;
        assert_eq!(
            cache.status().await,
            CatalogStatus::Populated { tools: 2 }
        );
        assert_eq!(cache.get().await.unwrap().len(), 2);

        cache.invalidate().await;
        assert_eq!(cache.status().await, CatalogStatus::Empty);
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_repopulate_replaces() {
        let cache = CatalogCache::new();
        let first = cache.populate(vec![descriptor("a")]).await;
        let second = cache.populate(vec![descriptor("b")]).await;
        assert_eq!(first[0].name, "a");
        assert_eq!(second[0].name, "b");
        assert_eq!(cache.get().await.unwrap()[0].name, "b");
    }
}
