//! Provider integration for PATCH operations.
//!
//! The engine itself is synchronous and storage-agnostic; this module
//! supplies the async seam hosts plug their persistence into. A provider
//! implements [`ResourceStore`] and gets RFC 7644 PATCH handling through
//! [`PatchSupport`]'s default method: load, apply atomically, store only
//! when something changed, and never bump the version or `lastModified`
//! on a no-op.

use crate::error::PatchError;
use crate::patch::engine::PatchEngine;
use crate::patch::request::PatchRequest;
use crate::resource::Resource;
use crate::schema::registry::SchemaRegistry;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use log::debug;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Request context passed through provider calls for tracing.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request
    pub request_id: String,
}

impl RequestContext {
    /// Create a context with a specific request ID.
    pub fn new(request_id: String) -> Self {
        Self { request_id }
    }

    /// Create a context with a generated request ID.
    pub fn with_generated_id() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::with_generated_id()
    }
}

/// Errors surfaced by providers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The addressed resource does not exist
    #[error("Resource not found: {resource_type} with ID {id}")]
    ResourceNotFound {
        /// The type of resource that was not found
        resource_type: String,
        /// The ID of the resource that was not found
        id: String,
    },

    /// The patch itself failed; carries the SCIM error classification
    #[error("Patch failed: {0}")]
    Patch(#[from] PatchError),

    /// Storage-level failure
    #[error("Internal provider error: {message}")]
    Internal {
        /// Description of the failure
        message: String,
    },
}

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Versioned persistence the patch flow builds on.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Load a resource and its current version.
    async fn load(
        &self,
        resource_type: &str,
        id: &str,
        context: &RequestContext,
    ) -> ProviderResult<Option<(Resource, u64)>>;

    /// Store a resource, returning the new version.
    async fn store(&self, resource: Resource, context: &RequestContext) -> ProviderResult<u64>;
}

/// PATCH handling layered over a [`ResourceStore`].
///
/// Implementers only supply the registry; the default `patch_resource`
/// carries the RFC 7644 flow.
#[async_trait]
pub trait PatchSupport: ResourceStore {
    /// The schema registry resources of this provider validate against.
    fn registry(&self) -> &SchemaRegistry;

    /// Load, patch and store a resource.
    ///
    /// A no-op patch (every operation left the document deep-equal) is not
    /// stored, so the version and `meta.lastModified` stay untouched.
    async fn patch_resource(
        &self,
        resource_type: &str,
        id: &str,
        request: &PatchRequest,
        context: &RequestContext,
    ) -> ProviderResult<Resource> {
        let (resource, version) = self
            .load(resource_type, id, context)
            .await?
            .ok_or_else(|| ProviderError::ResourceNotFound {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            })?;

        let engine = PatchEngine::new(self.registry());
        let outcome = engine.apply_patch(&resource, request)?;
        if !outcome.changed {
            debug!(
                "request {}: patch of {}/{} was a no-op at version {}",
                context.request_id, resource_type, id, version
            );
            return Ok(outcome.resource);
        }

        let mut patched = outcome.resource;
        touch_last_modified(&mut patched);
        let new_version = self.store(patched.clone(), context).await?;
        debug!(
            "request {}: patched {}/{} to version {}",
            context.request_id, resource_type, id, new_version
        );
        Ok(patched)
    }
}

/// Set `meta.lastModified` to now, creating `meta` if needed.
fn touch_last_modified(resource: &mut Resource) {
    let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    if let Some(root) = resource.data.as_object_mut() {
        let meta = root
            .entry("meta".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(meta) = meta.as_object_mut() {
            meta.insert("lastModified".to_string(), Value::String(stamp));
        }
    }
}

/// Tokio-backed in-memory provider for tests and examples.
pub struct InMemoryPatchProvider {
    registry: Arc<SchemaRegistry>,
    resources: RwLock<HashMap<String, HashMap<String, (Resource, u64)>>>,
}

impl InMemoryPatchProvider {
    /// Create an empty provider over a registry.
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            resources: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a resource at version 1; the resource must carry an `id`.
    pub async fn seed(&self, resource: Resource) -> ProviderResult<()> {
        let id = resource
            .get_id()
            .ok_or_else(|| ProviderError::Internal {
                message: "seeded resource has no id".to_string(),
            })?
            .to_string();
        let mut resources = self.resources.write().await;
        resources
            .entry(resource.resource_type.clone())
            .or_default()
            .insert(id, (resource, 1));
        Ok(())
    }

    /// The current version of a stored resource.
    pub async fn version(&self, resource_type: &str, id: &str) -> Option<u64> {
        let resources = self.resources.read().await;
        resources
            .get(resource_type)
            .and_then(|by_id| by_id.get(id))
            .map(|(_, version)| *version)
    }
}

#[async_trait]
impl ResourceStore for InMemoryPatchProvider {
    async fn load(
        &self,
        resource_type: &str,
        id: &str,
        _context: &RequestContext,
    ) -> ProviderResult<Option<(Resource, u64)>> {
        let resources = self.resources.read().await;
        Ok(resources
            .get(resource_type)
            .and_then(|by_id| by_id.get(id))
            .cloned())
    }

    async fn store(&self, resource: Resource, _context: &RequestContext) -> ProviderResult<u64> {
        let id = resource
            .get_id()
            .ok_or_else(|| ProviderError::Internal {
                message: "stored resource has no id".to_string(),
            })?
            .to_string();
        let mut resources = self.resources.write().await;
        let slot = resources
            .entry(resource.resource_type.clone())
            .or_default()
            .entry(id)
            .or_insert((resource.clone(), 0));
        slot.0 = resource;
        slot.1 += 1;
        Ok(slot.1)
    }
}

impl PatchSupport for InMemoryPatchProvider {
    fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::request::PatchRequestBuilder;
    use serde_json::json;

    fn provider() -> InMemoryPatchProvider {
        InMemoryPatchProvider::new(Arc::new(SchemaRegistry::new().unwrap()))
    }

    fn jdoe() -> Resource {
        Resource::new("User", json!({"id": "1", "userName": "jdoe"}))
    }

    #[tokio::test]
    async fn patches_and_bumps_version() {
        let provider = provider();
        provider.seed(jdoe()).await.unwrap();
        let context = RequestContext::with_generated_id();

        let request = PatchRequestBuilder::new()
            .replace("userName", json!("jsmith"))
            .build();
        let patched = provider
            .patch_resource("User", "1", &request, &context)
            .await
            .unwrap();
        assert_eq!(patched.data["userName"], json!("jsmith"));
        assert!(patched.data["meta"]["lastModified"].is_string());
        assert_eq!(provider.version("User", "1").await, Some(2));
    }

    #[tokio::test]
    async fn no_op_patch_keeps_version_and_timestamps() {
        let provider = provider();
        provider.seed(jdoe()).await.unwrap();
        let context = RequestContext::default();

        let request = PatchRequestBuilder::new()
            .replace("userName", json!("jdoe"))
            .build();
        let patched = provider
            .patch_resource("User", "1", &request, &context)
            .await
            .unwrap();
        // untouched: no lastModified was written, no version bump happened
        assert!(patched.data.get("meta").is_none());
        assert_eq!(provider.version("User", "1").await, Some(1));
    }

    #[tokio::test]
    async fn missing_resource_is_not_found() {
        let provider = provider();
        let request = PatchRequestBuilder::new()
            .replace("userName", json!("x"))
            .build();
        let err = provider
            .patch_resource("User", "missing", &request, &RequestContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ResourceNotFound { .. }));
    }

    #[tokio::test]
    async fn failed_patch_leaves_store_untouched() {
        let provider = provider();
        provider.seed(jdoe()).await.unwrap();
        let context = RequestContext::default();

        let request = PatchRequestBuilder::new()
            .replace("userName", json!("changed"))
            .replace("badAttr", json!("x"))
            .build();
        let err = provider
            .patch_resource("User", "1", &request, &context)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Patch(_)));

        let (stored, version) = provider
            .load("User", "1", &context)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.data["userName"], json!("jdoe"));
        assert_eq!(version, 1);
    }
}
