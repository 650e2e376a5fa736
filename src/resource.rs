//! Core resource representation.
//!
//! A resource is a typed JSON document (User, Group, custom) described by a
//! schema. The patch engine mutates a caller-owned document in place and
//! assumes exclusive access for the duration of the call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generic SCIM resource: a type identifier plus its JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// The type of this resource (e.g., "User", "Group")
    pub resource_type: String,
    /// The resource document
    pub data: Value,
}

impl Resource {
    /// Create a new resource with the given type and document.
    pub fn new(resource_type: impl Into<String>, data: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            data,
        }
    }

    /// The "id" field from the document, if present.
    pub fn get_id(&self) -> Option<&str> {
        self.data.get("id")?.as_str()
    }

    /// A top-level attribute value by exact key.
    pub fn get_attribute(&self, attribute_name: &str) -> Option<&Value> {
        self.data.get(attribute_name)
    }

    /// The schema URIs declared by this resource's `schemas` attribute.
    pub fn get_schemas(&self) -> Vec<&str> {
        self.data
            .get("schemas")
            .and_then(|s| s.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }
}
