//! Shared fixtures and helpers for integration tests.
#![allow(dead_code)]

use scim_patch::{PatchEngine, PatchOutcome, PatchRequest, PatchResult, Resource, SchemaRegistry};
use serde_json::{Value, json};

/// The enterprise User extension URI.
pub const ENTERPRISE: &str = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

/// A registry with the embedded core schemas.
pub fn registry() -> SchemaRegistry {
    let _ = env_logger::builder().is_test(true).try_init();
    SchemaRegistry::new().expect("embedded schemas load")
}

/// Apply a request to a resource with a fresh registry.
pub fn apply(resource: &Resource, request: &PatchRequest) -> PatchResult<PatchOutcome> {
    let registry = registry();
    let engine = PatchEngine::new(&registry);
    engine.apply_patch(resource, request)
}

/// A User resource with the fields most scenarios touch.
pub fn sample_user() -> Resource {
    Resource::new(
        "User",
        json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
            "id": "2819c223-7f76-453a-919d-413861904646",
            "userName": "jdoe",
            "displayName": "John Doe",
            "active": true,
            "name": {
                "givenName": "John",
                "familyName": "Doe"
            },
            "emails": [
                {"type": "work", "value": "jdoe@work.example.com", "primary": true},
                {"type": "home", "value": "jdoe@home.example.com"}
            ],
            "phoneNumbers": [
                {"type": "work", "value": "+1-555-0100"},
                {"type": "fax", "value": "+1-555-0199"}
            ]
        }),
    )
}

/// A Group resource with two members.
pub fn sample_group() -> Resource {
    Resource::new(
        "Group",
        json!({
            "schemas": ["urn:ietf:params:scim:schemas:core:2.0:Group"],
            "id": "e9e30dba-f08f-4109-8486-d5c6a331660a",
            "displayName": "Tour Guides",
            "members": [
                {"value": "2819c223", "type": "User"},
                {"value": "902c246b", "type": "User"}
            ]
        }),
    )
}

/// Fetch a value at a `.`-separated pointer for assertions.
pub fn value_at<'v>(doc: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = doc;
    for part in path.split('.') {
        current = match part.parse::<usize>() {
            Ok(index) => current.get(index)?,
            Err(_) => current.get(part)?,
        };
    }
    Some(current)
}
