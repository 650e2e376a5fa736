//! Schema registry for loading, managing, and resolving SCIM schemas.
//!
//! The registry is built once at startup and is thereafter read-only, so
//! concurrent readers need no synchronization. It resolves attribute names
//! in all three forms the patch path language allows: fully-qualified URNs,
//! dotted short forms against a resource type, and extension URIs.

use super::embedded;
use super::types::{AttributeDefinition, Schema};
use crate::error::{PatchError, PatchResult};

use log::debug;
use std::collections::HashMap;

/// An attribute resolved against the registry.
///
/// Carries the schema the attribute belongs to so callers can decide
/// whether the value lives at the resource root or inside an extension
/// container keyed by URI.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedAttribute<'a> {
    /// URI of the schema defining the attribute
    pub schema_uri: &'a str,
    /// Whether that schema is an extension of the resource's base schema
    pub is_extension: bool,
    /// The top-level attribute definition
    pub attribute: &'a AttributeDefinition,
    /// Sub-attribute definition when the name used dotted form
    pub sub_attribute: Option<&'a AttributeDefinition>,
}

/// Registry of SCIM schemas with attribute resolution.
///
/// Ships with the embedded core User and Group schemas plus the enterprise
/// User extension; further schemas and extensions can be registered before
/// the registry is shared.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Schema>,
    /// Resource type name ("User") to base schema URI
    resource_types: HashMap<String, String>,
    /// Base schema URI to its extension URIs, in registration order
    extensions: HashMap<String, Vec<String>>,
}

impl SchemaRegistry {
    /// Create a registry with the embedded core schemas.
    ///
    /// Registers User, Group and the enterprise User extension. This is the
    /// recommended constructor; it requires no file I/O.
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let user: Schema = serde_json::from_str(embedded::core_user_schema())?;
        let group: Schema = serde_json::from_str(embedded::core_group_schema())?;
        let enterprise: Schema = serde_json::from_str(embedded::enterprise_user_schema())?;

        let mut registry = Self {
            schemas: HashMap::new(),
            resource_types: HashMap::new(),
            extensions: HashMap::new(),
        };
        registry.add_resource_type("User", user);
        let user_uri = registry.resource_types["User"].clone();
        registry.add_resource_type("Group", group);
        registry.add_extension(&user_uri, enterprise);
        Ok(registry)
    }

    /// Register a base schema for a resource type.
    pub fn add_resource_type(&mut self, resource_type: impl Into<String>, schema: Schema) {
        let resource_type = resource_type.into();
        debug!("registering resource type {} -> {}", resource_type, schema.id);
        self.resource_types
            .insert(resource_type, schema.id.clone());
        self.schemas.insert(schema.id.clone(), schema);
    }

    /// Register an extension schema for an already-registered base schema.
    pub fn add_extension(&mut self, base_uri: &str, schema: Schema) {
        debug!("registering extension {} on {}", schema.id, base_uri);
        self.extensions
            .entry(base_uri.to_string())
            .or_default()
            .push(schema.id.clone());
        self.schemas.insert(schema.id.clone(), schema);
    }

    /// Get a schema by its URI.
    pub fn schema_by_uri(&self, uri: &str) -> Option<&Schema> {
        self.schemas.get(uri)
    }

    /// The base schema URI for a resource type name.
    pub fn base_schema_uri(&self, resource_type: &str) -> Option<&str> {
        self.resource_types.get(resource_type).map(String::as_str)
    }

    /// Whether a URI names a registered extension schema.
    ///
    /// URI matching is case-sensitive.
    pub fn is_extension(&self, uri: &str) -> bool {
        self.extensions.values().any(|exts| exts.iter().any(|e| e == uri))
    }

    /// The extension URIs registered for a resource type, in order.
    pub fn extensions_of(&self, resource_type: &str) -> &[String] {
        self.resource_types
            .get(resource_type)
            .and_then(|uri| self.extensions.get(uri))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resolve an attribute name against a resource type.
    ///
    /// Accepts a fully-qualified name (`urn:...:User:name.givenName`), a
    /// dotted short form (`name.givenName`) matched against the base schema
    /// and then each extension, or a bare name. The local part is matched
    /// case-insensitively; the URI part is case-sensitive. Unresolvable
    /// names fail with an unknown-attribute error.
    pub fn resolve<'a>(
        &'a self,
        resource_type: &str,
        name: &str,
    ) -> PatchResult<ResolvedAttribute<'a>> {
        if let Some((uri, local)) = self.split_qualified(name) {
            let schema = self
                .schemas
                .get(uri)
                .ok_or_else(|| PatchError::unknown_attribute(name))?;
            return self.resolve_local(schema, local, self.is_extension(uri));
        }

        let base_uri = self
            .base_schema_uri(resource_type)
            .ok_or_else(|| PatchError::unknown_attribute(name))?;
        let base = &self.schemas[base_uri];
        if let Ok(resolved) = self.resolve_local(base, name, false) {
            return Ok(resolved);
        }
        for ext_uri in self.extensions_of(resource_type) {
            let ext = &self.schemas[ext_uri];
            if let Ok(resolved) = self.resolve_local(ext, name, true) {
                return Ok(resolved);
            }
        }
        Err(PatchError::unknown_attribute(name))
    }

    /// Split a fully-qualified name into `(schema URI, local part)`.
    ///
    /// The URI part is the longest registered schema id that prefixes the
    /// name followed by `:`. Returns `None` when no registered URI matches,
    /// letting the caller fall back to short-form resolution.
    fn split_qualified<'a, 'b>(&'a self, name: &'b str) -> Option<(&'a str, &'b str)> {
        let mut best: Option<(&str, &str)> = None;
        for uri in self.schemas.keys() {
            if let Some(rest) = name.strip_prefix(uri.as_str()) {
                if let Some(local) = rest.strip_prefix(':') {
                    if !local.is_empty()
                        && best.map(|(u, _)| uri.len() > u.len()).unwrap_or(true)
                    {
                        best = Some((uri.as_str(), local));
                    }
                }
            }
        }
        best
    }

    /// Resolve a `name` or `name.sub` local part within one schema.
    fn resolve_local<'a>(
        &'a self,
        schema: &'a Schema,
        local: &str,
        is_extension: bool,
    ) -> PatchResult<ResolvedAttribute<'a>> {
        let (base, sub) = match local.split_once('.') {
            Some((base, sub)) => (base, Some(sub)),
            None => (local, None),
        };
        let attribute = schema
            .find_attribute(base)
            .ok_or_else(|| PatchError::unknown_attribute(local))?;
        let sub_attribute = match sub {
            Some(sub_name) => Some(
                attribute
                    .find_sub_attribute(sub_name)
                    .ok_or_else(|| PatchError::unknown_attribute(local))?,
            ),
            None => None,
        };
        Ok(ResolvedAttribute {
            schema_uri: &schema.id,
            is_extension,
            attribute,
            sub_attribute,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{AttributeType, Mutability};

    const ENTERPRISE: &str = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new().unwrap()
    }

    #[test]
    fn resolves_short_form_case_insensitively() {
        let reg = registry();
        let resolved = reg.resolve("User", "USERNAME").unwrap();
        assert_eq!(resolved.attribute.name, "userName");
        assert!(!resolved.is_extension);
    }

    #[test]
    fn resolves_dotted_short_form() {
        let reg = registry();
        let resolved = reg.resolve("User", "name.givenname").unwrap();
        assert_eq!(resolved.attribute.name, "name");
        assert_eq!(resolved.sub_attribute.unwrap().name, "givenName");
    }

    #[test]
    fn resolves_fully_qualified_name() {
        let reg = registry();
        let name = "urn:ietf:params:scim:schemas:core:2.0:User:userName";
        let resolved = reg.resolve("User", name).unwrap();
        assert_eq!(resolved.attribute.name, "userName");
        assert_eq!(resolved.schema_uri, "urn:ietf:params:scim:schemas:core:2.0:User");
    }

    #[test]
    fn resolves_extension_attribute_by_uri() {
        let reg = registry();
        let name = format!("{ENTERPRISE}:department");
        let resolved = reg.resolve("User", &name).unwrap();
        assert!(resolved.is_extension);
        assert_eq!(resolved.attribute.name, "department");
        assert_eq!(resolved.schema_uri, ENTERPRISE);
    }

    #[test]
    fn resolves_extension_attribute_by_short_name() {
        let reg = registry();
        let resolved = reg.resolve("User", "department").unwrap();
        assert!(resolved.is_extension);
        assert_eq!(resolved.schema_uri, ENTERPRISE);
    }

    #[test]
    fn resolves_qualified_dotted_sub_attribute() {
        let reg = registry();
        let name = format!("{ENTERPRISE}:manager.displayName");
        let resolved = reg.resolve("User", &name).unwrap();
        assert_eq!(resolved.attribute.name, "manager");
        assert_eq!(resolved.sub_attribute.unwrap().name, "displayName");
        assert_eq!(resolved.sub_attribute.unwrap().mutability, Mutability::ReadOnly);
    }

    #[test]
    fn unknown_attribute_fails() {
        let reg = registry();
        let err = reg.resolve("User", "shoeSize").unwrap_err();
        assert_eq!(err.scim_type(), "invalidPath");
    }

    #[test]
    fn uri_part_is_case_sensitive() {
        let reg = registry();
        let name = "URN:IETF:params:scim:schemas:core:2.0:User:userName";
        assert!(reg.resolve("User", name).is_err());
    }

    #[test]
    fn knows_its_extensions() {
        let reg = registry();
        assert!(reg.is_extension(ENTERPRISE));
        assert!(!reg.is_extension("urn:ietf:params:scim:schemas:core:2.0:User"));
        assert_eq!(reg.extensions_of("User"), [ENTERPRISE.to_string()]);
        assert!(reg.extensions_of("Group").is_empty());
    }

    #[test]
    fn common_attributes_are_read_only() {
        let reg = registry();
        let id = reg.resolve("User", "id").unwrap();
        assert_eq!(id.attribute.mutability, Mutability::ReadOnly);
        let meta = reg.resolve("User", "meta.lastModified").unwrap();
        assert_eq!(meta.sub_attribute.unwrap().data_type, AttributeType::DateTime);
    }
}
