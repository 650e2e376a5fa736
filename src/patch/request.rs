//! Wire model of the RFC 7644 PatchOp message, plus a client-side builder.
//!
//! A patch body looks like:
//!
//! ```json
//! { "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
//!   "Operations": [ { "op": "replace", "path": "userName", "value": "x" } ] }
//! ```
//!
//! The `value` stays an opaque JSON node until the engine has resolved the
//! target attribute, because its expected type depends on the target.

use crate::error::{PatchError, PatchResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// The message URN every patch body must declare.
pub const PATCH_OP_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

/// A full PatchOp request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchRequest {
    /// Message schemas; must contain [`PATCH_OP_SCHEMA`]
    pub schemas: Vec<String>,
    /// Operations, applied in order
    #[serde(rename = "Operations")]
    pub operations: Vec<PatchOperation>,
}

impl PatchRequest {
    /// Create a request with the correct `schemas` envelope.
    pub fn new(operations: Vec<PatchOperation>) -> Self {
        Self {
            schemas: vec![PATCH_OP_SCHEMA.to_string()],
            operations,
        }
    }

    /// Deserialize and validate a request from a JSON body.
    pub fn from_json(body: &Value) -> PatchResult<Self> {
        let request: Self = serde_json::from_value(body.clone())?;
        request.validate()?;
        Ok(request)
    }

    /// Check the message envelope.
    ///
    /// The `schemas` list must contain the PatchOp URN and at least one
    /// operation must be present.
    pub fn validate(&self) -> PatchResult<()> {
        if !self.schemas.iter().any(|s| s == PATCH_OP_SCHEMA) {
            return Err(PatchError::json_syntax(format!(
                "patch request must declare schema '{PATCH_OP_SCHEMA}'"
            )));
        }
        if self.operations.is_empty() {
            return Err(PatchError::json_syntax(
                "patch request must contain at least one operation",
            ));
        }
        Ok(())
    }
}

/// One patch operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchOperation {
    /// The operation kind
    pub op: PatchOpKind,
    /// Optional attribute path; required for `remove`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Scalar, object or array; required for `add` and `replace`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    /// Create an `add` operation targeting a path.
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOpKind::Add,
            path: Some(path.into()),
            value: Some(value),
        }
    }

    /// Create an `add` operation merging into the resource root.
    pub fn add_root(value: Value) -> Self {
        Self {
            op: PatchOpKind::Add,
            path: None,
            value: Some(value),
        }
    }

    /// Create a `replace` operation targeting a path.
    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOpKind::Replace,
            path: Some(path.into()),
            value: Some(value),
        }
    }

    /// Create a `replace` operation over the resource root.
    pub fn replace_root(value: Value) -> Self {
        Self {
            op: PatchOpKind::Replace,
            path: None,
            value: Some(value),
        }
    }

    /// Create a `remove` operation.
    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOpKind::Remove,
            path: Some(path.into()),
            value: None,
        }
    }
}

/// The three RFC 7644 patch operation kinds.
///
/// Serialized lowercase; deserialization accepts any casing since clients
/// in the wild send `Add` and `ADD` as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOpKind {
    /// Add or merge a value
    Add,
    /// Overwrite a value
    Replace,
    /// Delete a value
    Remove,
}

impl PatchOpKind {
    /// The lowercase wire token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Replace => "replace",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for PatchOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PatchOpKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PatchOpKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        match token.to_ascii_lowercase().as_str() {
            "add" => Ok(Self::Add),
            "replace" => Ok(Self::Replace),
            "remove" => Ok(Self::Remove),
            _ => Err(serde::de::Error::custom(format!(
                "unsupported patch operation '{token}'"
            ))),
        }
    }
}

/// Fluent builder for patch request bodies, symmetric to the server-side
/// engine. Useful for clients issuing PATCH calls.
#[derive(Debug, Default)]
pub struct PatchRequestBuilder {
    operations: Vec<PatchOperation>,
}

impl PatchRequestBuilder {
    /// Start an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an `add` operation.
    pub fn add(mut self, path: impl Into<String>, value: Value) -> Self {
        self.operations.push(PatchOperation::add(path, value));
        self
    }

    /// Append an `add` operation with no path.
    pub fn add_root(mut self, value: Value) -> Self {
        self.operations.push(PatchOperation::add_root(value));
        self
    }

    /// Append a `replace` operation.
    pub fn replace(mut self, path: impl Into<String>, value: Value) -> Self {
        self.operations.push(PatchOperation::replace(path, value));
        self
    }

    /// Append a `replace` operation with no path.
    pub fn replace_root(mut self, value: Value) -> Self {
        self.operations.push(PatchOperation::replace_root(value));
        self
    }

    /// Append a `remove` operation.
    pub fn remove(mut self, path: impl Into<String>) -> Self {
        self.operations.push(PatchOperation::remove(path));
        self
    }

    /// Finish the request with the PatchOp envelope.
    pub fn build(self) -> PatchRequest {
        PatchRequest::new(self.operations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_wire_body() {
        let body = json!({
            "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
            "Operations": [
                {"op": "Replace", "path": "userName", "value": "new"},
                {"op": "REMOVE", "path": "nickName"}
            ]
        });
        let request = PatchRequest::from_json(&body).unwrap();
        assert_eq!(request.operations.len(), 2);
        assert_eq!(request.operations[0].op, PatchOpKind::Replace);
        assert_eq!(request.operations[1].op, PatchOpKind::Remove);
        assert!(request.operations[1].value.is_none());
    }

    #[test]
    fn rejects_missing_envelope() {
        let body = json!({
            "schemas": ["urn:something:else"],
            "Operations": [{"op": "add", "value": {"a": 1}}]
        });
        let err = PatchRequest::from_json(&body).unwrap_err();
        assert_eq!(err.scim_type(), "invalidSyntax");
    }

    #[test]
    fn rejects_empty_operations() {
        let body = json!({
            "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
            "Operations": []
        });
        assert!(PatchRequest::from_json(&body).is_err());
    }

    #[test]
    fn rejects_unknown_op_token() {
        let body = json!({
            "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
            "Operations": [{"op": "upsert", "value": 1}]
        });
        assert!(PatchRequest::from_json(&body).is_err());
    }

    #[test]
    fn builder_produces_valid_envelope() {
        let request = PatchRequestBuilder::new()
            .replace("active", json!(false))
            .add("emails", json!({"value": "x@y", "type": "home"}))
            .remove(r#"phoneNumbers[type eq "fax"]"#)
            .build();
        assert!(request.validate().is_ok());
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["schemas"][0], PATCH_OP_SCHEMA);
        assert_eq!(body["Operations"][0]["op"], "replace");
        // remove carries no value key at all
        assert!(body["Operations"][2].get("value").is_none());
    }
}
