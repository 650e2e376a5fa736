//! Error types for SCIM PATCH processing.
//!
//! Every failure the engine can report carries the machine-readable
//! `scimType` code defined by RFC 7644 Section 3.12 together with a human
//! readable message and, where available, the offending path or position.
//! The engine never logs; callers format these errors into SCIM error
//! responses via [`ScimErrorResponse`].

use serde::Serialize;

/// Failures raised by the patch engine, the filter/path parser and the
/// schema registry.
///
/// All variants map onto HTTP 400; the envelope layer may remap selected
/// codes (e.g. `noTarget`) onto other statuses per its own rules.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatchError {
    /// The path expression is syntactically or structurally invalid.
    #[error("Invalid path expression '{path}': {detail}")]
    InvalidPath {
        /// The offending path text
        path: String,
        /// Description of what makes the path invalid
        detail: String,
    },

    /// The filter expression is syntactically invalid or ill-typed.
    #[error("Invalid filter at position {position}: {detail}")]
    InvalidFilter {
        /// Byte offset of the error within the filter text
        position: usize,
        /// Description of what makes the filter invalid
        detail: String,
    },

    /// A value could not be coerced to the attribute's declared type.
    #[error("Invalid value for attribute '{attribute}': {detail}")]
    InvalidValue {
        /// The attribute whose value was rejected
        attribute: String,
        /// Description of the coercion failure
        detail: String,
    },

    /// A filtered path matched no element of the target array.
    #[error("No target matched path '{path}'")]
    NoTarget {
        /// The path whose filter selected nothing
        path: String,
    },

    /// The path names an attribute no registered schema defines.
    #[error("Unknown attribute '{attribute}'")]
    UnknownAttribute {
        /// The unresolvable attribute name
        attribute: String,
    },

    /// The operation violates the attribute's mutability characteristics.
    #[error("Attribute '{attribute}' cannot be modified: {detail}")]
    Mutability {
        /// The protected attribute
        attribute: String,
        /// Which characteristic was violated
        detail: String,
    },

    /// The request body or an operation value is not well-formed.
    #[error("Malformed request: {detail}")]
    JsonSyntax {
        /// Description of the structural problem
        detail: String,
    },
}

impl PatchError {
    /// The RFC 7644 `scimType` code for this error.
    pub fn scim_type(&self) -> &'static str {
        match self {
            Self::InvalidPath { .. } | Self::UnknownAttribute { .. } => "invalidPath",
            Self::InvalidFilter { .. } => "invalidFilter",
            Self::InvalidValue { .. } => "invalidValue",
            Self::NoTarget { .. } => "noTarget",
            Self::Mutability { .. } => "mutability",
            Self::JsonSyntax { .. } => "invalidSyntax",
        }
    }

    /// The HTTP status the error maps onto at this layer.
    pub fn http_status(&self) -> u16 {
        400
    }

    /// Create an invalid-path error.
    pub fn invalid_path(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// Create an invalid-filter error.
    pub fn invalid_filter(position: usize, detail: impl Into<String>) -> Self {
        Self::InvalidFilter {
            position,
            detail: detail.into(),
        }
    }

    /// Create an invalid-value error.
    pub fn invalid_value(attribute: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidValue {
            attribute: attribute.into(),
            detail: detail.into(),
        }
    }

    /// Create a no-target error.
    pub fn no_target(path: impl Into<String>) -> Self {
        Self::NoTarget { path: path.into() }
    }

    /// Create an unknown-attribute error.
    pub fn unknown_attribute(attribute: impl Into<String>) -> Self {
        Self::UnknownAttribute {
            attribute: attribute.into(),
        }
    }

    /// Create a mutability violation error.
    pub fn mutability(attribute: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Mutability {
            attribute: attribute.into(),
            detail: detail.into(),
        }
    }

    /// Create a malformed-request error.
    pub fn json_syntax(detail: impl Into<String>) -> Self {
        Self::JsonSyntax {
            detail: detail.into(),
        }
    }

    /// Render this error as an RFC 7644 error response body.
    pub fn to_response(&self) -> ScimErrorResponse {
        ScimErrorResponse {
            schemas: vec!["urn:ietf:params:scim:api:messages:2.0:Error".to_string()],
            scim_type: self.scim_type().to_string(),
            detail: self.to_string(),
            status: self.http_status().to_string(),
        }
    }
}

impl From<serde_json::Error> for PatchError {
    fn from(error: serde_json::Error) -> Self {
        Self::JsonSyntax {
            detail: error.to_string(),
        }
    }
}

/// Serializable RFC 7644 error response body.
///
/// The envelope layer writes this directly onto the wire.
#[derive(Debug, Clone, Serialize)]
pub struct ScimErrorResponse {
    /// Always the SCIM Error message URN
    pub schemas: Vec<String>,
    /// Machine-readable error code
    #[serde(rename = "scimType")]
    pub scim_type: String,
    /// Human-readable description
    pub detail: String,
    /// HTTP status as a string, per RFC 7644 examples
    pub status: String,
}

/// Result type alias for patch processing.
pub type PatchResult<T> = Result<T, PatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scim_type_codes_match_rfc() {
        assert_eq!(PatchError::invalid_path("a b", "bad").scim_type(), "invalidPath");
        assert_eq!(PatchError::invalid_filter(3, "bad").scim_type(), "invalidFilter");
        assert_eq!(PatchError::invalid_value("age", "nan").scim_type(), "invalidValue");
        assert_eq!(PatchError::no_target("emails[type eq \"x\"]").scim_type(), "noTarget");
        assert_eq!(PatchError::unknown_attribute("nope").scim_type(), "invalidPath");
        assert_eq!(PatchError::mutability("id", "read-only").scim_type(), "mutability");
        assert_eq!(PatchError::json_syntax("truncated").scim_type(), "invalidSyntax");
    }

    #[test]
    fn response_body_shape() {
        let body = PatchError::no_target("emails[type eq \"work\"]").to_response();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json["schemas"][0],
            "urn:ietf:params:scim:api:messages:2.0:Error"
        );
        assert_eq!(json["scimType"], "noTarget");
        assert_eq!(json["status"], "400");
    }

    #[test]
    fn json_error_converts_to_invalid_syntax() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let patch_err = PatchError::from(err);
        assert_eq!(patch_err.scim_type(), "invalidSyntax");
    }
}
