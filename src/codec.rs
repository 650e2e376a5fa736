//! JSON codec seam.
//!
//! The engine's only serialization boundary: hosts hand in bytes, the codec
//! produces the document tree and renders it back. The default codec is
//! serde_json; hosts with custom framing can supply their own.

use crate::error::{PatchError, PatchResult};
use serde_json::Value;

/// Parse and emit resource documents.
pub trait JsonCodec: Send + Sync {
    /// Parse a JSON body into a document tree.
    fn parse(&self, bytes: &[u8]) -> PatchResult<Value>;

    /// Emit a document tree as JSON bytes.
    fn emit(&self, node: &Value) -> PatchResult<Vec<u8>>;
}

/// The serde_json-backed default codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJsonCodec;

impl JsonCodec for SerdeJsonCodec {
    fn parse(&self, bytes: &[u8]) -> PatchResult<Value> {
        serde_json::from_slice(bytes).map_err(PatchError::from)
    }

    fn emit(&self, node: &Value) -> PatchResult<Vec<u8>> {
        serde_json::to_vec(node).map_err(PatchError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_documents() {
        let codec = SerdeJsonCodec;
        let doc = json!({"userName": "jdoe", "active": true});
        let bytes = codec.emit(&doc).unwrap();
        assert_eq!(codec.parse(&bytes).unwrap(), doc);
    }

    #[test]
    fn parse_failure_is_invalid_syntax() {
        let err = SerdeJsonCodec.parse(b"{ not json").unwrap_err();
        assert_eq!(err.scim_type(), "invalidSyntax");
    }
}
