//! # SCIM 2.0 PATCH Engine for Rust
//!
//! An RFC 7644 Section 3.5.2 PATCH engine with the filter/path language it
//! depends on: a schema registry resolving RFC 7643 attribute definitions
//! (extensions included), a PEG-based parser for filter and path
//! expressions, a schema-aware filter evaluator, and an engine applying
//! `add`/`replace`/`remove` operations atomically with equality-based no-op
//! detection.
//!
//! ## Features
//!
//! - Full path grammar: dotted forms, URI-qualified names, bracketed
//!   filters (`emails[type eq "work"].value`), bare extension URIs
//! - Schema-driven type coercion and mutability enforcement
//! - Atomic multi-operation requests over a defensive copy
//! - `changed` reporting so callers never bump `lastModified` on no-ops
//! - RFC 7644 `scimType` error classification
//! - Async provider seam with a bundled in-memory implementation
//!
//! ## Quick Start
//!
//! ```rust
//! use scim_patch::{PatchEngine, PatchRequestBuilder, Resource, SchemaRegistry};
//! use serde_json::json;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = SchemaRegistry::new()?;
//!     let engine = PatchEngine::new(&registry);
//!
//!     let user = Resource::new(
//!         "User",
//!         json!({
//!             "userName": "jdoe",
//!             "emails": [
//!                 {"type": "work", "value": "jdoe@old.example.com"},
//!                 {"type": "home", "value": "jdoe@home.example.com"}
//!             ]
//!         }),
//!     );
//!
//!     let request = PatchRequestBuilder::new()
//!         .replace(r#"emails[type eq "work"].value"#, json!("jdoe@new.example.com"))
//!         .add("active", json!(true))
//!         .build();
//!
//!     let outcome = engine.apply_patch(&user, &request)?;
//!     assert!(outcome.changed);
//!     assert_eq!(
//!         outcome.resource.data["emails"][0]["value"],
//!         json!("jdoe@new.example.com")
//!     );
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod filter;
pub mod patch;
pub mod provider;
pub mod resource;
pub mod schema;

// Core re-exports for library users
pub use codec::{JsonCodec, SerdeJsonCodec};
pub use error::{PatchError, PatchResult, ScimErrorResponse};
pub use filter::{AttrPath, CompareOp, FilterExpr, Literal, LogicalOp, evaluate_filter, parse_filter};
pub use patch::{
    PATCH_OP_SCHEMA, PatchEngine, PatchOpKind, PatchOperation, PatchOutcome, PatchRequest,
    PatchRequestBuilder, PathExpr, parse_path,
};
pub use provider::{
    InMemoryPatchProvider, PatchSupport, ProviderError, ProviderResult, RequestContext,
    ResourceStore,
};
pub use resource::Resource;
pub use schema::{
    AttributeDefinition, AttributeType, Mutability, Schema, SchemaRegistry, Uniqueness,
};
