//! SCIM schema definitions, registry and value coercion.
//!
//! The registry resolves attribute names (including extension URIs) to
//! RFC 7643 attribute definitions; the coercer turns raw patch values into
//! typed leaves according to those definitions.

pub mod coerce;
pub mod embedded;
pub mod registry;
pub mod types;

pub use coerce::coerce;
pub use registry::{ResolvedAttribute, SchemaRegistry};
pub use types::{AttributeDefinition, AttributeType, Mutability, Schema, Uniqueness};
