//! RFC 7644 PATCH: wire model, path binding and the engine.

pub mod engine;
pub mod path;
pub mod request;

pub use engine::{PatchEngine, PatchOutcome};
pub use path::{Cursor, PathExpr, Step, parse_path, resolve_cursors};
pub use request::{
    PATCH_OP_SCHEMA, PatchOpKind, PatchOperation, PatchRequest, PatchRequestBuilder,
};
