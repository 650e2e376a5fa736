//! The RFC 7644 Section 3.5.2 patch engine.
//!
//! Operations are applied sequentially in list order against a defensive
//! deep copy of the caller's document; a later operation observes all prior
//! operations' effects, and any failure discards the copy so the caller's
//! resource is never partially mutated. The engine reports `changed=false`
//! when the final document deep-equals the input, so callers can leave
//! `meta.lastModified` untouched on no-ops.

use crate::error::{PatchError, PatchResult};
use crate::patch::path::{Cursor, PathExpr, Step, existing_key, parse_path, resolve_cursors};
use crate::patch::request::{PatchOpKind, PatchOperation, PatchRequest};
use crate::resource::Resource;
use crate::schema::coerce::{coerce, json_type_name};
use crate::schema::registry::SchemaRegistry;
use crate::schema::types::{AttributeDefinition, Mutability};
use serde_json::{Map, Value};

/// Result of a successful patch application.
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    /// The patched resource
    pub resource: Resource,
    /// Whether the document differs from the input by deep equality
    pub changed: bool,
}

/// Applies PatchOp requests to resources using a shared schema registry.
///
/// The engine is synchronous and keeps no state of its own; it can be
/// shared freely across worker threads.
#[derive(Debug, Clone, Copy)]
pub struct PatchEngine<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> PatchEngine<'a> {
    /// Create an engine over a registry.
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Apply a patch request to a resource.
    ///
    /// The input resource is never mutated. On success the returned outcome
    /// carries the new resource and whether anything actually changed; on
    /// failure the caller's resource is untouched and no partial
    /// application has happened.
    pub fn apply_patch(
        &self,
        resource: &Resource,
        request: &PatchRequest,
    ) -> PatchResult<PatchOutcome> {
        request.validate()?;
        let mut working = resource.data.clone();
        for operation in &request.operations {
            self.apply_operation(&resource.resource_type, &mut working, operation)?;
        }
        let changed = working != resource.data;
        Ok(PatchOutcome {
            resource: Resource::new(resource.resource_type.clone(), working),
            changed,
        })
    }

    fn apply_operation(
        &self,
        resource_type: &str,
        doc: &mut Value,
        operation: &PatchOperation,
    ) -> PatchResult<()> {
        let path = operation
            .path
            .as_deref()
            .map(|text| parse_path(self.registry, resource_type, text))
            .transpose()?;
        if let Some(path) = &path {
            check_mutability(path, operation.op)?;
        }
        // null values are treated as absent; some clients send an explicit null
        let value = operation.value.as_ref().filter(|v| !v.is_null());
        match operation.op {
            PatchOpKind::Add => self.apply_add(resource_type, doc, path, value),
            PatchOpKind::Replace => self.apply_replace(resource_type, doc, path, value),
            PatchOpKind::Remove => self.apply_remove(doc, path, value),
        }
    }

    // ===== add ==========================================================

    fn apply_add(
        &self,
        resource_type: &str,
        doc: &mut Value,
        path: Option<PathExpr<'_>>,
        value: Option<&Value>,
    ) -> PatchResult<()> {
        let Some(path) = path else {
            let value = require_value(value)?;
            return self.merge_root(resource_type, doc, value, false);
        };
        if path.filter.is_some() && path.sub_attribute.is_none() {
            return Err(PatchError::invalid_path(
                path.text(),
                "add on a filtered segment requires a trailing sub-attribute",
            ));
        }
        let values = values_list(value)?;
        if let (Some(uri), true) = (path.extension, path.is_bare_extension()) {
            let validated = self.validated_extension(uri, exactly_one_unnamed(&values)?)?;
            let root = root_object(doc)?;
            match root.get_mut(uri) {
                Some(existing @ Value::Object(_)) => merge_value(existing, validated),
                _ => {
                    root.insert(uri.to_string(), validated);
                }
            }
            return Ok(());
        }

        let def = path.target_def().expect("bound path has a target");
        let cursors = resolve_cursors(&path, doc)?;
        for cursor in cursors {
            let Some(parent) = navigate_mut(doc, &cursor.parent, true) else {
                continue;
            };
            let Some(parent_object) = parent.as_object_mut() else {
                continue;
            };
            let Step::Key(key) = &cursor.target else {
                unreachable!("add cursors always target object keys");
            };
            self.add_into_slot(def, parent_object, key, &values)?;
        }
        Ok(())
    }

    /// Add `values` at one slot according to the target definition.
    ///
    /// Multi-valued targets append (simple values idempotently, complex
    /// values without deduplication); a single-valued complex target merges
    /// the provided object into the existing one; a simple target is set.
    fn add_into_slot(
        &self,
        def: &AttributeDefinition,
        parent: &mut Map<String, Value>,
        key: &str,
        values: &[Value],
    ) -> PatchResult<()> {
        if def.multi_valued {
            let mut items = Vec::with_capacity(values.len());
            for value in values {
                items.push(self.validated_single(def, value)?);
            }
            match parent.get_mut(key) {
                Some(Value::Array(existing)) => {
                    for item in items {
                        if def.is_complex() || !existing.contains(&item) {
                            existing.push(item);
                        }
                    }
                }
                Some(other) => {
                    return Err(PatchError::invalid_value(
                        &def.name,
                        format!("existing value is {}, not an array", json_type_name(other)),
                    ));
                }
                None => {
                    let mut array: Vec<Value> = Vec::with_capacity(items.len());
                    for item in items {
                        if def.is_complex() || !array.contains(&item) {
                            array.push(item);
                        }
                    }
                    parent.insert(key.to_string(), Value::Array(array));
                }
            }
        } else if def.is_complex() {
            let validated = self.validated_single(def, exactly_one(values, def)?)?;
            match parent.get_mut(key) {
                Some(existing @ Value::Object(_)) => merge_value(existing, validated),
                _ => {
                    parent.insert(key.to_string(), validated);
                }
            }
        } else {
            let coerced = coerce(def, exactly_one(values, def)?)?;
            parent.insert(key.to_string(), coerced);
        }
        Ok(())
    }

    // ===== replace ======================================================

    fn apply_replace(
        &self,
        resource_type: &str,
        doc: &mut Value,
        path: Option<PathExpr<'_>>,
        value: Option<&Value>,
    ) -> PatchResult<()> {
        let Some(path) = path else {
            let value = require_value(value)?;
            return self.merge_root(resource_type, doc, value, true);
        };
        let values = values_list(value)?;
        if let (Some(uri), true) = (path.extension, path.is_bare_extension()) {
            let validated = self.validated_extension(uri, exactly_one_unnamed(&values)?)?;
            root_object(doc)?.insert(uri.to_string(), validated);
            return Ok(());
        }

        let def = path.target_def().expect("bound path has a target");
        let cursors = resolve_cursors(&path, doc)?;
        for cursor in cursors {
            let Some(parent) = navigate_mut(doc, &cursor.parent, true) else {
                continue;
            };
            match &cursor.target {
                Step::Key(key) => {
                    let Some(parent_object) = parent.as_object_mut() else {
                        continue;
                    };
                    let new_value = if def.multi_valued {
                        let mut items = Vec::with_capacity(values.len());
                        for value in &values {
                            items.push(self.validated_single(def, value)?);
                        }
                        Value::Array(items)
                    } else {
                        self.validated_single(def, exactly_one(&values, def)?)?
                    };
                    parent_object.insert(key.clone(), new_value);
                }
                Step::Index(index) => {
                    // replace a whole matched element of a multi-valued array
                    let validated = self.validated_single(def, exactly_one(&values, def)?)?;
                    let Some(array) = parent.as_array_mut() else {
                        continue;
                    };
                    array[*index] = validated;
                }
            }
        }
        Ok(())
    }

    // ===== remove =======================================================

    fn apply_remove(
        &self,
        doc: &mut Value,
        path: Option<PathExpr<'_>>,
        value: Option<&Value>,
    ) -> PatchResult<()> {
        let Some(path) = path else {
            return Err(PatchError::invalid_path("", "remove requires a path"));
        };
        if value.is_some() {
            return Err(PatchError::invalid_path(path.text(), "remove takes no value"));
        }
        if let Some(target) = path.target_def() {
            if target.required && (path.sub_attribute.is_some() || path.filter.is_none()) {
                return Err(PatchError::mutability(&target.name, "attribute is required"));
            }
        }

        let cursors = resolve_cursors(&path, doc)?;
        if path.filter.is_some() && path.sub_attribute.is_none() {
            self.remove_matched_elements(doc, &cursors);
        } else {
            for cursor in &cursors {
                let Some(parent) = navigate_mut(doc, &cursor.parent, false) else {
                    continue;
                };
                if let (Step::Key(key), Some(object)) = (&cursor.target, parent.as_object_mut()) {
                    object.remove(key);
                }
            }
        }

        // drop an extension container emptied by the removal
        if let (Some(uri), false) = (path.extension, path.is_bare_extension()) {
            if let Some(root) = doc.as_object_mut() {
                let emptied = root
                    .get(uri)
                    .and_then(Value::as_object)
                    .map(|o| o.is_empty())
                    .unwrap_or(false);
                if emptied {
                    root.remove(uri);
                }
            }
        }
        Ok(())
    }

    /// Delete matched array elements (descending index order), dropping the
    /// attribute key entirely when the array becomes empty.
    fn remove_matched_elements(&self, doc: &mut Value, cursors: &[Cursor]) {
        let Some(first) = cursors.first() else {
            return;
        };
        let array_steps = first.parent.clone();
        let mut indices: Vec<usize> = cursors
            .iter()
            .filter_map(|c| match c.target {
                Step::Index(index) => Some(index),
                _ => None,
            })
            .collect();
        indices.sort_unstable_by(|a, b| b.cmp(a));

        let mut emptied = false;
        if let Some(array) = navigate_mut(doc, &array_steps, false).and_then(|v| v.as_array_mut()) {
            for index in indices {
                if index < array.len() {
                    array.remove(index);
                }
            }
            emptied = array.is_empty();
        }
        if emptied {
            if let Some(Step::Key(attr_key)) = array_steps.last() {
                let attr_key = attr_key.clone();
                let container_steps = &array_steps[..array_steps.len() - 1];
                if let Some(container) =
                    navigate_mut(doc, container_steps, false).and_then(|v| v.as_object_mut())
                {
                    container.remove(&attr_key);
                }
            }
        }
    }

    // ===== shared helpers ===============================================

    /// Merge a value object into the resource root (no-path add/replace).
    ///
    /// Keys resolve against the registry; read-only attributes are ignored
    /// rather than rejected, matching how providers treat server-managed
    /// attributes in request bodies. Extension attributes route into their
    /// URI container at the root. `replace` overwrites per attribute where
    /// `add` merges objects and concatenates arrays.
    fn merge_root(
        &self,
        resource_type: &str,
        doc: &mut Value,
        value: &Value,
        replace: bool,
    ) -> PatchResult<()> {
        let incoming = value.as_object().ok_or_else(|| {
            PatchError::invalid_value("value", "a path-less operation requires a JSON object value")
        })?;
        for (key, val) in incoming {
            if self.registry.is_extension(key) {
                let validated = self.validated_extension(key, val)?;
                let root = root_object(doc)?;
                match root.get_mut(key) {
                    Some(existing @ Value::Object(_)) => {
                        if replace {
                            let Value::Object(validated) = validated else {
                                unreachable!("validated extension is an object");
                            };
                            let Value::Object(existing) = existing else {
                                unreachable!("matched object above");
                            };
                            for (sub_key, sub_val) in validated {
                                existing.insert(sub_key, sub_val);
                            }
                        } else {
                            merge_value(existing, validated);
                        }
                    }
                    _ => {
                        root.insert(key.clone(), validated);
                    }
                }
                continue;
            }

            let resolved = self.registry.resolve(resource_type, key)?;
            let attribute = resolved.attribute;
            if !attribute.is_writable() {
                continue;
            }
            let validated = self.validated(attribute, val)?;
            let root = root_object(doc)?;
            let container = if resolved.is_extension {
                let uri_key = resolved.schema_uri.to_string();
                root.entry(uri_key)
                    .or_insert_with(|| Value::Object(Map::new()))
                    .as_object_mut()
                    .ok_or_else(|| {
                        PatchError::invalid_value(key, "extension container is not an object")
                    })?
            } else {
                root
            };
            let slot_key = existing_key(container, key).unwrap_or_else(|| key.clone());
            if replace {
                container.insert(slot_key, validated);
            } else {
                match container.get_mut(&slot_key) {
                    Some(existing) => merge_value(existing, validated),
                    None => {
                        container.insert(slot_key, validated);
                    }
                }
            }
        }
        Ok(())
    }

    /// Validate a raw value against an attribute definition, arrays
    /// included.
    fn validated(&self, def: &AttributeDefinition, raw: &Value) -> PatchResult<Value> {
        if def.multi_valued {
            let Value::Array(items) = raw else {
                return Err(PatchError::invalid_value(
                    &def.name,
                    format!("expected an array, got {}", json_type_name(raw)),
                ));
            };
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(self.validated_single(def, item)?);
            }
            Ok(Value::Array(out))
        } else {
            self.validated_single(def, raw)
        }
    }

    /// Validate one element: complex values check every key against the
    /// sub-attribute definitions and coerce their leaves; simple values
    /// coerce directly.
    fn validated_single(&self, def: &AttributeDefinition, raw: &Value) -> PatchResult<Value> {
        if !def.is_complex() {
            return coerce(def, raw);
        }
        let object = raw.as_object().ok_or_else(|| {
            PatchError::invalid_value(
                &def.name,
                format!("expected an object, got {}", json_type_name(raw)),
            )
        })?;
        let mut out = Map::new();
        for (key, val) in object {
            let sub = def.find_sub_attribute(key).ok_or_else(|| {
                PatchError::unknown_attribute(format!("{}.{}", def.name, key))
            })?;
            out.insert(key.clone(), self.validated(sub, val)?);
        }
        Ok(Value::Object(out))
    }

    /// Validate an extension object against the extension schema.
    fn validated_extension(&self, uri: &str, raw: &Value) -> PatchResult<Value> {
        let schema = self
            .registry
            .schema_by_uri(uri)
            .ok_or_else(|| PatchError::unknown_attribute(uri))?;
        let object = raw.as_object().ok_or_else(|| {
            PatchError::invalid_value(uri, format!("expected an object, got {}", json_type_name(raw)))
        })?;
        let mut out = Map::new();
        for (key, val) in object {
            let attribute = schema
                .find_attribute(key)
                .ok_or_else(|| PatchError::unknown_attribute(format!("{uri}:{key}")))?;
            out.insert(key.clone(), self.validated(attribute, val)?);
        }
        Ok(Value::Object(out))
    }
}

fn check_mutability(path: &PathExpr<'_>, op: PatchOpKind) -> PatchResult<()> {
    let defs = path.attribute.into_iter().chain(path.sub_attribute);
    for def in defs {
        match def.mutability {
            Mutability::ReadOnly => {
                return Err(PatchError::mutability(&def.name, "attribute is read-only"));
            }
            Mutability::Immutable if op != PatchOpKind::Add => {
                return Err(PatchError::mutability(&def.name, "attribute is immutable"));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Structural merge: objects merge key-wise (case-insensitively), arrays
/// concatenate preserving original order then new entries, scalars
/// overwrite. Concatenation does not deduplicate.
fn merge_value(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(a), Value::Object(b)) => {
            for (key, val) in b {
                match existing_key(a, &key) {
                    Some(slot) => merge_value(a.get_mut(&slot).expect("key exists"), val),
                    None => {
                        a.insert(key, val);
                    }
                }
            }
        }
        (Value::Array(a), Value::Array(b)) => a.extend(b),
        (slot, incoming) => *slot = incoming,
    }
}

/// Walk mutably along cursor steps, optionally creating missing objects.
fn navigate_mut<'v>(doc: &'v mut Value, steps: &[Step], create: bool) -> Option<&'v mut Value> {
    let mut current = doc;
    for step in steps {
        match step {
            Step::Key(key) => {
                let object = current.as_object_mut()?;
                current = if create {
                    object
                        .entry(key.clone())
                        .or_insert_with(|| Value::Object(Map::new()))
                } else {
                    object.get_mut(key)?
                };
            }
            Step::Index(index) => {
                current = current.as_array_mut()?.get_mut(*index)?;
            }
        }
    }
    Some(current)
}

fn root_object(doc: &mut Value) -> PatchResult<&mut Map<String, Value>> {
    doc.as_object_mut()
        .ok_or_else(|| PatchError::json_syntax("resource document is not a JSON object"))
}

fn require_value(value: Option<&Value>) -> PatchResult<&Value> {
    value.ok_or_else(|| PatchError::invalid_value("value", "operation requires a value"))
}

/// Normalize the wire `value` into a non-empty value list.
fn values_list(value: Option<&Value>) -> PatchResult<Vec<Value>> {
    let value = require_value(value)?;
    match value {
        Value::Array(items) if items.is_empty() => Err(PatchError::invalid_value(
            "value",
            "operation requires at least one value",
        )),
        Value::Array(items) => Ok(items.clone()),
        other => Ok(vec![other.clone()]),
    }
}

fn exactly_one<'v>(values: &'v [Value], def: &AttributeDefinition) -> PatchResult<&'v Value> {
    match values {
        [single] => Ok(single),
        _ => Err(PatchError::invalid_value(
            &def.name,
            "expected exactly one value",
        )),
    }
}

fn exactly_one_unnamed(values: &[Value]) -> PatchResult<&Value> {
    match values {
        [single] => Ok(single),
        _ => Err(PatchError::invalid_value(
            "value",
            "expected exactly one value",
        )),
    }
}
