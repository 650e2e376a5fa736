//! Patch path binding and cursor resolution.
//!
//! A raw parsed path is bound against the schema registry to disambiguate
//! URI prefixes from dotted short forms and to attach attribute
//! definitions. Resolution then walks a resource document and yields
//! cursors: `(parent container steps, key or index)` pairs identifying each
//! mutation site. The indirection lets the engine distinguish "absent" from
//! "present with null" and create missing intermediate containers.

use crate::error::{PatchError, PatchResult};
use crate::filter::ast::FilterExpr;
use crate::filter::eval::evaluate_filter;
use crate::filter::parser::{RawPath, parse_path_raw};
use crate::schema::registry::SchemaRegistry;
use crate::schema::types::AttributeDefinition;
use serde_json::{Map, Value};

/// A patch path bound against the registry.
///
/// `attribute` is `None` only for a bare extension path (the path text is
/// exactly an extension URI), which targets the whole extension object.
#[derive(Debug, Clone)]
pub struct PathExpr<'a> {
    text: String,
    /// URI of the schema the target attribute belongs to
    pub schema_uri: &'a str,
    /// Set when the attribute lives in an extension container at the root
    pub extension: Option<&'a str>,
    /// The top-level attribute definition
    pub attribute: Option<&'a AttributeDefinition>,
    /// Filter attached to the (multi-valued) attribute
    pub filter: Option<FilterExpr>,
    /// Trailing sub-attribute definition
    pub sub_attribute: Option<&'a AttributeDefinition>,
}

impl<'a> PathExpr<'a> {
    /// The original path text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The definition of the node the operation ultimately touches.
    pub fn target_def(&self) -> Option<&'a AttributeDefinition> {
        self.sub_attribute.or(self.attribute)
    }

    /// Whether the path is exactly an extension URI.
    pub fn is_bare_extension(&self) -> bool {
        self.attribute.is_none()
    }
}

/// Parse and bind a patch path for a resource type.
///
/// Accepts simple names (`userName`), dotted forms (`name.givenName`),
/// filtered segments (`emails[type eq "work"].value`), URI-qualified names
/// and bare extension URIs. Structural errors map to `invalidPath`,
/// unresolvable names to `invalidPath` via unknown-attribute.
pub fn parse_path<'a>(
    registry: &'a SchemaRegistry,
    resource_type: &str,
    text: &str,
) -> PatchResult<PathExpr<'a>> {
    let raw = parse_path_raw(text)?;
    bind(registry, resource_type, text, raw)
}

fn bind<'a>(
    registry: &'a SchemaRegistry,
    resource_type: &str,
    text: &str,
    raw: RawPath,
) -> PatchResult<PathExpr<'a>> {
    // a path that is exactly an extension URI targets the whole extension
    if raw.head_filter.is_none() && raw.tail.is_empty() && registry.is_extension(&raw.head) {
        if !registry
            .extensions_of(resource_type)
            .iter()
            .any(|uri| uri == &raw.head)
        {
            return Err(PatchError::unknown_attribute(&raw.head));
        }
        let schema = registry.schema_by_uri(&raw.head).expect("registered extension");
        return Ok(PathExpr {
            text: text.to_string(),
            schema_uri: &schema.id,
            extension: Some(&schema.id),
            attribute: None,
            filter: None,
            sub_attribute: None,
        });
    }

    let resolved = registry.resolve(resource_type, &raw.head)?;
    if resolved.schema_uri != registry.base_schema_uri(resource_type).unwrap_or_default()
        && !registry
            .extensions_of(resource_type)
            .iter()
            .any(|uri| uri == resolved.schema_uri)
    {
        return Err(PatchError::unknown_attribute(&raw.head));
    }

    let mut sub_attribute = resolved.sub_attribute;
    if raw.head_filter.is_some() && sub_attribute.is_some() {
        return Err(PatchError::invalid_path(
            text,
            "a filter may only follow a multi-valued attribute",
        ));
    }

    match raw.tail.len() {
        0 => {}
        1 => {
            if sub_attribute.is_some() {
                return Err(PatchError::invalid_path(text, "attribute nesting too deep"));
            }
            let segment = &raw.tail[0];
            if segment.filter.is_some() {
                return Err(PatchError::invalid_path(
                    text,
                    "a sub-attribute cannot carry a filter",
                ));
            }
            sub_attribute = Some(
                resolved
                    .attribute
                    .find_sub_attribute(&segment.name)
                    .ok_or_else(|| PatchError::unknown_attribute(&segment.name))?,
            );
        }
        _ => return Err(PatchError::invalid_path(text, "attribute nesting too deep")),
    }

    if raw.head_filter.is_some() && !resolved.attribute.multi_valued {
        return Err(PatchError::invalid_path(
            text,
            "a filter may only follow a multi-valued attribute",
        ));
    }

    Ok(PathExpr {
        text: text.to_string(),
        schema_uri: resolved.schema_uri,
        extension: resolved.is_extension.then_some(resolved.schema_uri),
        attribute: Some(resolved.attribute),
        filter: raw.head_filter,
        sub_attribute,
    })
}

/// One navigation step from the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Object key (verbatim spelling)
    Key(String),
    /// Array index
    Index(usize),
}

/// A mutation site: the steps to the parent container plus the key or
/// index the operation applies at.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    /// Steps from the root to the parent container
    pub parent: Vec<Step>,
    /// Where in the parent the mutation occurs
    pub target: Step,
}

/// The verbatim spelling of an existing object key matching `name`
/// case-insensitively.
pub(crate) fn existing_key(object: &Map<String, Value>, name: &str) -> Option<String> {
    object
        .keys()
        .find(|key| key.eq_ignore_ascii_case(name))
        .cloned()
}

/// Resolve the cursors a bound path selects within a document.
///
/// Cursors reference the document state at call time; an empty result on a
/// filtered segment is a `noTarget` failure, while an unfiltered walk over
/// a missing container yields an empty cursor set for the engine to treat
/// as a no-op.
pub fn resolve_cursors(path: &PathExpr<'_>, doc: &Value) -> PatchResult<Vec<Cursor>> {
    let mut base: Vec<Step> = Vec::new();
    let mut container: Option<&Value> = Some(doc);

    if let Some(uri) = path.extension {
        if path.is_bare_extension() {
            return Ok(vec![Cursor {
                parent: Vec::new(),
                target: Step::Key(uri.to_string()),
            }]);
        }
        base.push(Step::Key(uri.to_string()));
        container = doc.as_object().and_then(|o| o.get(uri));
    }

    let attribute = path.attribute.expect("non-extension path has an attribute");
    let parent_object = container.and_then(Value::as_object);
    let attr_key = parent_object
        .and_then(|o| existing_key(o, &attribute.name))
        .unwrap_or_else(|| attribute.name.clone());
    let attr_value = parent_object.and_then(|o| o.get(&attr_key));

    match (&path.filter, path.sub_attribute) {
        (None, None) => Ok(vec![Cursor {
            parent: base,
            target: Step::Key(attr_key),
        }]),
        (None, Some(sub)) => {
            if attribute.multi_valued {
                // unfiltered fan-out over every existing element
                let Some(elements) = attr_value.and_then(Value::as_array) else {
                    return Ok(Vec::new());
                };
                Ok(elements
                    .iter()
                    .enumerate()
                    .map(|(index, element)| Cursor {
                        parent: with_steps(&base, [Step::Key(attr_key.clone()), Step::Index(index)]),
                        target: Step::Key(sub_key(element, sub)),
                    })
                    .collect())
            } else {
                let sub_key = attr_value
                    .and_then(Value::as_object)
                    .and_then(|o| existing_key(o, &sub.name))
                    .unwrap_or_else(|| sub.name.clone());
                Ok(vec![Cursor {
                    parent: with_steps(&base, [Step::Key(attr_key)]),
                    target: Step::Key(sub_key),
                }])
            }
        }
        (Some(filter), sub) => {
            let elements = attr_value.and_then(Value::as_array).unwrap_or(&EMPTY);
            let indices = evaluate_filter(filter, elements, Some(attribute))?;
            if indices.is_empty() {
                return Err(PatchError::no_target(&path.text));
            }
            Ok(indices
                .into_iter()
                .map(|index| match sub {
                    Some(sub) => Cursor {
                        parent: with_steps(&base, [Step::Key(attr_key.clone()), Step::Index(index)]),
                        target: Step::Key(sub_key(&elements[index], sub)),
                    },
                    None => Cursor {
                        parent: with_steps(&base, [Step::Key(attr_key.clone())]),
                        target: Step::Index(index),
                    },
                })
                .collect())
        }
    }
}

static EMPTY: Vec<Value> = Vec::new();

fn sub_key(element: &Value, sub: &AttributeDefinition) -> String {
    element
        .as_object()
        .and_then(|o| existing_key(o, &sub.name))
        .unwrap_or_else(|| sub.name.clone())
}

fn with_steps<const N: usize>(base: &[Step], extra: [Step; N]) -> Vec<Step> {
    let mut steps = base.to_vec();
    steps.extend(extra);
    steps
}
