//! Filter evaluation against candidate values.
//!
//! A filter is evaluated against one member of a multi-valued complex
//! attribute. Comparisons are typed by the target attribute definition when
//! one is available (case sensitivity, chronological dateTime ordering);
//! without a definition the stored JSON type decides. Missing attributes
//! yield `false` for every operator except `ne`.

use super::ast::{AttrPath, CompareOp, FilterExpr, Literal, LogicalOp};
use crate::error::{PatchError, PatchResult};
use crate::schema::types::{AttributeDefinition, AttributeType};
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::cmp::Ordering;

/// Evaluate a filter against the elements of an array, returning the
/// indices of matching elements in ascending order.
pub fn evaluate_filter(
    expr: &FilterExpr,
    elements: &[Value],
    def: Option<&AttributeDefinition>,
) -> PatchResult<Vec<usize>> {
    let mut matched = Vec::new();
    for (index, element) in elements.iter().enumerate() {
        if matches(expr, element, def)? {
            matched.push(index);
        }
    }
    Ok(matched)
}

/// Evaluate a filter against a single candidate value.
///
/// `def` is the definition of the multi-valued complex attribute whose
/// element the candidate is; it types the comparisons where present.
pub fn matches(
    expr: &FilterExpr,
    candidate: &Value,
    def: Option<&AttributeDefinition>,
) -> PatchResult<bool> {
    match expr {
        FilterExpr::Compare { path, op, literal } => {
            compare(path, *op, literal.as_ref(), candidate, def)
        }
        FilterExpr::Logical { op, left, right } => match op {
            LogicalOp::And => {
                if !matches(left, candidate, def)? {
                    return Ok(false);
                }
                matches(right, candidate, def)
            }
            LogicalOp::Or => {
                if matches(left, candidate, def)? {
                    return Ok(true);
                }
                matches(right, candidate, def)
            }
        },
        FilterExpr::Not(inner) => Ok(!matches(inner, candidate, def)?),
        FilterExpr::Group(inner) => matches(inner, candidate, def),
    }
}

fn compare(
    path: &AttrPath,
    op: CompareOp,
    literal: Option<&Literal>,
    candidate: &Value,
    def: Option<&AttributeDefinition>,
) -> PatchResult<bool> {
    let value = resolve_attr(path, candidate);
    let attr_def = resolve_def(path, def);

    if op == CompareOp::Pr {
        return Ok(is_present(value));
    }

    let value = match value {
        None | Some(Value::Null) => {
            // a missing attribute satisfies ne against any literal
            return Ok(op == CompareOp::Ne);
        }
        Some(v) => v,
    };
    let literal = literal.ok_or_else(|| {
        PatchError::invalid_filter(0, format!("operator '{op}' requires a literal"))
    })?;

    // a multi-valued attribute matches when any element does
    if let Value::Array(elements) = value {
        if op == CompareOp::Ne {
            for element in elements {
                if compare_scalar(element, CompareOp::Eq, literal, attr_def)? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }
        for element in elements {
            if compare_scalar(element, op, literal, attr_def)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }

    compare_scalar(value, op, literal, attr_def)
}

/// Walk `path` within the candidate object, case-insensitively.
fn resolve_attr<'v>(path: &AttrPath, candidate: &'v Value) -> Option<&'v Value> {
    let object = candidate.as_object()?;
    let value = get_ci(object, &path.name)?;
    match &path.sub {
        Some(sub) => get_ci(value.as_object()?, sub),
        None => Some(value),
    }
}

/// The definition typing the compared attribute, when known.
fn resolve_def<'a>(
    path: &AttrPath,
    def: Option<&'a AttributeDefinition>,
) -> Option<&'a AttributeDefinition> {
    let attr = def?.find_sub_attribute(&path.name)?;
    match &path.sub {
        Some(sub) => attr.find_sub_attribute(sub),
        None => Some(attr),
    }
}

/// Case-insensitive object lookup.
pub(crate) fn get_ci<'v>(
    object: &'v serde_json::Map<String, Value>,
    name: &str,
) -> Option<&'v Value> {
    object
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

/// `pr`: present, not null, and non-empty for strings, arrays and objects.
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}

fn compare_scalar(
    value: &Value,
    op: CompareOp,
    literal: &Literal,
    def: Option<&AttributeDefinition>,
) -> PatchResult<bool> {
    match (value, literal) {
        (Value::String(s), Literal::String(l)) => compare_strings(s, l, op, def),
        (Value::Number(a), Literal::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            match op {
                CompareOp::Eq => Ok(a == b),
                CompareOp::Ne => Ok(a != b),
                CompareOp::Gt => Ok(a > b),
                CompareOp::Ge => Ok(a >= b),
                CompareOp::Lt => Ok(a < b),
                CompareOp::Le => Ok(a <= b),
                _ => Err(type_mismatch(op, "number")),
            }
        }
        (Value::Bool(a), Literal::Boolean(b)) => match op {
            CompareOp::Eq => Ok(a == b),
            CompareOp::Ne => Ok(a != b),
            _ => Err(type_mismatch(op, "boolean")),
        },
        (_, Literal::Null) => match op {
            // the missing/null case was handled by the caller
            CompareOp::Eq => Ok(false),
            CompareOp::Ne => Ok(true),
            _ => Err(type_mismatch(op, "null")),
        },
        (value, literal) => Err(PatchError::invalid_filter(
            0,
            format!(
                "cannot compare {} value with {} literal",
                crate::schema::coerce::json_type_name(value),
                literal_type_name(literal)
            ),
        )),
    }
}

fn compare_strings(
    s: &str,
    l: &str,
    op: CompareOp,
    def: Option<&AttributeDefinition>,
) -> PatchResult<bool> {
    let case_exact = def.map(|d| d.case_exact).unwrap_or(false);
    let is_datetime = def
        .map(|d| d.data_type == AttributeType::DateTime)
        .unwrap_or(false);

    match op {
        CompareOp::Eq => Ok(fold_eq(s, l, case_exact)),
        CompareOp::Ne => Ok(!fold_eq(s, l, case_exact)),
        CompareOp::Co => Ok(folded(s, case_exact).contains(&folded(l, case_exact))),
        CompareOp::Sw => Ok(folded(s, case_exact).starts_with(&folded(l, case_exact))),
        CompareOp::Ew => Ok(folded(s, case_exact).ends_with(&folded(l, case_exact))),
        CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le => {
            let ordering = if is_datetime {
                chronological(s, l)
            } else {
                s.cmp(l)
            };
            Ok(match op {
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Ge => ordering != Ordering::Less,
                CompareOp::Lt => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            })
        }
        CompareOp::Pr => unreachable!("pr handled before scalar comparison"),
    }
}

fn fold_eq(a: &str, b: &str, case_exact: bool) -> bool {
    if case_exact {
        a == b
    } else {
        a.to_lowercase() == b.to_lowercase()
    }
}

fn folded(s: &str, case_exact: bool) -> String {
    if case_exact {
        s.to_string()
    } else {
        s.to_lowercase()
    }
}

/// Chronological ordering of two RFC 3339 timestamps, falling back to
/// code-point order when either side does not parse.
fn chronological(a: &str, b: &str) -> Ordering {
    match (
        DateTime::<FixedOffset>::parse_from_rfc3339(a),
        DateTime::<FixedOffset>::parse_from_rfc3339(b),
    ) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

fn type_mismatch(op: CompareOp, kind: &str) -> PatchError {
    PatchError::invalid_filter(0, format!("operator '{op}' does not apply to {kind} values"))
}

fn literal_type_name(literal: &Literal) -> &'static str {
    match literal {
        Literal::String(_) => "string",
        Literal::Number(_) => "number",
        Literal::Boolean(_) => "boolean",
        Literal::Null => "null",
    }
}
