//! Schema-driven value coercion.
//!
//! Patch values arrive as untyped JSON fragments; their expected type is only
//! known once the target attribute is resolved. This module turns a raw
//! value into a typed leaf per the attribute definition, accepting both the
//! native JSON representation and the textual form (e.g. `"true"` for a
//! boolean) since patch bodies in the wild carry either.

use super::types::{AttributeDefinition, AttributeType};
use crate::error::{PatchError, PatchResult};
use serde_json::{Number, Value};

/// Coerce a raw JSON value into a typed leaf for `def`.
///
/// String-family types (string, dateTime, reference, binary) pass through as
/// text; date syntax is not validated here. Booleans parse `true`/`false`
/// case-insensitively. Integers parse as signed 64-bit. Decimals parse as
/// IEEE-754 doubles. Unparsable or out-of-range values fail with an
/// invalid-value error.
pub fn coerce(def: &AttributeDefinition, value: &Value) -> PatchResult<Value> {
    match def.data_type {
        AttributeType::String
        | AttributeType::DateTime
        | AttributeType::Reference
        | AttributeType::Binary => match value {
            Value::String(s) => Ok(Value::String(s.clone())),
            other => Err(type_error(def, "string", other)),
        },
        AttributeType::Boolean => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(PatchError::invalid_value(
                    &def.name,
                    format!("'{s}' is not a boolean"),
                )),
            },
            other => Err(type_error(def, "boolean", other)),
        },
        AttributeType::Integer => coerce_integer(def, value),
        AttributeType::Decimal => coerce_decimal(def, value),
        AttributeType::Complex => match value {
            Value::Object(_) => Ok(value.clone()),
            other => Err(type_error(def, "object", other)),
        },
    }
}

fn coerce_integer(def: &AttributeDefinition, value: &Value) -> PatchResult<Value> {
    match value {
        Value::Number(n) => {
            let parsed = n.as_i64().ok_or_else(|| {
                PatchError::invalid_value(
                    &def.name,
                    format!("'{n}' is not a signed 64-bit integer"),
                )
            })?;
            Ok(Value::Number(Number::from(parsed)))
        }
        Value::String(s) => {
            let parsed: i64 = s.parse().map_err(|_| {
                PatchError::invalid_value(
                    &def.name,
                    format!("'{s}' is not a signed 64-bit integer"),
                )
            })?;
            Ok(Value::Number(Number::from(parsed)))
        }
        other => Err(type_error(def, "integer", other)),
    }
}

fn coerce_decimal(def: &AttributeDefinition, value: &Value) -> PatchResult<Value> {
    match value {
        Value::Number(n) => {
            let parsed = n
                .as_f64()
                .ok_or_else(|| PatchError::invalid_value(&def.name, format!("'{n}' is not a decimal")))?;
            Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| PatchError::invalid_value(&def.name, "decimal out of range"))
        }
        Value::String(s) => {
            let parsed: f64 = s
                .parse()
                .map_err(|_| PatchError::invalid_value(&def.name, format!("'{s}' is not a decimal")))?;
            Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| PatchError::invalid_value(&def.name, "decimal out of range"))
        }
        other => Err(type_error(def, "decimal", other)),
    }
}

fn type_error(def: &AttributeDefinition, expected: &str, actual: &Value) -> PatchError {
    PatchError::invalid_value(
        &def.name,
        format!("expected {expected}, got {}", json_type_name(actual)),
    )
}

/// The JSON type name of a value, for error messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "decimal",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attr(data_type: AttributeType) -> AttributeDefinition {
        AttributeDefinition {
            name: "test".to_string(),
            data_type,
            ..Default::default()
        }
    }

    #[test]
    fn string_passes_through() {
        let out = coerce(&attr(AttributeType::String), &json!("hello")).unwrap();
        assert_eq!(out, json!("hello"));
    }

    #[test]
    fn string_rejects_number() {
        let err = coerce(&attr(AttributeType::String), &json!(42)).unwrap_err();
        assert_eq!(err.scim_type(), "invalidValue");
    }

    #[test]
    fn boolean_parses_text_case_insensitively() {
        let def = attr(AttributeType::Boolean);
        assert_eq!(coerce(&def, &json!(true)).unwrap(), json!(true));
        assert_eq!(coerce(&def, &json!("True")).unwrap(), json!(true));
        assert_eq!(coerce(&def, &json!("FALSE")).unwrap(), json!(false));
        assert!(coerce(&def, &json!("yes")).is_err());
    }

    #[test]
    fn integer_parses_native_and_text() {
        let def = attr(AttributeType::Integer);
        assert_eq!(coerce(&def, &json!(7)).unwrap(), json!(7));
        assert_eq!(coerce(&def, &json!("-12")).unwrap(), json!(-12));
        assert_eq!(
            coerce(&def, &json!(i64::MAX)).unwrap(),
            json!(i64::MAX)
        );
    }

    #[test]
    fn integer_rejects_fraction_and_overflow() {
        let def = attr(AttributeType::Integer);
        assert!(coerce(&def, &json!(1.5)).is_err());
        // u64::MAX does not fit a signed 64-bit integer
        assert!(coerce(&def, &json!(u64::MAX)).is_err());
        assert!(coerce(&def, &json!("99999999999999999999")).is_err());
    }

    #[test]
    fn decimal_parses_native_and_text() {
        let def = attr(AttributeType::Decimal);
        assert_eq!(coerce(&def, &json!(2.25)).unwrap(), json!(2.25));
        assert_eq!(coerce(&def, &json!("0.5")).unwrap(), json!(0.5));
        assert!(coerce(&def, &json!("two")).is_err());
    }

    #[test]
    fn datetime_is_not_syntax_checked_here() {
        let def = attr(AttributeType::DateTime);
        assert!(coerce(&def, &json!("not-a-date")).is_ok());
    }

    #[test]
    fn complex_requires_object() {
        let def = attr(AttributeType::Complex);
        assert!(coerce(&def, &json!({"value": "x"})).is_ok());
        assert!(coerce(&def, &json!("x")).is_err());
    }

    #[test]
    fn null_is_rejected() {
        assert!(coerce(&attr(AttributeType::String), &json!(null)).is_err());
        assert!(coerce(&attr(AttributeType::Integer), &json!(null)).is_err());
    }
}
