//! Abstract syntax tree for the SCIM filter language.
//!
//! The node kinds form a small closed set, so a tagged enum with exhaustive
//! matching is used throughout instead of trait dispatch. `Display` renders
//! the canonical textual form, which re-parses to an equal tree.

use serde_json::Number;
use std::fmt;

/// An attribute path inside a filter expression.
///
/// Resolved relative to the candidate value the filter is evaluated
/// against; an optional schema URI prefix and one level of sub-attribute
/// are allowed, mirroring the path grammar.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrPath {
    /// Optional schema URI prefix
    pub uri: Option<String>,
    /// Attribute base name
    pub name: String,
    /// Optional sub-attribute name
    pub sub: Option<String>,
}

impl AttrPath {
    /// A bare attribute path with no URI and no sub-attribute.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uri: None,
            name: name.into(),
            sub: None,
        }
    }

    /// Split a raw token into URI, name and sub-attribute parts.
    ///
    /// The URI is everything up to the last `:`; the remainder splits at
    /// the first `.`. Returns `None` when the resulting name is empty or
    /// starts with an illegal character.
    pub(crate) fn from_token(token: &str) -> Option<Self> {
        let (uri, local) = match token.rsplit_once(':') {
            Some((uri, local)) => (Some(uri.to_string()), local),
            None => (None, token),
        };
        let (name, sub) = match local.split_once('.') {
            Some((name, sub)) => (name, Some(sub.to_string())),
            None => (local, None),
        };
        if !is_attr_name(name) || !sub.as_deref().map(is_attr_name).unwrap_or(true) {
            return None;
        }
        Some(Self {
            uri,
            name: name.to_string(),
            sub,
        })
    }
}

/// An attribute name: leading alpha or `$`, then alphanumerics, `-`, `_`.
pub(crate) fn is_attr_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(uri) = &self.uri {
            write!(f, "{uri}:")?;
        }
        write!(f, "{}", self.name)?;
        if let Some(sub) = &self.sub {
            write!(f, ".{sub}")?;
        }
        Ok(())
    }
}

/// Comparison operators of the filter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Contains
    Co,
    /// Starts with
    Sw,
    /// Ends with
    Ew,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Present (takes no literal)
    Pr,
}

impl CompareOp {
    /// The lowercase keyword for this operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Co => "co",
            Self::Sw => "sw",
            Self::Ew => "ew",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Pr => "pr",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// Conjunction, short-circuits left to right
    And,
    /// Disjunction, short-circuits left to right
    Or,
}

impl LogicalOp {
    /// The lowercase keyword for this connective.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// A comparison literal: one of the JSON scalar tokens.
///
/// Literals stay untyped at parse time; the evaluator types them against
/// the target attribute definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Quoted string
    String(String),
    /// JSON number
    Number(Number),
    /// `true` or `false`
    Boolean(bool),
    /// `null`
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // serde_json string rendering gives back valid JSON escapes
            Self::String(s) => {
                write!(f, "{}", serde_json::Value::String(s.clone()))
            }
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// `attrPath op literal`, or `attrPath pr`
    Compare {
        /// The attribute to compare
        path: AttrPath,
        /// The comparison operator
        op: CompareOp,
        /// The literal; absent only for `pr`
        literal: Option<Literal>,
    },
    /// `left and right` / `left or right`
    Logical {
        /// The connective
        op: LogicalOp,
        /// Left operand, evaluated first
        left: Box<FilterExpr>,
        /// Right operand, skipped when the left short-circuits
        right: Box<FilterExpr>,
    },
    /// `not (inner)`
    Not(Box<FilterExpr>),
    /// `(inner)`
    Group(Box<FilterExpr>),
}

impl FilterExpr {
    fn precedence(&self) -> u8 {
        match self {
            Self::Logical {
                op: LogicalOp::Or, ..
            } => 1,
            Self::Logical {
                op: LogicalOp::And, ..
            } => 2,
            Self::Compare { .. } | Self::Not(_) | Self::Group(_) => 3,
        }
    }

    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        let prec = self.precedence();
        let parens = prec < min;
        if parens {
            f.write_str("(")?;
        }
        match self {
            Self::Compare { path, op, literal } => {
                write!(f, "{path} {op}")?;
                if let Some(lit) = literal {
                    write!(f, " {lit}")?;
                }
            }
            Self::Logical { op, left, right } => {
                // left-associative: the right operand needs one level more
                left.fmt_prec(f, prec)?;
                write!(f, " {} ", op.as_str())?;
                right.fmt_prec(f, prec + 1)?;
            }
            Self::Not(inner) => {
                f.write_str("not (")?;
                inner.fmt_prec(f, 0)?;
                f.write_str(")")?;
            }
            Self::Group(inner) => {
                f.write_str("(")?;
                inner.fmt_prec(f, 0)?;
                f.write_str(")")?;
            }
        }
        if parens {
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_prec(f, 0)
    }
}
