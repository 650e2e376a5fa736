//! PEG parser rules for the SCIM filter and path grammars.
//!
//! Being a PEG parser, choices are ordered longest/most-specific first and
//! there is no backtracking across a successfully consumed rule, so keyword
//! rules (`not`, `pr`, ...) guard against running into a longer attribute
//! token. Keywords are case-insensitive; string literals are JSON strings
//! with the usual backslash escapes; whitespace outside literals is
//! insignificant.

use super::ast::{AttrPath, CompareOp, FilterExpr, Literal, LogicalOp};
use crate::error::{PatchError, PatchResult};
use serde_json::Number;

/// A structurally parsed patch path, before schema binding.
///
/// The head keeps URI colons and short-form dots fused in one token because
/// only the schema registry can tell a URI dot (`...enterprise:2.0:User`)
/// from a sub-attribute separator; binding happens in `patch::path`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawPath {
    /// Everything before the first `[`, `.`-separated tail or end
    pub head: String,
    /// Filter attached to the last name of the head
    pub head_filter: Option<FilterExpr>,
    /// Segments following a bracketed filter
    pub tail: Vec<RawSegment>,
}

/// One `.name` or `.name[filter]` tail segment.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawSegment {
    pub name: String,
    pub filter: Option<FilterExpr>,
}

peg::parser! {
    grammar scim() for str {
        // case-insensitive keyword, see rust-peg issue #216
        rule i(literal: &'static str)
        = input:$([_]*<{literal.len()}>)
        {? if input.eq_ignore_ascii_case(literal) { Ok(()) } else { Err(literal) } }

        rule _ = quiet! { [' ' | '\t' | '\n' | '\r']* }
        rule __ = quiet! { [' ' | '\t' | '\n' | '\r']+ }

        rule attr_char() = ['a'..='z' | 'A'..='Z' | '0'..='9' | '.' | ':' | '-' | '_' | '$']
        rule name_char() = ['a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '$']

        // ===== filter grammar ===============================================

        pub rule filter() -> FilterExpr = _ e:or_expr() _ ![_] { e }

        rule or_expr() -> FilterExpr
        = l:and_expr() rest:(__ i("or") __ r:and_expr() { r })* {
            rest.into_iter().fold(l, |acc, r| FilterExpr::Logical {
                op: LogicalOp::Or,
                left: Box::new(acc),
                right: Box::new(r),
            })
        }

        rule and_expr() -> FilterExpr
        = l:not_expr() rest:(__ i("and") __ r:not_expr() { r })* {
            rest.into_iter().fold(l, |acc, r| FilterExpr::Logical {
                op: LogicalOp::And,
                left: Box::new(acc),
                right: Box::new(r),
            })
        }

        rule not_expr() -> FilterExpr
        = i("not") _ "(" _ e:or_expr() _ ")" { FilterExpr::Not(Box::new(e)) }
        / "(" _ e:or_expr() _ ")" { FilterExpr::Group(Box::new(e)) }
        / compare()

        rule compare() -> FilterExpr
        = p:attr_path() __ i("pr") !attr_char() {
            FilterExpr::Compare { path: p, op: CompareOp::Pr, literal: None }
        }
        / p:attr_path() __ op:compare_op() _ lit:literal() {
            FilterExpr::Compare { path: p, op, literal: Some(lit) }
        }

        rule compare_op() -> CompareOp
        = i("eq") { CompareOp::Eq }
        / i("ne") { CompareOp::Ne }
        / i("co") { CompareOp::Co }
        / i("sw") { CompareOp::Sw }
        / i("ew") { CompareOp::Ew }
        / i("ge") { CompareOp::Ge }
        / i("gt") { CompareOp::Gt }
        / i("le") { CompareOp::Le }
        / i("lt") { CompareOp::Lt }

        rule attr_path() -> AttrPath
        = t:$(attr_char()+) {? AttrPath::from_token(t).ok_or("attribute path") }

        // ===== literals (JSON tokens) =======================================

        rule literal() -> Literal
        = s:string_lit()  { Literal::String(s) }
        / n:number_lit()  { Literal::Number(n) }
        / "true" !attr_char()  { Literal::Boolean(true) }
        / "false" !attr_char() { Literal::Boolean(false) }
        / "null" !attr_char()  { Literal::Null }

        rule string_lit() -> String
        = "\"" parts:string_char()* "\"" { parts.into_iter().collect() }

        rule string_char() -> char
        = "\\\"" { '"' }
        / "\\\\" { '\\' }
        / "\\/"  { '/' }
        / "\\b"  { '\u{0008}' }
        / "\\f"  { '\u{000C}' }
        / "\\n"  { '\n' }
        / "\\r"  { '\r' }
        / "\\t"  { '\t' }
        / "\\u" d:$(['0'..='9' | 'a'..='f' | 'A'..='F']*<4>) {?
            u32::from_str_radix(d, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or("unicode escape")
        }
        / !['"' | '\\'] c:[_] { c }

        rule number_lit() -> Number
        = n:$("-"? ['0'..='9']+ ("." ['0'..='9']+)? (['e' | 'E'] ['+' | '-']? ['0'..='9']+)?) {?
            n.parse::<Number>().map_err(|_| "number")
        }

        // ===== path grammar =================================================

        pub rule path() -> RawPath
        = _ head:$(attr_char()+) head_filter:bracket_filter()? tail:tail_segment()* _ ![_] {
            RawPath { head: head.to_string(), head_filter, tail }
        }

        rule bracket_filter() -> FilterExpr
        = "[" _ e:or_expr() _ "]" { e }

        rule tail_segment() -> RawSegment
        = "." n:$(name_char()+) f:bracket_filter()? {
            RawSegment { name: n.to_string(), filter: f }
        }
    }
}

/// Parse a SCIM filter expression.
///
/// Syntax errors carry the byte offset of the failure and the token set the
/// parser expected there.
pub fn parse_filter(text: &str) -> PatchResult<FilterExpr> {
    scim::filter(text).map_err(|e| {
        PatchError::invalid_filter(e.location.offset, format!("expected {}", e.expected))
    })
}

/// Parse a patch path into its raw structural form.
///
/// Schema binding (URI/short-form disambiguation, attribute lookup) happens
/// in `patch::path`.
pub(crate) fn parse_path_raw(text: &str) -> PatchResult<RawPath> {
    scim::path(text).map_err(|e| {
        PatchError::invalid_path(
            text,
            format!("syntax error at offset {}, expected {}", e.location.offset, e.expected),
        )
    })
}
