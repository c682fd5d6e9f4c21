//! Expression parser
//!
//! Parses a byte range into a `Value` tree: literals, `$`-prefixed variable
//! references, function calls, and their concatenation. Used both by the
//! statement parser (for right-hand sides, targets, prerequisites) and
//! recursively by itself for nested `$(...)`/`${...}` references.

use crate::ast::types::{FuncKind, Value};

/// Controls whether newlines and leading whitespace are significant while
/// parsing an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseExprOpt {
    Normal,
    Define,
    Command,
    Func,
}

/// Parse `src` as an expression, stopping at end-of-input or at the first
/// byte in `terminators` encountered at depth zero. Returns the parsed
/// value and the index where parsing stopped (so callers can continue
/// parsing the remainder of the line).
pub fn parse_expr(src: &[u8], terminators: &[u8]) -> (Value, usize) {
    parse_expr_opt(src, terminators, ParseExprOpt::Normal)
}

pub fn parse_expr_opt(src: &[u8], terminators: &[u8], _opt: ParseExprOpt) -> (Value, usize) {
    let mut parts = Vec::new();
    let mut literal_start = 0usize;
    let mut i = 0usize;

    while i < src.len() {
        let b = src[i];
        if b == b'$' && i + 1 < src.len() {
            if i > literal_start {
                parts.push(Value::literal(&src[literal_start..i]));
            }
            let (val, next) = parse_dollar(src, i + 1);
            parts.push(val);
            i = next;
            literal_start = i;
            continue;
        }
        if terminators.contains(&b) {
            break;
        }
        i += 1;
    }
    if i > literal_start {
        parts.push(Value::literal(&src[literal_start..i]));
    }
    (Value::concat(parts), i)
}

/// `i` points just past the `$` that introduced this reference.
fn parse_dollar(src: &[u8], i: usize) -> (Value, usize) {
    if i >= src.len() {
        return (Value::literal("$"), i);
    }
    match src[i] {
        b'$' => (Value::literal("$"), i + 1),
        b'(' | b'{' => {
            let close_idx = find_close(src, i + 1);
            let inner = &src[i + 1..close_idx];
            let next_i = if close_idx < src.len() { close_idx + 1 } else { close_idx };
            (parse_paren_contents(inner), next_i)
        }
        c => (Value::VarRef(Box::new(Value::literal(&[c][..]))), i + 1),
    }
}

/// Find the index of the bracket that closes the one opened just before
/// `start`. Tracks nesting across both `()` and `{}` uniformly, since a
/// make expression can mix `$(...)` and `${...}` freely.
fn find_close(src: &[u8], start: usize) -> usize {
    let mut depth: i32 = 0;
    let mut i = start;
    while i < src.len() {
        match src[i] {
            b'(' | b'{' => depth += 1,
            b')' | b'}' => {
                if depth == 0 {
                    return i;
                }
                depth -= 1;
            }
            _ => {}
        }
        i += 1;
    }
    src.len()
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

/// Parse the contents between `$(` and its matching `)` (or the brace
/// equivalent). Decides function-call vs. variable-reference the way GNU
/// make does: a maximal leading run of name bytes that exactly matches a
/// built-in name, followed by whitespace or a comma, is a call.
fn parse_paren_contents(inner: &[u8]) -> Value {
    let mut j = 0usize;
    while j < inner.len() && is_name_byte(inner[j]) {
        j += 1;
    }
    if j > 0 {
        if let Some(kind) = FuncKind::from_name(&inner[..j]) {
            if j == inner.len() {
                return Value::Func(kind, vec![]);
            }
            let sep = inner[j];
            if sep == b' ' || sep == b'\t' || sep == b',' {
                let args_bytes = &inner[j + 1..];
                let spans = split_top_level_commas(args_bytes);
                let args = spans.iter().map(|span| parse_expr(span, &[]).0).collect();
                return Value::Func(kind, args);
            }
        }
    }
    let (name_val, _) = parse_expr(inner, &[]);
    Value::VarRef(Box::new(name_val))
}

/// Split `src` on top-level commas (depth tracked the same way `find_close`
/// does), so a nested `$(call f,a,b)` argument doesn't get split on its own
/// inner commas.
fn split_top_level_commas(src: &[u8]) -> Vec<&[u8]> {
    let mut spans = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0usize;
    let mut i = 0usize;
    while i < src.len() {
        match src[i] {
            b'(' | b'{' => depth += 1,
            b')' | b'}' => depth -= 1,
            b',' if depth == 0 => {
                spans.push(&src[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    spans.push(&src[start..]);
    spans
}

/// Recursively check fixed-arity built-ins for argument-count mismatches.
/// Returns the first violation found, suitable for wrapping into a
/// `ParseError` statement.
pub fn check_arity(value: &Value) -> Option<String> {
    match value {
        Value::Literal(_) => None,
        Value::VarRef(name) => check_arity(name),
        Value::Concat(parts) => parts.iter().find_map(check_arity),
        Value::Func(kind, args) => {
            if let Some(expected) = kind.fixed_arity() {
                if args.len() != expected {
                    return Some(format!(
                        "insufficient number of arguments ({}) to function `{}'",
                        args.len(),
                        kind.as_str()
                    ));
                }
            }
            args.iter().find_map(check_arity)
        }
    }
}
