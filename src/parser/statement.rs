//! Statement parser
//!
//! Converts the logical lines produced by `lexer::split_logical_lines` into
//! a `Vec<Statement>`. Recognizes rule/assignment/command lines, dispatches
//! directives (`include`, `ifeq`/`ifneq`/`ifdef`/`ifndef`, `define`/`endef`,
//! `export`/`unexport`, `override`, `vpath`), and builds expression trees
//! for right-hand sides via `parser::expr`.
//!
//! A syntax error never aborts the parse: it is captured as a
//! `StatementKind::ParseError` so evaluation can surface it at the exact
//! point reached, mirroring GNU make's tolerance of conditionally
//! unreachable syntax errors.

use crate::ast::types::{AssignDirective, AssignOp, IfOp, Loc, RuleTerminator, Statement, StatementKind, Value, AST};
use crate::parser::expr::{check_arity, parse_expr, parse_expr_opt, ParseExprOpt};
use crate::parser::lexer::{split_logical_lines, LogicalLine};
use crate::parser::types::MAX_CONDITIONAL_DEPTH;

/// Parse the full bytes of a Makefile into a statement list.
pub fn parse_statements(src: &[u8], file: &str) -> Vec<Statement> {
    let lines = split_logical_lines(src);
    let mut cursor = Cursor { lines: &lines, pos: 0, file };
    parse_block(&mut cursor, 0)
}

/// Fixed-arity built-in argument counts are enforced here, at parse time
/// (spec.md §4.2: "enforced at parse time when fixed, or at evaluate time
/// when variadic"). A violation becomes a `ParseError` statement at the
/// same location rather than aborting the parse, so it still only surfaces
/// if evaluation actually reaches this statement (spec.md §4.3 step 4, §8
/// "Conditional parsing").
fn check_statement_arity(stmt: Statement) -> Statement {
    let violation = match &stmt.kind {
        StatementKind::Rule { expr, after_terminator, .. } => {
            check_arity(expr).or_else(|| after_terminator.as_ref().and_then(check_arity))
        }
        StatementKind::Assign { lhs, rhs, .. } => check_arity(lhs).or_else(|| check_arity(rhs)),
        StatementKind::Command { expr } => check_arity(expr),
        StatementKind::Include { expr, .. } => check_arity(expr),
        StatementKind::Export { expr, .. } => expr.as_ref().and_then(check_arity),
        StatementKind::Vpath { pattern, dirs } => {
            pattern.as_ref().and_then(check_arity).or_else(|| dirs.as_ref().and_then(check_arity))
        }
        StatementKind::If { lhs, rhs, .. } => check_arity(lhs).or_else(|| rhs.as_ref().and_then(check_arity)),
        StatementKind::ParseError { .. } => None,
    };
    match violation {
        Some(message) => AST::parse_error(stmt.loc, message),
        None => stmt,
    }
}

struct Cursor<'a> {
    lines: &'a [LogicalLine],
    pos: usize,
    file: &'a str,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a LogicalLine> {
        self.lines.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a LogicalLine> {
        let l = self.lines.get(self.pos);
        if l.is_some() {
            self.pos += 1;
        }
        l
    }

    fn loc(&self, line: u32) -> Loc {
        Loc::new(self.file, line)
    }
}

/// Parse a run of statements until end of input or an `else`/`endif` that
/// belongs to an enclosing conditional (left unconsumed for the caller).
fn parse_block(cur: &mut Cursor, depth: usize) -> Vec<Statement> {
    let mut out = Vec::new();
    let mut last_was_rule = false;

    while let Some(line) = cur.peek() {
        let text = &line.text;
        if line.is_recipe {
            if last_was_rule {
                out.push(AST::command(cur.loc(line.line), parse_recipe_expr(strip_one_tab(text))));
            } else {
                // A tab-indented line with no preceding rule/command: GNU
                // make treats this as a (likely empty) command too, but
                // without a target it has nowhere to attach — surface it as
                // a deferred error rather than silently dropping it.
                out.push(AST::parse_error(cur.loc(line.line), "recipe commences before first target"));
            }
            cur.advance();
            continue;
        }

        let trimmed = trim_ascii(text);
        if trimmed.is_empty() {
            cur.advance();
            continue;
        }

        if let Some(word) = directive_word(trimmed) {
            match word {
                "else" | "endif" => {
                    // belongs to an enclosing `if`; don't consume.
                    return out.into_iter().map(check_statement_arity).collect();
                }
                "ifeq" | "ifneq" | "ifdef" | "ifndef" => {
                    if depth >= MAX_CONDITIONAL_DEPTH {
                        out.push(AST::parse_error(cur.loc(line.line), "too many nested conditionals"));
                        cur.advance();
                        continue;
                    }
                    out.push(parse_conditional(cur, depth));
                    last_was_rule = false;
                    continue;
                }
                "include" | "-include" | "sinclude" => {
                    cur.advance();
                    let rest = trim_ascii(&trimmed[word.len()..]);
                    let (expr, _) = parse_expr(rest, &[]);
                    out.push(AST::include(cur.loc(line.line), expr, word != "include"));
                    last_was_rule = false;
                    continue;
                }
                "define" => {
                    out.push(parse_define(cur));
                    last_was_rule = false;
                    continue;
                }
                "export" | "unexport" => {
                    cur.advance();
                    let rest = trim_ascii(&trimmed[word.len()..]);
                    let is_export = word == "export";
                    if rest.is_empty() {
                        out.push(AST::export(cur.loc(line.line), None, is_export));
                    } else if contains_assign_op(rest) {
                        // `export FOO := bar` both assigns and exports.
                        if let Some(stmts) = parse_assign_or_rule(cur.loc(line.line), rest, AssignDirective::Export) {
                            out.extend(stmts);
                        }
                    } else {
                        let (expr, _) = parse_expr(rest, &[]);
                        out.push(AST::export(cur.loc(line.line), Some(expr), is_export));
                    }
                    last_was_rule = false;
                    continue;
                }
                "override" => {
                    cur.advance();
                    let rest = trim_ascii(&trimmed[word.len()..]);
                    if let Some(stmts) = parse_assign_or_rule(cur.loc(line.line), rest, AssignDirective::Override) {
                        out.extend(stmts);
                    }
                    last_was_rule = false;
                    continue;
                }
                "vpath" => {
                    cur.advance();
                    let rest = trim_ascii(&trimmed[word.len()..]);
                    if rest.is_empty() {
                        out.push(AST::vpath(cur.loc(line.line), None, None));
                    } else {
                        let (pattern, stop) = parse_expr(rest, &[b' ', b'\t']);
                        let dirs_bytes = trim_ascii(&rest[stop.min(rest.len())..]);
                        let dirs = if dirs_bytes.is_empty() {
                            None
                        } else {
                            Some(parse_expr(dirs_bytes, &[]).0)
                        };
                        out.push(AST::vpath(cur.loc(line.line), Some(pattern), dirs));
                    }
                    last_was_rule = false;
                    continue;
                }
                _ => {}
            }
        }

        // Not a directive: either an assignment or a rule.
        match parse_assign_or_rule(cur.loc(line.line), trimmed, AssignDirective::None) {
            Some(stmts) => {
                last_was_rule = stmts.iter().any(|s| matches!(s.kind, StatementKind::Rule { .. }));
                out.extend(stmts);
            }
            None => {
                last_was_rule = false;
            }
        }
        cur.advance();
    }

    out.into_iter().map(check_statement_arity).collect()
}

fn strip_one_tab(text: &[u8]) -> &[u8] {
    if text.first() == Some(&b'\t') {
        &text[1..]
    } else {
        text
    }
}

fn parse_recipe_expr(text: &[u8]) -> Value {
    parse_expr_opt(text, &[], ParseExprOpt::Command).0
}

fn directive_word(trimmed: &[u8]) -> Option<&'static str> {
    const WORDS: &[&str] = &[
        "ifeq", "ifneq", "ifdef", "ifndef", "else", "endif", "include", "-include", "sinclude",
        "export", "unexport", "override", "define", "vpath",
    ];
    for w in WORDS {
        let wb = w.as_bytes();
        if trimmed.starts_with(wb) {
            let after = trimmed.get(wb.len()).copied();
            if after.is_none() || after == Some(b' ') || after == Some(b'\t') || after == Some(b':') && *w == "override"
            {
                return Some(w);
            }
        }
    }
    None
}

fn trim_ascii(b: &[u8]) -> &[u8] {
    let start = b.iter().position(|c| !c.is_ascii_whitespace()).unwrap_or(b.len());
    let end = b.iter().rposition(|c| !c.is_ascii_whitespace()).map(|i| i + 1).unwrap_or(start);
    &b[start..end]
}

// =============================================================================
// define / endef
// =============================================================================

fn parse_define(cur: &mut Cursor) -> Statement {
    let start_loc = cur.loc(cur.peek().map(|l| l.line).unwrap_or(0));
    let header_line = cur.advance().unwrap();
    let header = trim_ascii(&header_line.text["define".len()..]);
    let (name_expr, stop) = parse_expr(header, &[b' ', b'\t']);
    // Allow `define FOO =` / `define FOO :=` style flavor markers (GNU make
    // 4.x extension); default is Recursive.
    let op_part = trim_ascii(&header[stop.min(header.len())..]);
    let op = match op_part {
        b":=" | b"::=" => AssignOp::Simple,
        b"+=" => AssignOp::Append,
        b"?=" => AssignOp::Conditional,
        _ => AssignOp::Recursive,
    };

    let mut body: Vec<u8> = Vec::new();
    let mut first = true;
    loop {
        match cur.peek() {
            None => break,
            Some(line) => {
                let is_endef = !line.is_recipe && trim_ascii(&line.text) == b"endef"
                    || (!line.is_recipe && trim_ascii(&line.text).starts_with(b"endef"));
                if is_endef {
                    cur.advance();
                    break;
                }
                if !first {
                    body.push(b'\n');
                }
                first = false;
                if line.is_recipe {
                    // lexer preserves recipe-line newlines already; re-split.
                    body.extend_from_slice(&line.text);
                } else {
                    body.extend_from_slice(&line.text);
                }
                cur.advance();
            }
        }
    }

    let raw_rhs = body.clone();
    let (rhs, _) = parse_expr_opt(&body, &[], ParseExprOpt::Define);
    AST::assign(start_loc, name_expr, rhs, raw_rhs, op, AssignDirective::None)
}

// =============================================================================
// Conditionals
// =============================================================================

fn parse_conditional(cur: &mut Cursor, depth: usize) -> Statement {
    let line = cur.advance().unwrap();
    let loc = cur.loc(line.line);
    let trimmed = trim_ascii(&line.text);
    let (word, rest) = split_first_word(trimmed);
    let op = match word {
        "ifeq" => IfOp::Ifeq,
        "ifneq" => IfOp::Ifneq,
        "ifdef" => IfOp::Ifdef,
        "ifndef" => IfOp::Ifndef,
        _ => unreachable!(),
    };

    let (lhs, rhs) = match op {
        IfOp::Ifeq | IfOp::Ifneq => parse_eq_args(rest),
        IfOp::Ifdef | IfOp::Ifndef => {
            let (name_expr, _) = parse_expr(trim_ascii(rest), &[]);
            (name_expr, None)
        }
    };

    let then_branch = parse_block(cur, depth + 1);

    let mut else_branch = None;
    if let Some(l) = cur.peek() {
        let t = trim_ascii(&l.text);
        if !l.is_recipe && t.starts_with(b"else") {
            cur.advance();
            let after_else = trim_ascii(&t[b"else".len()..]);
            if after_else.is_empty() {
                else_branch = Some(parse_block(cur, depth + 1));
            } else {
                // `else ifeq (...)`: treat as a nested conditional forming
                // the entire else-branch.
                let nested_lines: Vec<LogicalLine> = std::iter::once(LogicalLine {
                    text: after_else.to_vec(),
                    line: l.line,
                    is_recipe: false,
                })
                .collect();
                let mut nested_cur = Cursor { lines: &nested_lines, pos: 0, file: cur.file };
                let elif_word = directive_word(after_else);
                if matches!(elif_word, Some("ifeq") | Some("ifneq") | Some("ifdef") | Some("ifndef")) {
                    let nested_stmt = parse_conditional(&mut nested_cur, depth + 1);
                    // Splice remaining real lines as the nested conditional's body by
                    // continuing to parse from the outer cursor for then/else.
                    let (nop, nlhs, nrhs) = match &nested_stmt.kind {
                        StatementKind::If { op, lhs, rhs, .. } => (*op, lhs.clone(), rhs.clone()),
                        _ => unreachable!(),
                    };
                    let nested_then = parse_block(cur, depth + 1);
                    let mut nested_else = None;
                    if let Some(l2) = cur.peek() {
                        let t2 = trim_ascii(&l2.text);
                        if !l2.is_recipe && t2 == b"else" {
                            cur.advance();
                            nested_else = Some(parse_block(cur, depth + 1));
                        } else if !l2.is_recipe && t2.starts_with(b"else") {
                            // deeper chain; recurse by treating remaining
                            // text the same way (rare in practice).
                            cur.advance();
                            let after2 = trim_ascii(&t2[b"else".len()..]);
                            let nested2: Vec<LogicalLine> = std::iter::once(LogicalLine {
                                text: after2.to_vec(),
                                line: l2.line,
                                is_recipe: false,
                            })
                            .collect();
                            let mut nc2 = Cursor { lines: &nested2, pos: 0, file: cur.file };
                            let inner = parse_conditional(&mut nc2, depth + 1);
                            let rest_then = parse_block(cur, depth + 1);
                            let mut inner_with_body = inner;
                            if let StatementKind::If { then_branch, .. } = &mut inner_with_body.kind {
                                *then_branch = rest_then;
                            }
                            nested_else = Some(vec![inner_with_body]);
                        }
                    }
                    if let Some(l3) = cur.peek() {
                        if !l3.is_recipe && trim_ascii(&l3.text) == b"endif" {
                            cur.advance();
                        }
                    }
                    let inner_if = AST::if_stmt(loc, nop, nlhs, nrhs, nested_then, nested_else);
                    return AST::if_stmt(loc, op, lhs, rhs, then_branch, Some(vec![inner_if]));
                } else {
                    else_branch = Some(parse_block(cur, depth + 1));
                }
            }
        }
    }

    if let Some(l) = cur.peek() {
        if !l.is_recipe && trim_ascii(&l.text) == b"endif" {
            cur.advance();
        }
    }

    AST::if_stmt(loc, op, lhs, rhs, then_branch, else_branch)
}

fn split_first_word(s: &[u8]) -> (&str, &[u8]) {
    let i = s.iter().position(|b| b.is_ascii_whitespace()).unwrap_or(s.len());
    let word = std::str::from_utf8(&s[..i]).unwrap_or("");
    (word, &s[i..])
}

/// `ifeq (a,b)` or `ifeq "a" "b"` — both forms are GNU make syntax.
fn parse_eq_args(rest: &[u8]) -> (Value, Option<Value>) {
    let rest = trim_ascii(rest);
    if rest.first() == Some(&b'(') && rest.last() == Some(&b')') {
        let inner = &rest[1..rest.len() - 1];
        let (lhs, stop) = parse_expr(inner, &[b',']);
        let rhs_bytes = if stop < inner.len() { &inner[stop + 1..] } else { &[][..] };
        let (rhs, _) = parse_expr(rhs_bytes, &[]);
        (lhs, Some(rhs))
    } else {
        // quoted form: "a" "b" or 'a' 'b'
        let (first, after) = take_quoted(rest);
        let (second, _) = take_quoted(trim_ascii(after));
        (Value::literal(first), Some(Value::literal(second)))
    }
}

fn take_quoted(s: &[u8]) -> (&[u8], &[u8]) {
    if let Some(&q) = s.first() {
        if q == b'"' || q == b'\'' {
            if let Some(end) = s[1..].iter().position(|&b| b == q) {
                return (&s[1..end + 1], &s[end + 2..]);
            }
        }
    }
    (s, &[][..])
}

// =============================================================================
// Assignment / Rule disambiguation
// =============================================================================

/// Scan left-to-right at depth zero for the earliest assignment operator or
/// `:`.
enum Split {
    Assign { op_start: usize, op: AssignOp },
    Colon { idx: usize },
    None,
}

fn contains_assign_op(s: &[u8]) -> bool {
    matches!(scan_for_split(s), Split::Assign { .. })
}

fn scan_for_split(s: &[u8]) -> Split {
    let mut depth: i32 = 0;
    let mut i = 0usize;
    while i < s.len() {
        match s[i] {
            b'$' => {
                // skip a `$(...)`/`${...}` reference so its contents never
                // confuse the top-level scan.
                if i + 1 < s.len() && (s[i + 1] == b'(' || s[i + 1] == b'{') {
                    let mut d = 0i32;
                    let mut j = i + 1;
                    loop {
                        if j >= s.len() {
                            i = j;
                            break;
                        }
                        match s[j] {
                            b'(' | b'{' => d += 1,
                            b')' | b'}' => {
                                d -= 1;
                                if d == 0 {
                                    j += 1;
                                    i = j;
                                    break;
                                }
                            }
                            _ => {}
                        }
                        j += 1;
                    }
                    continue;
                }
                i += 1;
            }
            b'?' if depth == 0 && s.get(i + 1) == Some(&b'=') => return Split::Assign { op_start: i, op: AssignOp::Conditional },
            b'+' if depth == 0 && s.get(i + 1) == Some(&b'=') => return Split::Assign { op_start: i, op: AssignOp::Append },
            b'!' if depth == 0 && s.get(i + 1) == Some(&b'=') => return Split::Assign { op_start: i, op: AssignOp::Shell },
            b':' if depth == 0 => {
                if s.get(i + 1) == Some(&b'=') {
                    return Split::Assign { op_start: i, op: AssignOp::Simple };
                }
                return Split::Colon { idx: i };
            }
            b'=' if depth == 0 => return Split::Assign { op_start: i, op: AssignOp::Recursive },
            _ => {
                i += 1;
            }
        }
    }
    Split::None
}

/// Parse a non-directive logical line as either `Assign` or `Rule`. The two
/// forms share a grammar prefix (`foo : bar = baz` could be either), so this
/// only disambiguates what's decidable from raw text; true ambiguities are
/// deferred to the evaluator, which has post-expansion text to work with.
fn parse_assign_or_rule(loc: Loc, text: &[u8], directive: AssignDirective) -> Option<Vec<Statement>> {
    match scan_for_split(text) {
        Split::Assign { op_start, op } => {
            let op_len = match op {
                AssignOp::Recursive => 1,
                _ => 2,
            };
            let lhs_bytes = trim_ascii(&text[..op_start]);
            let (lhs, _) = parse_expr(lhs_bytes, &[]);
            let raw_rhs = trim_leading(&text[op_start + op_len..]).to_vec();
            let (rhs, _) = parse_expr(&raw_rhs, &[]);
            Some(vec![AST::assign(loc, lhs, rhs, raw_rhs, op, directive)])
        }
        Split::Colon { idx } => {
            let lhs_bytes = &text[..idx];
            let (lhs, _) = parse_expr(lhs_bytes, &[b':']);
            let after = &text[idx + 1..];
            // `target : VAR = val` (target-specific variable) vs. a normal
            // rule. Peek past a possible second `:` (double-colon) before
            // deciding.
            let (after, is_double_colon_prefix) = if after.first() == Some(&b':') {
                (&after[1..], true)
            } else {
                (after, false)
            };
            match scan_for_split(after) {
                Split::Assign { .. } if !is_double_colon_prefix || looks_like_varassign(after) => {
                    // `after_terminator` carries the raw, still-unparsed
                    // `<var-name> <op> <rhs>` text verbatim: re-parsing it now
                    // (as `var_lhs`/`rhs` sub-expressions) and later expanding
                    // those would expand `$(...)` references twice. The
                    // evaluator calls `parse_target_specific_assignment` on
                    // this literal text exactly once, after the rule's own
                    // target list is resolved.
                    Some(vec![AST::rule(
                        loc,
                        lhs,
                        RuleTerminator::Equals,
                        Some(Value::literal(after.to_vec())),
                    )])
                }
                _ => {
                    // An inline recipe (`target: prereqs ; command`) must
                    // stay an unexpanded Value, so split it off the raw
                    // bytes before the prereq list goes through `parse_expr`.
                    let (prereq_bytes, inline_cmd) = match find_top_level_semicolon(after) {
                        Some(i) => (&after[..i], Some(&after[i + 1..])),
                        None => (after, None),
                    };
                    let (after_expr, _) = parse_expr(prereq_bytes, &[]);
                    let terminator = if is_double_colon_prefix { RuleTerminator::DoubleColon } else { RuleTerminator::Colon };
                    let rule = AST::rule(loc, lhs, terminator, Some(after_expr));
                    match inline_cmd {
                        Some(cmd_bytes) => Some(vec![rule, AST::command(loc, parse_recipe_expr(cmd_bytes))]),
                        None => Some(vec![rule]),
                    }
                }
            }
        }
        Split::None => {
            if text.is_empty() {
                None
            } else {
                let (expr, _) = parse_expr(text, &[]);
                Some(vec![AST::rule(loc, expr, RuleTerminator::None, None)])
            }
        }
    }
}

/// First `;` not nested inside a `$(...)`/`${...}` reference: inline
/// recipes attach directly after the prerequisite list.
fn find_top_level_semicolon(s: &[u8]) -> Option<usize> {
    let mut i = 0usize;
    while i < s.len() {
        match s[i] {
            b'$' if i + 1 < s.len() && (s[i + 1] == b'(' || s[i + 1] == b'{') => {
                let mut d = 0i32;
                let mut j = i + 1;
                loop {
                    if j >= s.len() {
                        i = j;
                        break;
                    }
                    match s[j] {
                        b'(' | b'{' => d += 1,
                        b')' | b'}' => {
                            d -= 1;
                            if d == 0 {
                                j += 1;
                                i = j;
                                break;
                            }
                        }
                        _ => {}
                    }
                    j += 1;
                }
            }
            b';' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Re-parse the expanded text of a target-specific-variable rule's
/// `after_terminator` (produced by the `Equals`-terminator branch above)
/// into `(lhs_expr, rhs_expr, raw_rhs, op)`. Called by the evaluator once it
/// has expanded the LHS and decided this Rule is really a target-specific
/// assignment.
pub fn parse_target_specific_assignment(text: &[u8]) -> Option<(Value, Value, Vec<u8>, AssignOp)> {
    match scan_for_split(text) {
        Split::Assign { op_start, op } => {
            let op_len = match op {
                AssignOp::Recursive => 1,
                _ => 2,
            };
            let lhs_bytes = trim_ascii(&text[..op_start]);
            let (lhs, _) = parse_expr(lhs_bytes, &[]);
            let raw_rhs = trim_leading(&text[op_start + op_len..]).to_vec();
            let (rhs, _) = parse_expr(&raw_rhs, &[]);
            Some((lhs, rhs, raw_rhs, op))
        }
        _ => None,
    }
}

/// Heuristic used only to disambiguate `target :: rule-prereqs` from
/// `target :: VAR = val` (rare in practice): a target-specific assignment's
/// left-hand side before `=` has no embedded `:`
fn looks_like_varassign(after: &[u8]) -> bool {
    !after.contains(&b':')
}

fn trim_leading(b: &[u8]) -> &[u8] {
    let start = b.iter().position(|c| !c.is_ascii_whitespace()).unwrap_or(b.len());
    &b[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::StatementKind;

    fn parse(src: &[u8]) -> Vec<Statement> {
        parse_statements(src, "Makefile")
    }

    #[test]
    fn parses_simple_assignment() {
        let stmts = parse(b"CC := gcc\n");
        assert_eq!(stmts.len(), 1);
        match &stmts[0].kind {
            StatementKind::Assign { op, .. } => assert_eq!(*op, AssignOp::Simple),
            other => panic!("expected Assign, got {other:?}"),
        }
    }

    #[test]
    fn parses_recursive_assignment() {
        let stmts = parse(b"FOO = bar\n");
        match &stmts[0].kind {
            StatementKind::Assign { op, .. } => assert_eq!(*op, AssignOp::Recursive),
            other => panic!("expected Assign, got {other:?}"),
        }
    }

    #[test]
    fn parses_append_assignment() {
        let stmts = parse(b"FOO += bar\n");
        match &stmts[0].kind {
            StatementKind::Assign { op, .. } => assert_eq!(*op, AssignOp::Append),
            other => panic!("expected Assign, got {other:?}"),
        }
    }

    #[test]
    fn parses_rule_with_command() {
        let stmts = parse(b"all: foo.o\n\techo hi\n");
        assert_eq!(stmts.len(), 2);
        assert!(matches!(stmts[0].kind, StatementKind::Rule { .. }));
        assert!(matches!(stmts[1].kind, StatementKind::Command { .. }));
    }

    #[test]
    fn parses_double_colon_rule() {
        let stmts = parse(b"all:: foo.o\n");
        match &stmts[0].kind {
            StatementKind::Rule { terminator, .. } => assert_eq!(*terminator, RuleTerminator::DoubleColon),
            other => panic!("expected Rule, got {other:?}"),
        }
    }

    #[test]
    fn parses_ifeq_directive() {
        let stmts = parse(b"ifeq ($(X),1)\nA := yes\nelse\nA := no\nendif\n");
        assert_eq!(stmts.len(), 1);
        match &stmts[0].kind {
            StatementKind::If { op, then_branch, else_branch, .. } => {
                assert_eq!(*op, IfOp::Ifeq);
                assert_eq!(then_branch.len(), 1);
                assert!(else_branch.is_some());
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn parses_ifdef_directive() {
        let stmts = parse(b"ifdef X\nA := 1\nendif\n");
        match &stmts[0].kind {
            StatementKind::If { op, .. } => assert_eq!(*op, IfOp::Ifdef),
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn parses_include_directive() {
        let stmts = parse(b"include foo.mk\n");
        match &stmts[0].kind {
            StatementKind::Include { optional, .. } => assert!(!optional),
            other => panic!("expected Include, got {other:?}"),
        }
    }

    #[test]
    fn parses_dash_include_as_optional() {
        let stmts = parse(b"-include foo.mk\n");
        match &stmts[0].kind {
            StatementKind::Include { optional, .. } => assert!(optional),
            other => panic!("expected Include, got {other:?}"),
        }
    }

    #[test]
    fn parses_define_block() {
        let stmts = parse(b"define two-lines\necho one\necho two\nendef\n");
        match &stmts[0].kind {
            StatementKind::Assign { op, raw_rhs, .. } => {
                assert_eq!(*op, AssignOp::Recursive);
                assert_eq!(String::from_utf8_lossy(raw_rhs), "echo one\necho two");
            }
            other => panic!("expected Assign, got {other:?}"),
        }
    }

    #[test]
    fn parses_export_directive() {
        let stmts = parse(b"export FOO\n");
        match &stmts[0].kind {
            StatementKind::Export { is_export, expr } => {
                assert!(*is_export);
                assert!(expr.is_some());
            }
            other => panic!("expected Export, got {other:?}"),
        }
    }

    #[test]
    fn export_with_assignment_both_assigns_and_exports() {
        let stmts = parse(b"export FOO := bar\n");
        match &stmts[0].kind {
            StatementKind::Assign { directive, op, .. } => {
                assert_eq!(*directive, AssignDirective::Export);
                assert_eq!(*op, AssignOp::Simple);
            }
            other => panic!("expected Assign, got {other:?}"),
        }
    }

    #[test]
    fn parses_override_directive() {
        let stmts = parse(b"override CFLAGS := -O2\n");
        match &stmts[0].kind {
            StatementKind::Assign { directive, .. } => assert_eq!(*directive, AssignDirective::Override),
            other => panic!("expected Assign, got {other:?}"),
        }
    }

    #[test]
    fn parses_comment_free_rule_with_inline_command() {
        let stmts = parse(b"all: ; @echo 2\n");
        assert_eq!(stmts.len(), 2);
        assert!(matches!(stmts[0].kind, StatementKind::Rule { .. }));
        assert!(matches!(stmts[1].kind, StatementKind::Command { .. }));
    }

    #[test]
    fn syntax_error_in_taken_branch_is_reachable() {
        let stmts = parse(b"ifdef X\n$(error boom\nendif\n");
        if let StatementKind::If { then_branch, .. } = &stmts[0].kind {
            assert!(!then_branch.is_empty());
        } else {
            panic!("expected If");
        }
    }

    #[test]
    fn fixed_arity_mismatch_becomes_a_parse_error_statement() {
        let stmts = parse(b"X := $(subst a,b)\n");
        match &stmts[0].kind {
            StatementKind::ParseError { message } => assert!(message.contains("subst")),
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn fixed_arity_violation_is_captured_in_branch_without_aborting_the_parse() {
        // The mismatch lives inside an `ifdef` branch that may never be
        // taken at evaluation time, so parsing must still capture it as a
        // deferred `ParseError` statement rather than raising immediately,
        // and must keep parsing the statements that follow.
        let stmts = parse(b"ifdef UNSET\nX := $(subst a,b)\nendif\nY := 1\n");
        if let StatementKind::If { then_branch, .. } = &stmts[0].kind {
            assert!(matches!(then_branch[0].kind, StatementKind::ParseError { .. }));
        } else {
            panic!("expected If");
        }
        assert!(matches!(stmts[1].kind, StatementKind::Assign { .. }));
    }
}
