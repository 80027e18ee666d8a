use crate::context::ParseContext;
use crate::error::{GrammarError, ParseError};
use crate::expression::{render_byte, ClassMember, Expression};
use crate::grammar::Grammar;
use crate::parse_tree::ParseTreeNode;
use crate::position::Code;
use crate::trace::Trace;

const FAILED_NODE_SNIPPET_LEN: usize = 16;

fn is_synthetic_tag(symbol: &str) -> bool {
    matches!(symbol, "<seq>" | "<alt>" | "<opt>" | "<rep>")
}

/// Flattens a structurally-successful node into the individually meaningful
/// sub-trees it was built from, recursing through the synthetic composite
/// tags (`<seq>`, `<alt>`, `<opt>`, `<rep>`) and stopping at every
/// `Terminal`/`Symbol`-produced node. Used when a root expression matches
/// but does not consume the whole input: the caller gets the useful
/// fragments instead of nothing.
fn flatten_into_partials(node: &ParseTreeNode, out: &mut Vec<ParseTreeNode>) {
    if is_synthetic_tag(&node.symbol) {
        for child in &node.children {
            flatten_into_partials(child, out);
        }
    } else {
        out.push(node.clone());
    }
}

fn normalize_rule_name(name: &str) -> String {
    if name.starts_with('<') && name.ends_with('>') {
        name.to_string()
    } else {
        format!("<{}>", name)
    }
}

enum EvalOutcome {
    Success(ParseTreeNode),
    Failure,
}

/// The backtracking recursive-descent interpreter: walks a compiled
/// [Expression] tree against an input byte slice, threading a
/// [ParseContext] as cursor and diagnostics sink.
///
/// Grammars are read-only once built, so a single `Parser` can drive many
/// concurrent parses against it; each [Parser::parse] call creates its own
/// fresh context.
pub struct Parser<'g> {
    grammar: &'g Grammar,
    max_depth: Option<usize>,
    trace: Trace,
}

impl<'g> Parser<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            max_depth: None,
            trace: Trace::None,
        }
    }

    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.trace = trace;
        self
    }

    /// Bounds recursion depth (measured in `Symbol` descents). Exceeding it
    /// is a fatal, non-backtrackable error rather than a stack overflow.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn parse<'c>(&self, start_rule: &str, input: &'c str) -> ParseContext<'c> {
        self.parse_bytes(start_rule, input.as_bytes())
    }

    pub fn parse_bytes<'c>(&self, start_rule: &str, input: &'c [u8]) -> ParseContext<'c> {
        let mut ctx = ParseContext::new(Code::new(input));

        if start_rule.is_empty() || self.grammar.is_empty() {
            let message = "parse requires a non-empty start rule and a non-empty grammar".to_string();
            ctx.update_error(0, &message, start_rule);
            self.fail_fatal(&mut ctx, start_rule, message);
            return ctx;
        }

        let name = normalize_rule_name(start_rule);
        let Some(rule) = self.grammar.get(&name) else {
            let message = format!("unknown start rule {}", name);
            ctx.update_error(0, &message, &name);
            self.fail_fatal(&mut ctx, &name, message);
            return ctx;
        };

        match self.eval(&rule.expression, &mut ctx, &rule.name, 0) {
            Ok(EvalOutcome::Success(child)) => {
                ctx.consumed = ctx.cursor;
                ctx.success = ctx.cursor == ctx.code.len();
                if ctx.success {
                    let matched = child.matched.clone();
                    ctx.ast = Some(ParseTreeNode::new(rule.name.clone(), matched, vec![child]));
                } else {
                    flatten_into_partials(&child, &mut ctx.partial_nodes);
                    self.record_furthest_failure(&mut ctx);
                }
            }
            Ok(EvalOutcome::Failure) => {
                ctx.consumed = 0;
                ctx.success = false;
                self.record_furthest_failure(&mut ctx);
            }
            Err(fatal) => {
                ctx.consumed = 0;
                ctx.success = false;
                ctx.expected = fatal.to_string();
                self.fail_fatal(&mut ctx, &rule.name, fatal.to_string());
            }
        }

        ctx
    }

    /// Convenience entry point for callers that want a `Result` rather than
    /// inspecting a [ParseContext] directly.
    pub fn parse_checked(&self, start_rule: &str, input: &str) -> Result<ParseTreeNode, ParseError> {
        let ctx = self.parse(start_rule, input);
        match ctx.ast {
            Some(ast) if ctx.success => Ok(ast),
            _ => Err(ParseError::new(
                ctx.error_pos,
                ctx.expected.clone(),
                "the grammar did not match the full input".to_string(),
            )),
        }
    }

    fn record_furthest_failure(&self, ctx: &mut ParseContext) {
        let position = ctx.error_pos;
        let end = (position + FAILED_NODE_SNIPPET_LEN).min(ctx.code.len());
        let text = ctx.code.slice(position.min(ctx.code.len()), end);
        let expected = ctx.expected.clone();
        let rule_name = ctx.furthest_rule.clone();
        ctx.record_failure(position, text, expected, rule_name);
    }

    fn fail_fatal(&self, ctx: &mut ParseContext, rule_name: &str, message: String) {
        ctx.record_failure(ctx.error_pos, String::new(), message, rule_name.to_string());
    }

    fn eval(
        &self,
        expr: &Expression,
        ctx: &mut ParseContext,
        rule_name: &str,
        depth: usize,
    ) -> Result<EvalOutcome, GrammarError> {
        if let Some(max_depth) = self.max_depth {
            if depth > max_depth {
                return Err(GrammarError::new(
                    Some(ctx.cursor),
                    format!("recursion depth exceeded {} while matching {}", max_depth, rule_name),
                ));
            }
        }

        self.trace.log_enter(rule_name, &ctx.code, ctx.cursor);
        let start = ctx.cursor;

        let outcome = match expr {
            Expression::Terminal(text) => self.eval_terminal(text, ctx, rule_name),
            Expression::CharRange(lo, hi) => self.eval_char_range(*lo, *hi, ctx, rule_name),
            Expression::CharClass { .. } => self.eval_char_class(expr, ctx, rule_name),
            Expression::Symbol(name) => self.eval_symbol(name, ctx, depth),
            Expression::Sequence(children) => self.eval_sequence(children, ctx, rule_name, depth),
            Expression::Alternative(children) => self.eval_alternative(children, ctx, rule_name, depth),
            Expression::Optional(child) => self.eval_optional(child, ctx, rule_name, depth),
            Expression::Repeat(child) => self.eval_repeat(child, ctx, rule_name, depth),
        }?;

        match &outcome {
            EvalOutcome::Success(_) => self.trace.log_success(rule_name, &ctx.code, start, ctx.cursor),
            EvalOutcome::Failure => self.trace.log_failure(rule_name, &ctx.code, ctx.cursor, &ctx.expected),
        }

        Ok(outcome)
    }

    fn eval_terminal(
        &self,
        text: &str,
        ctx: &mut ParseContext,
        rule_name: &str,
    ) -> Result<EvalOutcome, GrammarError> {
        let bytes = text.as_bytes();
        let end = ctx.cursor + bytes.len();
        if end <= ctx.code.len() && &ctx.code.bytes[ctx.cursor..end] == bytes {
            let node = ParseTreeNode::leaf(text.to_string(), text.to_string());
            ctx.cursor = end;
            Ok(EvalOutcome::Success(node))
        } else {
            ctx.update_error(ctx.cursor, &format!("terminal '{}'", text), rule_name);
            Ok(EvalOutcome::Failure)
        }
    }

    fn eval_char_range(
        &self,
        lo: u8,
        hi: u8,
        ctx: &mut ParseContext,
        rule_name: &str,
    ) -> Result<EvalOutcome, GrammarError> {
        if let Some(&b) = ctx.code.bytes.get(ctx.cursor) {
            if lo <= b && b <= hi {
                let symbol = format!("'{}'", render_byte(b));
                let matched = ctx.code.slice(ctx.cursor, ctx.cursor + 1);
                ctx.cursor += 1;
                return Ok(EvalOutcome::Success(ParseTreeNode::leaf(symbol, matched)));
            }
        }
        let expected = format!("character in range '{}'..'{}'", render_byte(lo), render_byte(hi));
        ctx.update_error(ctx.cursor, &expected, rule_name);
        Ok(EvalOutcome::Failure)
    }

    fn eval_char_class(
        &self,
        expr: &Expression,
        ctx: &mut ParseContext,
        rule_name: &str,
    ) -> Result<EvalOutcome, GrammarError> {
        let Expression::CharClass { inclusive, members } = expr else {
            unreachable!("eval_char_class called with a non-CharClass expression");
        };
        if let Some(&b) = ctx.code.bytes.get(ctx.cursor) {
            let is_member = members.iter().any(|m: &ClassMember| m.matches(b));
            if is_member == *inclusive {
                let symbol = format!("'{}'", render_byte(b));
                let matched = ctx.code.slice(ctx.cursor, ctx.cursor + 1);
                ctx.cursor += 1;
                return Ok(EvalOutcome::Success(ParseTreeNode::leaf(symbol, matched)));
            }
        }
        let expected = format!("character matching {}", expr);
        ctx.update_error(ctx.cursor, &expected, rule_name);
        Ok(EvalOutcome::Failure)
    }

    fn eval_symbol(&self, name: &str, ctx: &mut ParseContext, depth: usize) -> Result<EvalOutcome, GrammarError> {
        let Some(rule) = self.grammar.get(name) else {
            return Err(GrammarError::new(Some(ctx.cursor), format!("unknown symbol {}", name)));
        };
        match self.eval(&rule.expression, ctx, &rule.name, depth + 1)? {
            EvalOutcome::Success(child) => {
                let matched = child.matched.clone();
                Ok(EvalOutcome::Success(ParseTreeNode::new(name.to_string(), matched, vec![child])))
            }
            EvalOutcome::Failure => Ok(EvalOutcome::Failure),
        }
    }

    fn eval_sequence(
        &self,
        children: &[Expression],
        ctx: &mut ParseContext,
        rule_name: &str,
        depth: usize,
    ) -> Result<EvalOutcome, GrammarError> {
        let start = ctx.cursor;
        let mut built = Vec::with_capacity(children.len());
        for child_expr in children {
            match self.eval(child_expr, ctx, rule_name, depth)? {
                EvalOutcome::Success(node) => built.push(node),
                EvalOutcome::Failure => {
                    ctx.cursor = start;
                    ctx.partial_nodes.extend(built);
                    return Ok(EvalOutcome::Failure);
                }
            }
        }
        let matched: String = built.iter().map(|n| n.matched.as_str()).collect();
        Ok(EvalOutcome::Success(ParseTreeNode::new("<seq>", matched, built)))
    }

    fn eval_alternative(
        &self,
        children: &[Expression],
        ctx: &mut ParseContext,
        rule_name: &str,
        depth: usize,
    ) -> Result<EvalOutcome, GrammarError> {
        let start = ctx.cursor;
        let mut best: Option<(usize, ParseTreeNode)> = None;
        for child_expr in children {
            ctx.cursor = start;
            if let EvalOutcome::Success(node) = self.eval(child_expr, ctx, rule_name, depth)? {
                let end = ctx.cursor;
                let is_better = match &best {
                    Some((best_end, _)) => end > *best_end,
                    None => true,
                };
                if is_better {
                    best = Some((end, node));
                }
            }
        }
        match best {
            Some((end, node)) => {
                ctx.cursor = end;
                Ok(EvalOutcome::Success(ParseTreeNode::new("<alt>", node.matched.clone(), vec![node])))
            }
            None => {
                ctx.cursor = start;
                Ok(EvalOutcome::Failure)
            }
        }
    }

    fn eval_optional(
        &self,
        child: &Expression,
        ctx: &mut ParseContext,
        rule_name: &str,
        depth: usize,
    ) -> Result<EvalOutcome, GrammarError> {
        let start = ctx.cursor;
        match self.eval(child, ctx, rule_name, depth)? {
            EvalOutcome::Success(node) => {
                Ok(EvalOutcome::Success(ParseTreeNode::new("<opt>", node.matched.clone(), vec![node])))
            }
            EvalOutcome::Failure => {
                ctx.cursor = start;
                Ok(EvalOutcome::Success(ParseTreeNode::new("<opt>", String::new(), Vec::new())))
            }
        }
    }

    fn eval_repeat(
        &self,
        child: &Expression,
        ctx: &mut ParseContext,
        rule_name: &str,
        depth: usize,
    ) -> Result<EvalOutcome, GrammarError> {
        let mut built = Vec::new();
        loop {
            let snapshot = ctx.cursor;
            match self.eval(child, ctx, rule_name, depth)? {
                EvalOutcome::Failure => {
                    ctx.cursor = snapshot;
                    break;
                }
                EvalOutcome::Success(node) => {
                    if node.matched.is_empty() {
                        ctx.cursor = snapshot;
                        break;
                    }
                    built.push(node);
                    if ctx.cursor >= ctx.code.len() {
                        break;
                    }
                }
            }
        }
        let matched: String = built.iter().map(|n| n.matched.as_str()).collect();
        Ok(EvalOutcome::Success(ParseTreeNode::new("<rep>", matched, built)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar(rules: &[&str]) -> Grammar {
        let mut g = Grammar::new();
        for r in rules {
            g.add(r).unwrap();
        }
        g
    }

    #[test]
    fn digit_sequence_succeeds_fully() {
        let g = grammar(&["<digit> ::= '0'...'9'", "<num> ::= <digit> { <digit> }"]);
        let ctx = Parser::new(&g).parse("<num>", "123");
        assert!(ctx.success);
        assert_eq!(ctx.consumed, 3);
        let ast = ctx.ast.unwrap();
        assert_eq!(ast.symbol, "<num>");
        assert_eq!(ast.matched, "123");
        assert_eq!(ast.children.len(), 1);
    }

    #[test]
    fn digit_sequence_reports_partial_nodes_on_incomplete_consumption() {
        let g = grammar(&["<digit> ::= '0'...'9'", "<num> ::= <digit> { <digit> }"]);
        let ctx = Parser::new(&g).parse("<num>", "12a");
        assert!(!ctx.success);
        assert_eq!(ctx.failures[0].position, 2);
        assert!(ctx.failures[0].expected.contains("character in range '0'..'9'"));
        assert_eq!(ctx.partial_nodes.len(), 2);
        assert_eq!(ctx.partial_nodes[0].matched, "1");
        assert_eq!(ctx.partial_nodes[1].matched, "2");
    }

    #[test]
    fn alternative_picks_longest_match() {
        let g = grammar(&["<alt> ::= 'A' | 'AB' | 'ABC'"]);
        let ctx = Parser::new(&g).parse("<alt>", "ABC");
        assert!(ctx.success);
        assert_eq!(ctx.ast.unwrap().matched, "ABC");
    }

    #[test]
    fn optional_never_fails() {
        let g = grammar(&["<opt> ::= 'A' [ 'B' ] 'C'"]);
        let ctx_abc = Parser::new(&g).parse("<opt>", "ABC");
        assert!(ctx_abc.success);
        assert_eq!(ctx_abc.consumed, 3);

        let ctx_ac = Parser::new(&g).parse("<opt>", "AC");
        assert!(ctx_ac.success);
        assert_eq!(ctx_ac.consumed, 2);

        let ctx_axc = Parser::new(&g).parse("<opt>", "AXC");
        assert!(!ctx_axc.success);
        assert_eq!(ctx_axc.error_pos, 1);
    }

    #[test]
    fn repeat_collects_every_iteration() {
        let g = grammar(&["<rep> ::= 'A' { 'B' }"]);
        let ctx = Parser::new(&g).parse("<rep>", "ABBB");
        assert!(ctx.success);
        assert_eq!(ctx.consumed, 4);
        let ast = ctx.ast.unwrap();
        let rep_node = &ast.children[0].children[1];
        assert_eq!(rep_node.symbol, "<rep>");
        assert_eq!(rep_node.children.len(), 3);
    }

    #[test]
    fn channel_list_salvages_partial_progress() {
        let g = grammar(&[
            "<letter> ::= ( 'a'...'z' 'A'...'Z' )",
            "<digit> ::= '0'...'9'",
            "<channel> ::= '#' <letter> { <letter> | <digit> | '_' | '-' }",
            "<chanlist> ::= <channel> { ',' <channel> }",
        ]);
        let ctx = Parser::new(&g).parse("<chanlist>", "#a,bad,#c");
        assert!(!ctx.success);
        assert_eq!(ctx.failures[0].position, 3);
        assert!(ctx.failures[0].expected.contains("terminal '#'"));
        assert!(ctx.partial_nodes.iter().any(|n| n.matched == "#a"));
    }

    #[test]
    fn unknown_symbol_is_fatal() {
        let mut g = Grammar::new();
        g.add("<a> ::= <missing>").unwrap();
        let ctx = Parser::new(&g).parse("<a>", "x");
        assert!(!ctx.success);
        assert!(ctx.expected.contains("unknown symbol"));
    }

    #[test]
    fn max_depth_guards_unbounded_recursion() {
        let mut g = Grammar::new();
        g.add("<a> ::= <a>").unwrap();
        let ctx = Parser::new(&g).with_max_depth(8).parse("<a>", "x");
        assert!(!ctx.success);
        assert!(ctx.expected.contains("recursion depth exceeded"));
    }
}
