use crate::parse_tree::ParseTreeNode;
use crate::position::Code;

/// A single recorded match failure: where it happened, what rule was being
/// matched, and what was expected there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedNode {
    pub position: usize,
    pub text: String,
    pub expected: String,
    pub rule_name: String,
}

/// The mutable record threaded through a single [crate::Parser::parse]
/// invocation: cursor, outcome, and every diagnostic collected along the
/// way. A context is created fresh per call and never shared across
/// parses.
pub struct ParseContext<'c> {
    pub code: Code<'c>,
    pub cursor: usize,
    pub success: bool,
    pub consumed: usize,
    pub error_pos: usize,
    pub expected: String,
    /// The rule active when `error_pos`/`expected` were last set at a new
    /// furthest position. Used to label the single diagnostic [FailedNode]
    /// recorded when an overall parse does not succeed.
    pub furthest_rule: String,
    /// Parse-tree nodes salvaged from a `Sequence`/`Repeat` whose sibling(s)
    /// later failed, or flattened from a structurally-successful-but-
    /// incomplete root match. Owned by the caller once the parse returns.
    pub partial_nodes: Vec<ParseTreeNode>,
    pub failures: Vec<FailedNode>,
    pub ast: Option<ParseTreeNode>,
}

impl<'c> ParseContext<'c> {
    pub fn new(code: Code<'c>) -> Self {
        Self {
            code,
            cursor: 0,
            success: false,
            consumed: 0,
            error_pos: 0,
            expected: String::new(),
            furthest_rule: String::new(),
            partial_nodes: Vec::new(),
            failures: Vec::new(),
            ast: None,
        }
    }

    /// Accumulates furthest-failure diagnostics: a failure strictly past
    /// the current `error_pos` replaces it outright (and records which rule
    /// was active there); a failure at the same position appends its
    /// expectation with `" | "` if not already present, so a multi-branch
    /// `Alternative` produces a combined description.
    pub fn update_error(&mut self, position: usize, expected: &str, rule_name: &str) {
        if position > self.error_pos || self.expected.is_empty() {
            self.error_pos = position;
            self.expected = expected.to_string();
            self.furthest_rule = rule_name.to_string();
        } else if position == self.error_pos {
            if !self.expected.split(" | ").any(|part| part == expected) {
                self.expected.push_str(" | ");
                self.expected.push_str(expected);
            }
        }
    }

    pub fn record_failure(&mut self, position: usize, text: String, expected: String, rule_name: String) {
        self.failures.push(FailedNode {
            position,
            text,
            expected,
            rule_name,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_error_replaces_on_further_position() {
        let mut ctx = ParseContext::new(Code::new(b"abc"));
        ctx.update_error(1, "terminal 'a'", "<a>");
        ctx.update_error(2, "terminal 'b'", "<b>");
        assert_eq!(ctx.error_pos, 2);
        assert_eq!(ctx.expected, "terminal 'b'");
        assert_eq!(ctx.furthest_rule, "<b>");
    }

    #[test]
    fn update_error_combines_at_same_position() {
        let mut ctx = ParseContext::new(Code::new(b"abc"));
        ctx.update_error(1, "terminal 'a'", "<a>");
        ctx.update_error(1, "terminal 'b'", "<a>");
        assert_eq!(ctx.expected, "terminal 'a' | terminal 'b'");
    }

    #[test]
    fn update_error_ignores_earlier_position() {
        let mut ctx = ParseContext::new(Code::new(b"abc"));
        ctx.update_error(2, "terminal 'b'", "<b>");
        ctx.update_error(1, "terminal 'a'", "<a>");
        assert_eq!(ctx.error_pos, 2);
        assert_eq!(ctx.expected, "terminal 'b'");
    }

    #[test]
    fn update_error_does_not_duplicate_same_expectation() {
        let mut ctx = ParseContext::new(Code::new(b"abc"));
        ctx.update_error(1, "terminal 'a'", "<a>");
        ctx.update_error(1, "terminal 'a'", "<a>");
        assert_eq!(ctx.expected, "terminal 'a'");
    }
}
