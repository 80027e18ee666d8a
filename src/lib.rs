//! A runtime-driven EBNF grammar engine.
//!
//! Grammar rules are compiled from plain text at runtime (no code
//! generation) into an expression tree, then interpreted against an input
//! string by a backtracking recursive-descent engine. The engine supports
//! longest-match alternatives, zero-width-repetition guards,
//! furthest-failure diagnostics, and salvaging partially-matched sub-trees
//! when a sequence or repetition fails mid-way.
//!
//! ```
//! use bnf_rt::{Grammar, Parser};
//!
//! let mut grammar = Grammar::new();
//! grammar.add("<digit> ::= '0'...'9'").unwrap();
//! grammar.add("<num> ::= <digit> { <digit> }").unwrap();
//!
//! let ctx = Parser::new(&grammar).parse("<num>", "123");
//! assert!(ctx.success);
//! assert_eq!(ctx.consumed, 3);
//! ```
//!
//! What this crate does not do: left-recursive grammars, memoization,
//! semantic actions beyond building the parse tree, or streaming input.
//! Downstream data extraction (see [projection]) and interactive
//! front-ends are boundary consumers, not part of the interpreter itself.

pub mod context;
pub mod engine;
pub mod error;
pub mod expression;
pub mod grammar;
pub mod meta;
pub mod parse_tree;
pub mod position;
pub mod projection;
pub mod trace;

pub use context::{FailedNode, ParseContext};
pub use engine::Parser;
pub use error::{GrammarError, ParseError};
pub use expression::{ClassMember, Expression};
pub use grammar::{Grammar, Rule};
pub use parse_tree::ParseTreeNode;
pub use position::{Code, Position};
pub use projection::{Projection, Projector};
pub use trace::Trace;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_to_end_alternative_and_projection() {
        let mut grammar = Grammar::new();
        grammar.add("<digit> ::= '0'...'9'").unwrap();
        grammar.add("<letter> ::= ( 'a'...'z' 'A'...'Z' )").unwrap();
        grammar
            .add("<ident> ::= <letter> { <letter> | <digit> | '_' }")
            .unwrap();

        let ctx = Parser::new(&grammar).parse("<ident>", "x1_y2");
        assert!(ctx.success);
        let ast = ctx.ast.unwrap();

        let projection = Projector::new().project(&ast);
        assert_eq!(projection.first("<ident>"), Some("x1_y2"));
        assert!(projection.count("<letter>") >= 1);
    }

    #[test]
    fn describe_and_display_round_trip() {
        let mut grammar = Grammar::new();
        grammar.add("digit ::= '0'...'9'").unwrap();
        assert_eq!(grammar.describe(), "<digit> ::= '0'...'9'");
    }
}
