use super::scanner::Scanner;
use super::token::{MetaToken, MetaTokenKind};
use crate::error::GrammarError;
use crate::expression::{ClassMember, Expression};

/// Recursive-descent meta-parser: consumes the token stream produced by
/// [Scanner] and builds an [Expression] tree for a single rule's
/// right-hand side, following the precedence ladder
/// `expression -> sequence -> repeatable -> primary`.
pub struct Compiler<'s> {
    scanner: Scanner<'s>,
}

impl<'s> Compiler<'s> {
    /// Compiles the right-hand-side text of a rule into an expression tree.
    pub fn compile(text: &'s str) -> Result<Expression, GrammarError> {
        let mut compiler = Compiler {
            scanner: Scanner::new(text),
        };
        let expr = compiler.parse_expression()?;
        let trailing = compiler.scanner.peek();
        if trailing.kind != MetaTokenKind::End {
            return Err(GrammarError::new(
                Some(trailing.position),
                format!("unexpected trailing token '{}'", trailing.payload),
            ));
        }
        Ok(expr)
    }

    fn parse_expression(&mut self) -> Result<Expression, GrammarError> {
        let mut branches = vec![self.parse_sequence()?];
        while self.scanner.peek().kind == MetaTokenKind::Pipe {
            self.scanner.next();
            branches.push(self.parse_sequence()?);
        }
        Ok(Expression::alternative(branches))
    }

    fn parse_sequence(&mut self) -> Result<Expression, GrammarError> {
        let mut elements = vec![self.parse_repeatable()?];
        while starts_repeatable(self.scanner.peek().kind) {
            elements.push(self.parse_repeatable()?);
        }
        Ok(Expression::sequence(elements))
    }

    fn parse_repeatable(&mut self) -> Result<Expression, GrammarError> {
        let next = self.scanner.peek();
        match next.kind {
            MetaTokenKind::LBrace => {
                self.scanner.next();
                let inner = self.parse_expression()?;
                self.expect(MetaTokenKind::RBrace)?;
                Ok(Expression::repeat(inner))
            }
            MetaTokenKind::LBracket => {
                self.scanner.next();
                let inner = self.parse_expression()?;
                self.expect(MetaTokenKind::RBracket)?;
                Ok(Expression::optional(inner))
            }
            MetaTokenKind::LParen => {
                self.scanner.next();
                let class = self.parse_char_class_body()?;
                self.expect(MetaTokenKind::RParen)?;
                Ok(class)
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expression, GrammarError> {
        let token = self.scanner.next();
        match token.kind {
            MetaTokenKind::Terminal => {
                if self.scanner.peek().kind == MetaTokenKind::Ellipsis {
                    self.parse_char_range_tail(&token)
                } else {
                    Ok(Expression::Terminal(token.payload))
                }
            }
            MetaTokenKind::Hex => {
                if self.scanner.peek().kind == MetaTokenKind::Ellipsis {
                    self.parse_char_range_tail(&token)
                } else {
                    let b = token_to_byte(&token)?;
                    Ok(Expression::char_range(b, b))
                }
            }
            MetaTokenKind::Symbol => Ok(Expression::Symbol(token.payload)),
            MetaTokenKind::Word => Ok(Expression::Terminal(token.payload)),
            _ => Err(GrammarError::new(
                Some(token.position),
                format!("expected a terminal, symbol, or group, found '{}'", token.payload),
            )),
        }
    }

    /// Parses the `ELLIPSIS (TERMINAL | HEX)` tail that turns a just-consumed
    /// lo-endpoint token into a `CharRange`.
    fn parse_char_range_tail(&mut self, lo_token: &MetaToken) -> Result<Expression, GrammarError> {
        self.scanner.next(); // consume ELLIPSIS
        let hi_token = self.scanner.next();
        if !matches!(hi_token.kind, MetaTokenKind::Terminal | MetaTokenKind::Hex) {
            return Err(GrammarError::new(
                Some(hi_token.position),
                format!(
                    "expected a terminal or hex literal as range endpoint, found '{}'",
                    hi_token.payload
                ),
            ));
        }
        let lo = token_to_byte(lo_token)?;
        let hi = token_to_byte(&hi_token)?;
        if lo > hi {
            return Err(GrammarError::new(
                Some(lo_token.position),
                format!("char range endpoints out of order: '{}'...'{}'", lo_token.payload, hi_token.payload),
            ));
        }
        Ok(Expression::char_range(lo, hi))
    }

    fn parse_char_class_body(&mut self) -> Result<Expression, GrammarError> {
        let mut inclusive = true;
        if self.scanner.peek().kind == MetaTokenKind::Caret {
            self.scanner.next();
            inclusive = false;
        }

        let mut members = Vec::new();
        loop {
            let kind = self.scanner.peek().kind;
            if !matches!(kind, MetaTokenKind::Terminal | MetaTokenKind::Hex) {
                break;
            }
            let token = self.scanner.next();
            if self.scanner.peek().kind == MetaTokenKind::Ellipsis {
                self.scanner.next();
                let hi_token = self.scanner.next();
                if !matches!(hi_token.kind, MetaTokenKind::Terminal | MetaTokenKind::Hex) {
                    return Err(GrammarError::new(
                        Some(hi_token.position),
                        format!(
                            "expected a terminal or hex literal as range endpoint, found '{}'",
                            hi_token.payload
                        ),
                    ));
                }
                let lo = token_to_byte(&token)?;
                let hi = token_to_byte(&hi_token)?;
                if lo > hi {
                    return Err(GrammarError::new(
                        Some(token.position),
                        format!("char range endpoints out of order: '{}'...'{}'", token.payload, hi_token.payload),
                    ));
                }
                members.push(ClassMember::Range(lo, hi));
            } else {
                members.push(ClassMember::Single(token_to_byte(&token)?));
            }
        }

        if members.is_empty() {
            let at = self.scanner.peek();
            return Err(GrammarError::new(
                Some(at.position),
                "character class must contain at least one member".to_string(),
            ));
        }

        Ok(Expression::char_class(inclusive, members))
    }

    fn expect(&mut self, kind: MetaTokenKind) -> Result<MetaToken, GrammarError> {
        let token = self.scanner.next();
        if token.kind == kind {
            Ok(token)
        } else {
            Err(GrammarError::new(
                Some(token.position),
                format!("unbalanced grammar construct near '{}'", token.payload),
            ))
        }
    }
}

fn starts_repeatable(kind: MetaTokenKind) -> bool {
    matches!(
        kind,
        MetaTokenKind::Terminal
            | MetaTokenKind::Symbol
            | MetaTokenKind::Word
            | MetaTokenKind::Hex
            | MetaTokenKind::LBrace
            | MetaTokenKind::LBracket
            | MetaTokenKind::LParen
    )
}

/// Converts a `TERMINAL` or `HEX` token into the single byte it denotes.
/// A multi-byte terminal used where a single code unit is required is a
/// fatal grammar-shape error (spec'd explicitly, unlike the source it is
/// drawn from, which leaves the case unspecified).
fn token_to_byte(token: &MetaToken) -> Result<u8, GrammarError> {
    match token.kind {
        MetaTokenKind::Terminal => {
            let bytes = token.payload.as_bytes();
            if bytes.len() != 1 {
                return Err(GrammarError::new(
                    Some(token.position),
                    format!("multi-byte terminal '{}' cannot be used as a range endpoint", token.payload),
                ));
            }
            Ok(bytes[0])
        }
        MetaTokenKind::Hex => {
            let digits = &token.payload[2..];
            let value = u32::from_str_radix(digits, 16).map_err(|_| {
                GrammarError::new(Some(token.position), format!("malformed hex literal '{}'", token.payload))
            })?;
            if value > 0xFF {
                return Err(GrammarError::new(
                    Some(token.position),
                    format!("hex literal '{}' exceeds a single byte", token.payload),
                ));
            }
            Ok(value as u8)
        }
        _ => Err(GrammarError::new(
            Some(token.position),
            format!("'{}' is not a valid range endpoint", token.payload),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_single_branch_sequence() {
        let expr = Compiler::compile("'a'").unwrap();
        assert_eq!(expr, Expression::Terminal("a".to_string()));
    }

    #[test]
    fn builds_sequence_of_two() {
        let expr = Compiler::compile("'a' 'b'").unwrap();
        match expr {
            Expression::Sequence(children) => assert_eq!(children.len(), 2),
            other => panic!("expected Sequence, got {:?}", other),
        }
    }

    #[test]
    fn builds_alternative() {
        let expr = Compiler::compile("'a' | 'b' | 'c'").unwrap();
        match expr {
            Expression::Alternative(children) => assert_eq!(children.len(), 3),
            other => panic!("expected Alternative, got {:?}", other),
        }
    }

    #[test]
    fn builds_char_range_from_terminals() {
        let expr = Compiler::compile("'0'...'9'").unwrap();
        assert_eq!(expr, Expression::CharRange(b'0', b'9'));
    }

    #[test]
    fn builds_char_range_from_hex() {
        let expr = Compiler::compile("0x20...0x7E").unwrap();
        assert_eq!(expr, Expression::CharRange(0x20, 0x7e));
    }

    #[test]
    fn multi_byte_range_endpoint_is_fatal() {
        let result = Compiler::compile("'ab'...'z'");
        assert!(result.is_err());
    }

    #[test]
    fn builds_inverted_char_class() {
        let expr = Compiler::compile("( ^ 'a' 'b' )").unwrap();
        match expr {
            Expression::CharClass { inclusive, members } => {
                assert!(!inclusive);
                assert_eq!(members.len(), 2);
            }
            other => panic!("expected CharClass, got {:?}", other),
        }
    }

    #[test]
    fn builds_repeat_and_optional() {
        let expr = Compiler::compile("'a' { 'b' } [ 'c' ]").unwrap();
        match expr {
            Expression::Sequence(children) => {
                assert_eq!(children.len(), 3);
                assert!(matches!(children[1], Expression::Repeat(_)));
                assert!(matches!(children[2], Expression::Optional(_)));
            }
            other => panic!("expected Sequence, got {:?}", other),
        }
    }

    #[test]
    fn unbalanced_brace_is_an_error() {
        assert!(Compiler::compile("{ 'a'").is_err());
    }

    #[test]
    fn bare_word_becomes_terminal() {
        let expr = Compiler::compile("foo").unwrap();
        assert_eq!(expr, Expression::Terminal("foo".to_string()));
    }
}
