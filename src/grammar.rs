use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use crate::error::GrammarError;
use crate::meta::Compiler;
use crate::Expression;

/// A single compiled grammar rule: its name (angle brackets included) and
/// the expression tree its right-hand side compiled to.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub expression: Expression,
}

impl Display for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ::= {}", self.name, self.expression)
    }
}

/// An insertion-ordered registry of compiled rules, looked up by exact
/// name. The registry exclusively owns every expression tree it holds;
/// [crate::Expression::Symbol] nodes never embed the rule they name, which
/// is what lets rules reference each other (including themselves) without
/// creating ownership cycles.
#[derive(Debug, Default)]
pub struct Grammar {
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
    /// Human-readable notices accumulated while adding rules, e.g. a
    /// duplicate-name replacement. Informational only; parsing does not
    /// consult this field.
    pub diagnostics: Vec<String>,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule given its full textual form, `NAME ::= RHS`.
    ///
    /// `NAME` may be written bare (`digit`) or bracketed (`<digit>`); bare
    /// names are auto-wrapped. Re-adding an existing name replaces its
    /// expression tree ("last write wins") and appends a diagnostic rather
    /// than silently discarding the previous tree.
    pub fn add(&mut self, rule_text: &str) -> Result<(), GrammarError> {
        let Some(sep) = rule_text.find("::=") else {
            return Err(GrammarError::new(None, "rule text is missing '::='".to_string()));
        };
        let (name_part, rhs_part) = rule_text.split_at(sep);
        let rhs = &rhs_part[3..];

        let trimmed_name = name_part.trim();
        if trimmed_name.is_empty() {
            return Err(GrammarError::new(None, "rule name is empty".to_string()));
        }
        let name = if trimmed_name.starts_with('<') && trimmed_name.ends_with('>') {
            trimmed_name.to_string()
        } else {
            format!("<{}>", trimmed_name)
        };

        let expression = Compiler::compile(rhs.trim())?;
        self.insert(name, expression);
        Ok(())
    }

    /// Inserts an already-compiled rule directly, bypassing the meta-parser.
    pub fn insert(&mut self, name: String, expression: Expression) {
        if let Some(&existing) = self.index.get(&name) {
            self.diagnostics
                .push(format!("rule {} redefined; previous definition replaced", name));
            self.rules[existing].expression = expression;
        } else {
            self.index.insert(name.clone(), self.rules.len());
            self.rules.push(Rule { name, expression });
        }
    }

    /// Exact-name lookup. Callers outside the crate should prefer this over
    /// scanning `rules()` directly.
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.index.get(name).map(|&i| &self.rules[i])
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Renders every rule back to EBNF text, one per line, in insertion
    /// order.
    pub fn describe(&self) -> String {
        self.rules.iter().map(|r| r.to_string()).collect::<Vec<_>>().join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_is_wrapped() {
        let mut g = Grammar::new();
        g.add("digit ::= '0'...'9'").unwrap();
        assert!(g.get("<digit>").is_some());
    }

    #[test]
    fn bracketed_name_is_kept() {
        let mut g = Grammar::new();
        g.add("<digit> ::= '0'...'9'").unwrap();
        assert!(g.get("<digit>").is_some());
    }

    #[test]
    fn duplicate_insertion_replaces_and_notes_it() {
        let mut g = Grammar::new();
        g.add("<a> ::= 'x'").unwrap();
        g.add("<a> ::= 'y'").unwrap();
        assert_eq!(g.len(), 1);
        assert_eq!(g.get("<a>").unwrap().expression, Expression::Terminal("y".to_string()));
        assert_eq!(g.diagnostics.len(), 1);
    }

    #[test]
    fn missing_separator_is_an_error() {
        let mut g = Grammar::new();
        assert!(g.add("digit '0'...'9'").is_err());
    }

    #[test]
    fn describe_round_trips_readable_text() {
        let mut g = Grammar::new();
        g.add("<digit> ::= '0'...'9'").unwrap();
        assert_eq!(g.describe(), "<digit> ::= '0'...'9'");
    }
}
