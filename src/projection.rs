use std::collections::HashMap;

use crate::parse_tree::ParseTreeNode;

/// Builder that flattens a parse tree into a `symbol -> matched values`
/// table, for callers that want a quick key/value read rather than
/// walking the tree themselves. A boundary consumer of the core, not part
/// of the parse engine itself.
#[derive(Debug, Clone, Default)]
pub struct Projector {
    target_symbols: Option<Vec<String>>,
    include_terminals: bool,
    flatten_repetitions: bool,
}

impl Projector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts extraction to these rule names; `None` (the default)
    /// extracts every named symbol found.
    pub fn target_symbols(mut self, symbols: Vec<String>) -> Self {
        self.target_symbols = Some(symbols);
        self
    }

    /// Whether leaf nodes produced directly by `Terminal`/character
    /// matches (as opposed to `Symbol` expansions) are also collected.
    /// Off by default, since terminal text is usually uninteresting noise
    /// once it has been consumed into a parent symbol's `matched`.
    pub fn include_terminals(mut self, include: bool) -> Self {
        self.include_terminals = include;
        self
    }

    /// When `true`, each iteration of a `<rep>` node contributes its own
    /// entry to the projection. When `false` (the default), a `<rep>`
    /// contributes a single entry: the whole repetition's concatenated
    /// text, attached to its enclosing symbol.
    pub fn flatten_repetitions(mut self, flatten: bool) -> Self {
        self.flatten_repetitions = flatten;
        self
    }

    pub fn project(&self, root: &ParseTreeNode) -> Projection {
        let mut table: HashMap<String, Vec<String>> = HashMap::new();
        self.walk(root, &mut table, None);
        Projection { table }
    }

    fn is_wanted(&self, symbol: &str) -> bool {
        match &self.target_symbols {
            Some(names) => names.iter().any(|n| n == symbol),
            None => true,
        }
    }

    fn is_synthetic(symbol: &str) -> bool {
        matches!(symbol, "<seq>" | "<alt>" | "<opt>" | "<rep>")
    }

    fn is_terminal_text(symbol: &str) -> bool {
        symbol.starts_with('\'') || (!symbol.starts_with('<') && !Self::is_synthetic(symbol))
    }

    /// `owner` is the nearest non-synthetic ancestor symbol, threaded down
    /// so a `<rep>` (in non-flattening mode) can attribute its whole
    /// concatenated match to the named symbol that contains it rather than
    /// to a synthetic tag.
    fn walk(&self, node: &ParseTreeNode, table: &mut HashMap<String, Vec<String>>, owner: Option<&str>) {
        if node.symbol == "<rep>" && !self.flatten_repetitions {
            if let Some(owner_name) = owner {
                if self.is_wanted(owner_name) {
                    table.entry(owner_name.to_string()).or_default().push(node.matched.clone());
                }
            }
        }

        let next_owner = if Self::is_synthetic(&node.symbol) {
            owner.map(|s| s.to_string())
        } else {
            let is_terminal = Self::is_terminal_text(&node.symbol);
            if (!is_terminal || self.include_terminals) && self.is_wanted(&node.symbol) {
                table.entry(node.symbol.clone()).or_default().push(node.matched.clone());
            }
            Some(node.symbol.clone())
        };

        for child in &node.children {
            self.walk(child, table, next_owner.as_deref());
        }
    }
}

/// The result of a [Projector::project] call: a `symbol -> matched values`
/// table in tree-walk order.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    table: HashMap<String, Vec<String>>,
}

impl Projection {
    pub fn has(&self, symbol: &str) -> bool {
        self.table.contains_key(symbol)
    }

    pub fn first(&self, symbol: &str) -> Option<&str> {
        self.table.get(symbol).and_then(|values| values.first()).map(|s| s.as_str())
    }

    pub fn all(&self, symbol: &str) -> &[String] {
        self.table.get(symbol).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn count(&self, symbol: &str) -> usize {
        self.all(symbol).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> ParseTreeNode {
        // <num> ::= <digit> { <digit> }, matched over "123"
        ParseTreeNode::new(
            "<num>",
            "123",
            vec![ParseTreeNode::new(
                "<seq>",
                "123",
                vec![
                    ParseTreeNode::new("<digit>", "1", vec![ParseTreeNode::leaf("'1'", "1")]),
                    ParseTreeNode::new(
                        "<rep>",
                        "23",
                        vec![
                            ParseTreeNode::new("<digit>", "2", vec![ParseTreeNode::leaf("'2'", "2")]),
                            ParseTreeNode::new("<digit>", "3", vec![ParseTreeNode::leaf("'3'", "3")]),
                        ],
                    ),
                ],
            )],
        )
    }

    #[test]
    fn default_projection_collects_named_symbols() {
        let projection = Projector::new().project(&sample_tree());
        assert!(projection.has("<num>"));
        assert_eq!(projection.first("<num>"), Some("123"));
        assert_eq!(projection.count("<digit>"), 3);
    }

    #[test]
    fn excludes_terminal_leaves_by_default() {
        let projection = Projector::new().project(&sample_tree());
        assert!(!projection.has("'1'"));
    }

    #[test]
    fn include_terminals_surfaces_leaf_text() {
        let projection = Projector::new().include_terminals(true).project(&sample_tree());
        assert!(projection.has("'1'"));
    }

    #[test]
    fn target_symbols_restricts_output() {
        let projection = Projector::new()
            .target_symbols(vec!["<digit>".to_string()])
            .project(&sample_tree());
        assert!(!projection.has("<num>"));
        assert_eq!(projection.count("<digit>"), 3);
    }
}
