use std::borrow::Cow;
use std::io;

use ptree::{Style, TreeItem};

/// A concrete-syntax-tree node produced by a successful match.
///
/// `symbol` is the rule name when this node came from expanding a `Symbol`,
/// a synthetic tag (`<seq>`, `<alt>`, `<opt>`, `<rep>`) for a composite
/// expression, or the literal text for a `Terminal`/character match.
/// `matched` is the exact substring of the input this node spans; for
/// composites it always equals the concatenation of its children's
/// `matched` strings (the concatenation law).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTreeNode {
    pub symbol: String,
    pub matched: String,
    pub children: Vec<ParseTreeNode>,
}

impl ParseTreeNode {
    pub fn new(symbol: impl Into<String>, matched: impl Into<String>, children: Vec<ParseTreeNode>) -> Self {
        Self {
            symbol: symbol.into(),
            matched: matched.into(),
            children,
        }
    }

    pub fn leaf(symbol: impl Into<String>, matched: impl Into<String>) -> Self {
        Self::new(symbol, matched, Vec::new())
    }

    /// Pretty-prints this node and its descendants to stdout using `ptree`.
    pub fn print(&self) -> io::Result<()> {
        ptree::print_tree(self)
    }

    /// Renders this node and its descendants to a string.
    pub fn to_tree_string(&self) -> io::Result<String> {
        let mut buf = Vec::new();
        ptree::write_tree(self, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl TreeItem for ParseTreeNode {
    type Child = ParseTreeNode;

    fn write_self<W: io::Write>(&self, f: &mut W, style: &Style) -> io::Result<()> {
        write!(f, "{} {:?}", style.paint(&self.symbol), self.matched)
    }

    fn children(&self) -> Cow<[Self::Child]> {
        Cow::Borrowed(&self.children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_has_no_children() {
        let node = ParseTreeNode::leaf("'a'", "a");
        assert!(node.children.is_empty());
        assert_eq!(node.matched, "a");
    }

    #[test]
    fn to_tree_string_mentions_symbol() {
        let node = ParseTreeNode::new(
            "<num>",
            "12",
            vec![ParseTreeNode::leaf("<digit>", "1"), ParseTreeNode::leaf("<digit>", "2")],
        );
        let rendered = node.to_tree_string().unwrap();
        assert!(rendered.contains("<num>"));
        assert!(rendered.contains("<digit>"));
    }
}
