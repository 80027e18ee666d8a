use once_cell::unsync::OnceCell;
use std::fmt::{Display, Formatter};

/// The line and column information at a byte offset into some [Code].
///
/// Both fields are 1-indexed, matching how editors report positions.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A wrapper around the input bytes being parsed, with lazily-computed
/// line-break offsets for translating a byte offset into a [Position].
pub struct Code<'c> {
    pub bytes: &'c [u8],
    line_breaks: OnceCell<Vec<usize>>,
}

impl<'c> From<&'c [u8]> for Code<'c> {
    fn from(value: &'c [u8]) -> Self {
        Code::new(value)
    }
}

impl<'c> From<&'c str> for Code<'c> {
    fn from(value: &'c str) -> Self {
        Code::new(value.as_bytes())
    }
}

impl<'c> Code<'c> {
    pub fn new(bytes: &'c [u8]) -> Self {
        Self {
            bytes,
            line_breaks: OnceCell::new(),
        }
    }

    fn obtain_line_breaks(&self) -> &Vec<usize> {
        self.line_breaks.get_or_init(|| {
            self.bytes
                .iter()
                .enumerate()
                .filter_map(|(index, b)| if *b == b'\n' { Some(index) } else { None })
                .collect()
        })
    }

    /// Translates a byte offset into this code into a 1-indexed line/column [Position].
    pub fn obtain_position(&self, pointer: usize) -> Position {
        let line_breaks = self.obtain_line_breaks();
        let index = match line_breaks.binary_search(&pointer) {
            Ok(index) | Err(index) => index,
        };

        if index == 0 {
            let s = String::from_utf8_lossy(&self.bytes[..pointer.min(self.bytes.len())]);
            Position::new(1, s.chars().count() + 1)
        } else {
            let break_point = line_breaks[index - 1] + 1;
            let end = pointer.min(self.bytes.len()).max(break_point);
            let s = String::from_utf8_lossy(&self.bytes[break_point..end]);
            Position::new(index + 1, s.chars().count() + 1)
        }
    }

    /// Renders the exact substring `[start, end)`, lossily if it does not fall on
    /// UTF-8 boundaries (grammars are expected to be written over ASCII-safe input).
    pub fn slice(&self, start: usize, end: usize) -> String {
        String::from_utf8_lossy(&self.bytes[start..end]).into_owned()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
