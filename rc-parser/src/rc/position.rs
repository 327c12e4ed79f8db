//! Line/column positions for grammar diagnostics.
//!
//! chumsky reports spans as character offsets into the parsed `&str`, not byte offsets,
//! so conversion here walks `chars()`.

use serde::Serialize;
use std::fmt;

/// A 0-based line:column position in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Position of the character at `offset` (counted in chars). Offsets past the end
    /// resolve to the position just after the last character.
    pub fn from_char_offset(source: &str, offset: usize) -> Self {
        let mut line = 0;
        let mut column = 0;
        for ch in source.chars().take(offset) {
            if ch == '\n' {
                line += 1;
                column = 0;
            } else {
                column += 1;
            }
        }
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_lines_and_columns_in_chars() {
        let source = "ab\r\nあいう\nx";
        assert_eq!(Position::from_char_offset(source, 0), Position::new(0, 0));
        assert_eq!(Position::from_char_offset(source, 2), Position::new(0, 2));
        assert_eq!(Position::from_char_offset(source, 6), Position::new(1, 2));
        assert_eq!(Position::from_char_offset(source, 8), Position::new(2, 0));
    }

    #[test]
    fn clamps_past_the_end() {
        assert_eq!(Position::from_char_offset("ab", 10), Position::new(0, 2));
    }

    #[test]
    fn displays_as_line_colon_column() {
        assert_eq!(Position::new(3, 7).to_string(), "3:7");
    }
}
