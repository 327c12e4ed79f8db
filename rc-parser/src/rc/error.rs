//! Positioned grammar errors.

use chumsky::error::{Simple, SimpleReason};
use std::fmt;
use std::ops::Range;

use super::position::Position;

/// A failed parse of one of the resource-script grammars.
///
/// Parsing never recovers partially: one error describes why the whole input was
/// rejected, pointing at the furthest position any alternative reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarError {
    /// Which grammar rejected the input (`expression`, `directive`, `resource`).
    pub grammar: &'static str,
    /// Character span of the offending input.
    pub span: Range<usize>,
    pub position: Position,
    /// Sorted, de-duplicated descriptions of what would have been accepted.
    pub expected: Vec<String>,
    /// `None` when the input ended.
    pub found: Option<char>,
    /// Rule label or custom reason, when the failure carries one.
    pub reason: Option<String>,
    pub source_context: String,
}

impl GrammarError {
    pub(crate) fn from_simple(grammar: &'static str, source: &str, errors: Vec<Simple<char>>) -> Self {
        let furthest = errors.into_iter().max_by_key(|e| e.span().start);
        let Some(error) = furthest else {
            return Self::at(grammar, source, 0..0, "input rejected");
        };

        let span = error.span();
        let position = Position::from_char_offset(source, span.start);
        let mut expected: Vec<String> = error
            .expected()
            .map(|token| match token {
                Some(c) => format!("{:?}", c),
                None => "end of input".to_string(),
            })
            .collect();
        expected.sort();
        expected.dedup();

        let reason = match error.reason() {
            SimpleReason::Custom(message) => Some(message.clone()),
            SimpleReason::Unclosed { delimiter, .. } => Some(format!("unclosed {:?}", delimiter)),
            SimpleReason::Unexpected => error.label().map(str::to_string),
        };

        Self {
            grammar,
            source_context: format_source_context(source, position.line),
            span,
            position,
            expected,
            found: error.found().copied(),
            reason,
        }
    }

    pub(crate) fn at(grammar: &'static str, source: &str, span: Range<usize>, reason: &str) -> Self {
        let position = Position::from_char_offset(source, span.start);
        Self {
            grammar,
            source_context: format_source_context(source, position.line),
            span,
            position,
            expected: Vec::new(),
            found: None,
            reason: Some(reason.to_string()),
        }
    }
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error: {} parse failed at {}",
            self.grammar,
            // 1-indexed for humans
            Position::new(self.position.line + 1, self.position.column + 1)
        )?;
        if let Some(reason) = &self.reason {
            write!(f, " ({})", reason)?;
        }
        writeln!(f)?;
        match self.found {
            Some(c) => write!(f, "found {:?}", c)?,
            None => write!(f, "found end of input")?,
        }
        if !self.expected.is_empty() {
            write!(f, ", expected one of: {}", self.expected.join(", "))?;
        }
        writeln!(f)?;
        writeln!(f)?;
        write!(f, "{}", self.source_context)
    }
}

impl std::error::Error for GrammarError {}

/// Excerpt of `source` around the 0-based `error_line`: up to two lines on either side,
/// numbered from 1, with the failing line marked `>>`.
pub fn format_source_context(source: &str, error_line: usize) -> String {
    let first = error_line.saturating_sub(2);
    source
        .lines()
        .enumerate()
        .skip(first)
        .take(error_line + 3 - first)
        .map(|(index, line)| {
            let marker = if index == error_line { ">>" } else { "  " };
            format!("{marker} {:3} | {line}\n", index + 1)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chumsky::Error;

    #[test]
    fn source_context_marks_the_failing_line() {
        let source = "IDD_A DIALOG 0, 0, 1, 1\r\nBEGIN\r\n  LTEXT \"a\", IDC_A\r\n  BOGUS\r\nEND\r\nIDI_X ICON \"x.ico\"\r\nIDI_Y ICON \"y.ico\"";

        let context = format_source_context(source, 3);

        assert_eq!(
            context,
            "     2 | BEGIN\n     3 |   LTEXT \"a\", IDC_A\n>>   4 |   BOGUS\n     5 | END\n     6 | IDI_X ICON \"x.ico\"\n"
        );
    }

    #[test]
    fn source_context_near_the_start() {
        assert_eq!(format_source_context("only\nlines", 0), ">>   1 | only\n     2 | lines\n");
    }

    #[test]
    fn picks_the_furthest_error() {
        let source = "ab\ncd";
        let errors = vec![
            Simple::expected_input_found(0..1, vec![Some('x')], Some('a')),
            Simple::expected_input_found(3..4, vec![Some('y'), None], Some('c')),
        ];

        let error = GrammarError::from_simple("test", source, errors);

        assert_eq!(error.span, 3..4);
        assert_eq!(error.position, Position::new(1, 0));
        assert_eq!(error.found, Some('c'));
        assert_eq!(error.expected, vec!["'y'".to_string(), "end of input".to_string()]);
        assert!(error.to_string().contains("test parse failed at 2:1"));
    }
}
