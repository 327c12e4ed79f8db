//! Preprocessor directive grammar.
//!
//! A document is a flat list of [`Directive`]s: `#define`, `#include`, any other `#`
//! line, and the text between them. Whitespace and comments between items are dropped;
//! comments inside a text block or an unrecognized directive collapse to one space.
//!
//! [`strip_directives`] is the regex-based counterpart used on preprocessor output.

use chumsky::prelude::*;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::error::GrammarError;
use super::syntax::{
    block_comment, comment, inline_noise, line_comment, newline, noise, not_at, ParserError,
};

/// A directive line, including backslash-continued lines and its trailing line break.
static DIRECTIVE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mR)^[\t ]*#(?:\\(?:\r\n|\n|\r)|[^\r\n])*(?:\r\n|\n|\r)?")
        .expect("directive line pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directive {
    /// `#define NAME value`; `value` is the raw line tail with continuations spliced out.
    Define { name: String, value: String },
    /// `#include "file"` or `#include <file>`, delimiters kept.
    Include { path: String },
    /// Any other directive, text after `#`.
    OtherDirective { text: String },
    TextBlock { text: String },
}

impl Directive {
    pub fn define(name: impl Into<String>, value: impl Into<String>) -> Self {
        Directive::Define {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn include(path: impl Into<String>) -> Self {
        Directive::Include { path: path.into() }
    }

    pub fn other(text: impl Into<String>) -> Self {
        Directive::OtherDirective { text: text.into() }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Directive::TextBlock { text: text.into() }
    }
}

/// Split `text` into directives and text blocks, in source order.
pub fn parse_directives(text: &str) -> Result<Vec<Directive>, GrammarError> {
    document()
        .parse(text)
        .map_err(|errors| GrammarError::from_simple("directive", text, errors))
}

/// Remove every directive line (with its continuations and line break) from `text`.
pub fn strip_directives(text: &str) -> String {
    DIRECTIVE_LINE.replace_all(text, "").into_owned()
}

/// True when `line` starts a directive: optional spaces/tabs, then `#`.
pub fn is_directive_line(line: &str) -> bool {
    line.trim_start_matches([' ', '\t']).starts_with('#')
}

/// True when `line` ends in a backslash before its line break.
pub fn continues_on_next_line(line: &str) -> bool {
    line.trim_end_matches(['\r', '\n']).ends_with('\\')
}

fn document() -> impl Parser<char, Vec<Directive>, Error = ParserError> + Clone {
    let item = choice((define(), include(), other_directive(), text_block()));

    noise()
        .ignore_then(item.then_ignore(noise()).repeated())
        .then_ignore(end())
}

fn directive_start() -> impl Parser<char, (), Error = ParserError> + Clone {
    one_of(" \t").repeated().then(just('#')).ignored()
}

/// `#` followed by the directive word.
fn directive_word(word: &'static str) -> impl Parser<char, (), Error = ParserError> + Clone {
    directive_start()
        .ignore_then(inline_noise())
        .ignore_then(text::keyword(word))
        .ignore_then(inline_noise())
}

/// Backslash + line break, spliced away.
fn continuation() -> impl Parser<char, (), Error = ParserError> + Clone {
    just('\\').then(newline()).ignored()
}

fn define() -> impl Parser<char, Directive, Error = ParserError> + Clone {
    let value = continuation()
        .to(None)
        .or(none_of("\r\n").map(Some))
        .repeated()
        .map(|chars| chars.into_iter().flatten().collect::<String>());

    directive_word("define")
        .ignore_then(text::ident())
        .then_ignore(inline_noise())
        .then(value)
        .then_ignore(newline().or_not())
        .map(|(name, value)| Directive::Define { name, value })
}

fn include() -> impl Parser<char, Directive, Error = ParserError> + Clone {
    let quoted = just('"')
        .chain(none_of("\"\r\n").repeated())
        .chain(just('"'));
    let angled = just('<')
        .chain(none_of(">\r\n").repeated())
        .chain(just('>'));

    directive_word("include")
        .ignore_then(quoted.or(angled).collect::<String>())
        .then_ignore(inline_noise())
        .then_ignore(line_comment().or_not())
        .then_ignore(newline().or_not())
        .map(|path| Directive::Include { path })
}

fn other_directive() -> impl Parser<char, Directive, Error = ParserError> + Clone {
    let piece = choice((
        block_comment().to(Some(' ')),
        continuation().to(None),
        just('/').then_ignore(not_at(just('/'))).map(Some),
        none_of("\r\n/").map(Some),
    ));

    directive_start()
        .ignore_then(inline_noise())
        .ignore_then(piece.repeated())
        .then_ignore(line_comment().or_not())
        .then_ignore(newline().or_not())
        .map(|chars| Directive::OtherDirective {
            text: chars.into_iter().flatten().collect(),
        })
}

/// Consecutive non-directive lines. Comments become a single space.
fn text_block() -> impl Parser<char, Directive, Error = ParserError> + Clone {
    let piece = comment().to(' ').or(none_of("\r\n"));
    let filled_line = piece
        .repeated()
        .at_least(1)
        .collect::<String>()
        .then(newline().or_not())
        .map(|(mut line, line_break)| {
            if let Some(line_break) = line_break {
                line.push_str(line_break);
            }
            line
        });
    let line = not_at(directive_start()).ignore_then(filled_line.or(newline().map(str::to_string)));

    line.repeated()
        .at_least(1)
        .map(|lines| Directive::TextBlock {
            text: lines.concat(),
        })
}
