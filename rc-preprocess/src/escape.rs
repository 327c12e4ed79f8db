//! Hiding project text from the preprocessor.
//!
//! Every physical line of a project file that is not part of a directive gets a marker
//! after its indentation before the second preprocessor pass. Marked lines are pulled back out of the
//! output afterwards, so project text comes through with its macro names intact while
//! the directives still do their work.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use rc_parser::rc::directive::{continues_on_next_line, is_directive_line};

const COMMENT_MARKER: &str = "///== ";
const IDENTIFIER_MARKER: &str = "__rcscript_escaped__ ";

static COMMENT_MARKED: Lazy<Regex> = Lazy::new(|| marked_line(COMMENT_MARKER));
static IDENTIFIER_MARKED: Lazy<Regex> = Lazy::new(|| marked_line(IDENTIFIER_MARKER));

/// `#define NAME` or `#define NAME(params)`, then the rest of the line.
static DEFINE_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([ \t]*#[ \t]*define[ \t]+)([A-Za-z_][A-Za-z0-9_]*)(\([^)]*\))?(.*)$")
        .expect("define head pattern is valid")
});

fn marked_line(marker: &str) -> Regex {
    let pattern = format!(
        r"(?mR)^([ \t]*){} ?([^\r\n]*(?:\r\n|\n|\r)?)",
        regex::escape(marker.trim_end())
    );
    Regex::new(&pattern).expect("marker pattern is valid")
}

/// Which macros may expand inside project text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MacroPolicy {
    /// Project text is commented out during the second pass; nothing expands.
    #[default]
    KeepAll,
    /// Project text is prefixed with an inert identifier and project-local defines are
    /// made self-referential, so only macros from headers outside the project expand.
    /// The preprocessor tokenizes the escaped text, so runs of whitespace inside a line
    /// may come back as single spaces; indentation before the marker is kept.
    ExpandExternal,
}

impl MacroPolicy {
    pub fn marker(&self) -> &'static str {
        match self {
            MacroPolicy::KeepAll => COMMENT_MARKER,
            MacroPolicy::ExpandExternal => IDENTIFIER_MARKER,
        }
    }

    fn marked_line(&self) -> &'static Regex {
        match self {
            MacroPolicy::KeepAll => &COMMENT_MARKED,
            MacroPolicy::ExpandExternal => &IDENTIFIER_MARKED,
        }
    }
}

/// Insert the policy's marker after the indentation of every non-directive line.
///
/// Directive lines and their backslash continuations are left alone, except that under
/// [`MacroPolicy::ExpandExternal`] a `#define` with a value is rewritten to expand to
/// itself; its continuation lines are then emptied.
pub fn escape_source(text: &str, policy: MacroPolicy) -> String {
    let marker = policy.marker();
    let mut escaped = String::with_capacity(text.len() + text.len() / 4);
    let mut continuing = false;
    let mut dropping = false;

    for line in physical_lines(text) {
        let (body, ending) = split_ending(line);
        if continuing {
            continuing = continues_on_next_line(line);
            escaped.push_str(if dropping { ending } else { line });
            dropping &= continuing;
            continue;
        }
        if is_directive_line(line) {
            continuing = continues_on_next_line(line);
            let rewritten = match policy {
                MacroPolicy::KeepAll => None,
                MacroPolicy::ExpandExternal => self_referential_define(body, continuing),
            };
            match rewritten {
                Some(rewritten) => {
                    escaped.push_str(&rewritten);
                    escaped.push_str(ending);
                    dropping = continuing;
                }
                None => escaped.push_str(line),
            }
            continue;
        }
        let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
        escaped.push_str(&line[..indent]);
        escaped.push_str(marker);
        escaped.push_str(&line[indent..]);
    }
    escaped
}

/// Concatenate the marked lines of preprocessor output, markers removed and
/// indentation kept.
pub fn unescape_output(output: &str, policy: MacroPolicy) -> String {
    policy
        .marked_line()
        .captures_iter(output)
        .flat_map(|captures| [captures.get(1), captures.get(2)])
        .flatten()
        .map(|piece| piece.as_str())
        .collect()
}

/// `#define NAME(a, b) value` becomes `#define NAME(a, b) NAME(a, b)`. Defines without
/// a value are left as they are.
fn self_referential_define(body: &str, continuing: bool) -> Option<String> {
    let captures = DEFINE_HEAD.captures(body)?;
    let head = captures.get(1)?.as_str();
    let name = captures.get(2)?.as_str();
    let params = captures.get(3).map(|m| m.as_str());
    let value = captures.get(4).map_or("", |m| m.as_str()).trim();
    if value.is_empty() && !continuing {
        return None;
    }

    let mut rewritten = format!("{}{}", head, name);
    if let Some(params) = params {
        let args: Vec<&str> = params
            .trim_start_matches('(')
            .trim_end_matches(')')
            .split(',')
            .map(str::trim)
            .filter(|param| !param.is_empty())
            .map(|param| match param.strip_suffix("...") {
                Some("") => "__VA_ARGS__",
                Some(named) => named.trim_end(),
                None => param,
            })
            .collect();
        rewritten.push_str(params);
        rewritten.push(' ');
        rewritten.push_str(name);
        rewritten.push('(');
        rewritten.push_str(&args.join(", "));
        rewritten.push(')');
    } else {
        rewritten.push(' ');
        rewritten.push_str(name);
    }
    Some(rewritten)
}

/// Lines with their terminators (`\r\n`, `\n` or `\r`) attached.
fn physical_lines(text: &str) -> impl Iterator<Item = &str> {
    let bytes = text.as_bytes();
    let mut start = 0;
    std::iter::from_fn(move || {
        if start >= bytes.len() {
            return None;
        }
        let mut end = start;
        while end < bytes.len() && bytes[end] != b'\n' && bytes[end] != b'\r' {
            end += 1;
        }
        if end < bytes.len() {
            end += if bytes[end] == b'\r' && bytes.get(end + 1) == Some(&b'\n') { 2 } else { 1 };
        }
        let line = &text[start..end];
        start = end;
        Some(line)
    })
}

fn split_ending(line: &str) -> (&str, &str) {
    let body = line.trim_end_matches(['\r', '\n']);
    (body, &line[body.len()..])
}
