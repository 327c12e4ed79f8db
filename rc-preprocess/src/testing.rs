//! Test support: an in-process stand-in for `cl /EP /showIncludes /C`.
//!
//! [`EmulatedCl`] understands enough of the C preprocessor to drive the pipeline in
//! tests without a compiler installed: `#include` with `/I` search paths, object-like
//! `#define`/`#undef`, conditional blocks, `#pragma` pass-through and `#error`.
//! Comments are kept and macros are substituted outside comments and strings, with
//! the usual guard against re-expanding a macro inside its own expansion. Include notes
//! go to stderr in `cl`'s `Note: including file:` format.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::TempDir;

use rc_parser::rc::directive::{continues_on_next_line, is_directive_line};
use rc_parser::{parse_expression, BinaryOp, Expression, UnaryOp};

use crate::encoding::{TextDetector, EncodingDetector, TextEncoding};
use crate::error::ProcessError;
use crate::paths::{absolutize, normalize_separators};
use crate::process::{CancelToken, CommandRunner, Invocation, ProcessOutput};

const MAX_INCLUDE_DEPTH: usize = 64;
const PASSIVE_FLAGS: [&str; 4] = ["/EP", "/showIncludes", "/nologo", "/C"];

static DEFINED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"defined\s*(?:\(\s*([A-Za-z_][A-Za-z0-9_]*)\s*\)|([A-Za-z_][A-Za-z0-9_]*))")
        .expect("defined pattern is valid")
});

/// Records every invocation; clones share the record.
#[derive(Debug, Clone, Default)]
pub struct EmulatedCl {
    log: Arc<Mutex<Vec<Invocation>>>,
}

impl EmulatedCl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }
}

impl CommandRunner for EmulatedCl {
    fn run(&self, invocation: &Invocation, cancel: &CancelToken) -> Result<ProcessOutput, ProcessError> {
        if let Ok(mut log) = self.log.lock() {
            log.push(invocation.clone());
        }
        if !invocation.working_dir.is_dir() {
            return Err(ProcessError::MissingWorkingDirectory(invocation.working_dir.clone()));
        }
        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled);
        }

        let mut session = Session::new(&invocation.working_dir);
        let mut rc_file = None;
        for arg in &invocation.args {
            if PASSIVE_FLAGS.contains(&arg.as_str()) {
                continue;
            }
            if let Some(dir) = arg.strip_prefix("/I") {
                let dir = absolutize(&invocation.working_dir, Path::new(&normalize_separators(dir)));
                session.include_dirs.push(dir);
            } else if let Some(define) = arg.strip_prefix("/D") {
                session.define_from_flag(define);
            } else {
                rc_file = Some(arg.as_str());
            }
        }
        let rc_file = rc_file.ok_or_else(|| fatal("cl : Command line error D8003 : missing source filename"))?;

        let path = absolutize(&invocation.working_dir, Path::new(&normalize_separators(rc_file)));
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        session.stderr.push_str(&name);
        session.stderr.push_str("\r\n");
        session.process_file(&path, 0)?;

        Ok(ProcessOutput {
            stdout: session.stdout,
            stderr: session.stderr,
        })
    }
}

fn fatal(message: impl Into<String>) -> ProcessError {
    ProcessError::NonZeroExit {
        code: 2,
        stderr: message.into(),
    }
}

enum Macro {
    Object(String),
    Function,
}

#[derive(Clone, Copy)]
struct Branch {
    parent: bool,
    taken: bool,
    active: bool,
}

struct Session<'a> {
    working_dir: &'a Path,
    include_dirs: Vec<PathBuf>,
    macros: HashMap<String, Macro>,
    stdout: String,
    stderr: String,
}

impl<'a> Session<'a> {
    fn new(working_dir: &'a Path) -> Self {
        Self {
            working_dir,
            include_dirs: Vec::new(),
            macros: HashMap::new(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    fn define_from_flag(&mut self, define: &str) {
        let (name, value) = define.split_once('=').unwrap_or((define, "1"));
        self.macros.insert(name.to_string(), Macro::Object(value.to_string()));
    }

    fn process_file(&mut self, path: &Path, depth: usize) -> Result<(), ProcessError> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(fatal("fatal error C1014: too many include files"));
        }
        let bytes = fs::read(path)
            .map_err(|_| fatal(format!("fatal error C1083: Cannot open source file: '{}'", path.display())))?;
        let text = TextDetector::default()
            .decode(&bytes)
            .map(|decoded| decoded.text)
            .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
        let lines: Vec<&str> = text.split_inclusive('\n').collect();

        let mut branches: Vec<Branch> = Vec::new();
        let mut in_comment = false;
        let mut index = 0;
        while index < lines.len() {
            let line = lines[index];
            index += 1;
            let active = branches.last().map_or(true, |branch| branch.active);

            if !in_comment && is_directive_line(line) {
                let mut logical = trim_ending(line).to_string();
                let mut physical = 1;
                while continues_on_next_line(&logical) && index < lines.len() {
                    logical.pop();
                    logical.push_str(trim_ending(lines[index]));
                    index += 1;
                    physical += 1;
                }
                let emitted = self.directive(&logical, &mut branches, active, path, depth)?;
                if let Some(emitted) = emitted {
                    self.stdout.push_str(&emitted);
                    physical -= 1;
                }
                self.stdout.push_str(&"\n".repeat(physical));
                continue;
            }

            let expanded = self.substitute(line, &mut in_comment, &mut Vec::new());
            if active {
                self.stdout.push_str(&expanded);
            }
        }

        if !branches.is_empty() {
            return Err(fatal(format!(
                "{}: fatal error C1070: mismatched #if/#endif pair",
                path.display()
            )));
        }
        if depth > 0 && !self.stdout.is_empty() && !self.stdout.ends_with('\n') {
            self.stdout.push('\n');
        }
        Ok(())
    }

    /// Apply one logical directive line. Returns text to emit in its place, if any.
    fn directive(
        &mut self,
        logical: &str,
        branches: &mut Vec<Branch>,
        active: bool,
        path: &Path,
        depth: usize,
    ) -> Result<Option<String>, ProcessError> {
        let body = strip_comments(logical.trim_start().trim_start_matches('#')).trim().to_string();
        let word_len = body
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(body.len());
        let (word, args) = body.split_at(word_len);
        let args = args.trim();

        match word {
            "if" | "ifdef" | "ifndef" => {
                let taken = active
                    && match word {
                        "ifdef" => self.macros.contains_key(args),
                        "ifndef" => !self.macros.contains_key(args),
                        _ => self.evaluate(args, path)?,
                    };
                branches.push(Branch {
                    parent: active,
                    taken,
                    active: taken,
                });
            }
            "elif" => {
                let branch = branches.last_mut().ok_or_else(|| unexpected(path, "#elif"))?;
                if branch.taken {
                    branch.active = false;
                } else {
                    branch.active = branch.parent && self.evaluate(args, path)?;
                    branch.taken = branch.active;
                }
            }
            "else" => {
                let branch = branches.last_mut().ok_or_else(|| unexpected(path, "#else"))?;
                branch.active = branch.parent && !branch.taken;
                branch.taken = true;
            }
            "endif" => {
                branches.pop().ok_or_else(|| unexpected(path, "#endif"))?;
            }
            _ if !active => {}
            "include" => self.include(args, path, depth)?,
            "define" => {
                let name_len = args
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(args.len());
                let (name, value) = args.split_at(name_len);
                let definition = if value.starts_with('(') {
                    Macro::Function
                } else {
                    Macro::Object(value.trim().to_string())
                };
                self.macros.insert(name.to_string(), definition);
            }
            "undef" => {
                self.macros.remove(args);
            }
            "pragma" => return Ok(Some(format!("#pragma {}\n", args))),
            "error" => {
                return Err(fatal(format!(
                    "{}: fatal error C1189: #error:  {}",
                    path.display(),
                    args
                )))
            }
            _ => {}
        }
        Ok(None)
    }

    fn include(&mut self, args: &str, from: &Path, depth: usize) -> Result<(), ProcessError> {
        let (name, quoted) = if let Some(rest) = args.strip_prefix('"') {
            (rest.split('"').next().unwrap_or(""), true)
        } else if let Some(rest) = args.strip_prefix('<') {
            (rest.split('>').next().unwrap_or(""), false)
        } else {
            return Err(fatal(format!(
                "{}: fatal error C1083: Cannot open include file: '{}'",
                from.display(),
                args
            )));
        };
        let relative = PathBuf::from(normalize_separators(name));

        let current_dir = from.parent().unwrap_or(self.working_dir).to_path_buf();
        let candidates = quoted
            .then_some(current_dir)
            .into_iter()
            .chain(self.include_dirs.iter().cloned());
        let mut resolved = None;
        for dir in candidates {
            let candidate = absolutize(&dir, &relative);
            if candidate.is_file() {
                resolved = Some(candidate);
                break;
            }
        }
        let resolved = resolved.ok_or_else(|| {
            fatal(format!(
                "{}: fatal error C1083: Cannot open include file: '{}': No such file or directory",
                from.display(),
                name
            ))
        })?;

        self.stderr.push_str(&format!(
            "Note: including file: {}{}\r\n",
            " ".repeat(depth),
            resolved.display()
        ));
        self.process_file(&resolved, depth + 1)
    }

    /// `#if` / `#elif`: `defined`, macro substitution, then the expression grammar.
    fn evaluate(&self, condition: &str, path: &Path) -> Result<bool, ProcessError> {
        let resolved = DEFINED.replace_all(condition, |captures: &regex::Captures<'_>| {
            let name = captures.get(1).or_else(|| captures.get(2)).map_or("", |m| m.as_str());
            if self.macros.contains_key(name) { "1" } else { "0" }
        });
        let expanded = self.substitute(&resolved, &mut false, &mut Vec::new());
        let expression = parse_expression(&expanded).map_err(|_| {
            fatal(format!(
                "{}: fatal error C1017: invalid integer constant expression",
                path.display()
            ))
        })?;
        Ok(value_of(&expression) != 0)
    }

    /// Expand object-like macros in `text`, leaving comments and string literals alone.
    fn substitute(&self, text: &str, in_comment: &mut bool, guard: &mut Vec<String>) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while i < chars.len() {
            let next = chars.get(i + 1).copied();
            if *in_comment {
                if chars[i] == '*' && next == Some('/') {
                    out.push_str("*/");
                    i += 2;
                    *in_comment = false;
                } else {
                    out.push(chars[i]);
                    i += 1;
                }
                continue;
            }
            match chars[i] {
                '/' if next == Some('/') => {
                    out.extend(&chars[i..]);
                    break;
                }
                '/' if next == Some('*') => {
                    out.push_str("/*");
                    i += 2;
                    *in_comment = true;
                }
                '"' => {
                    let start = i;
                    i += 1;
                    while i < chars.len() && chars[i] != '"' && chars[i] != '\n' {
                        i += if chars[i] == '\\' { 2 } else { 1 };
                    }
                    i = (i + 1).min(chars.len());
                    out.extend(&chars[start..i]);
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let start = i;
                    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                        i += 1;
                    }
                    let name: String = chars[start..i].iter().collect();
                    out.push_str(&self.expand(&name, guard));
                }
                c if c.is_ascii_digit() => {
                    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                        out.push(chars[i]);
                        i += 1;
                    }
                }
                c => {
                    out.push(c);
                    i += 1;
                }
            }
        }
        out
    }

    fn expand(&self, name: &str, guard: &mut Vec<String>) -> String {
        match self.macros.get(name) {
            Some(Macro::Object(value)) if !guard.iter().any(|active| active == name) => {
                guard.push(name.to_string());
                let expanded = self.substitute(value, &mut false, guard);
                guard.pop();
                expanded
            }
            _ => name.to_string(),
        }
    }
}

fn unexpected(path: &Path, directive: &str) -> ProcessError {
    fatal(format!("{}: fatal error C1020: unexpected {}", path.display(), directive))
}

fn trim_ending(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// Drop `//` and `/* */` comments from a single logical line.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let line_comment = rest.find("//");
        let block_comment = rest.find("/*");
        match (line_comment, block_comment) {
            (Some(line), block) if block.map_or(true, |block| line < block) => {
                out.push_str(&rest[..line]);
                return out;
            }
            (_, Some(block)) => {
                out.push_str(&rest[..block]);
                out.push(' ');
                match rest[block + 2..].find("*/") {
                    Some(close) => rest = &rest[block + 2 + close + 2..],
                    None => return out,
                }
            }
            _ => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

fn value_of(expression: &Expression) -> i32 {
    match expression {
        Expression::IntegerLiteral { value } => *value,
        Expression::Identifier { .. } | Expression::StringLiteral { .. } => 0,
        Expression::UnaryOperator { op, operand } => {
            let value = value_of(operand);
            match op {
                UnaryOp::Not | UnaryOp::LogicalNot => (value == 0) as i32,
                UnaryOp::Negate => value.wrapping_neg(),
                UnaryOp::Complement => !value,
            }
        }
        Expression::BinaryOperator { op, left, right } => {
            let (l, r) = (value_of(left), value_of(right));
            match op {
                BinaryOp::Or => (l != 0 || r != 0) as i32,
                BinaryOp::And => (l != 0 && r != 0) as i32,
                BinaryOp::BitOr => l | r,
                BinaryOp::BitAnd => l & r,
                BinaryOp::Eq => (l == r) as i32,
                BinaryOp::Ne => (l != r) as i32,
                BinaryOp::Lt => (l < r) as i32,
                BinaryOp::Gt => (l > r) as i32,
                BinaryOp::Le => (l <= r) as i32,
                BinaryOp::Ge => (l >= r) as i32,
                BinaryOp::Add => l.wrapping_add(r),
                BinaryOp::Sub => l.wrapping_sub(r),
                BinaryOp::Mul => l.wrapping_mul(r),
                BinaryOp::Div => l.checked_div(r).unwrap_or(0),
            }
        }
    }
}

/// A scratch project directory populated file by file.
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `text` as UTF-8 to `relative`, creating parent directories.
    pub fn file(&self, relative: &str, text: &str) -> std::io::Result<PathBuf> {
        self.file_encoded(relative, text, TextEncoding::Utf8)
    }

    pub fn file_encoded(&self, relative: &str, text: &str, encoding: TextEncoding) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(normalize_separators(relative));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, encoding.encode(text))?;
        Ok(path)
    }
}
