//! Grammars for Windows resource scripts.
//!
//! Three layered grammars live under [`rc`]:
//!
//! - [`rc::expression`] parses the embedded expression language (`WS_CHILD | WS_VISIBLE`,
//!   `"caption"`, `0x0010L`).
//! - [`rc::directive`] splits text into `#define`, `#include`, other directives and plain
//!   text blocks, and provides the line-anchored directive stripper.
//! - [`rc::resource`] parses the resource statements themselves (dialogs, menus, string
//!   tables, version info, ...).
//!
//! All three are chumsky combinators over `char` input. Failures are reported as a
//! [`rc::error::GrammarError`] carrying the position and a rendered source excerpt.

pub mod rc;

pub use rc::directive::{parse_directives, strip_directives, Directive};
pub use rc::error::GrammarError;
pub use rc::expression::{parse_expression, BinaryOp, Expression, UnaryOp};
pub use rc::resource::{
    parse_resources, ControlIdentity, ControlKind, FileResourceKind, MenuItem, Resource,
};
pub use rc::symbols::{integer_defines, resolve_dialogs, DialogSymbols, ResolvedControl};
