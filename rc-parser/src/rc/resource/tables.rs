//! Row-oriented statements: string tables, accelerators, toolbars and the smaller
//! single-line resources.

use chumsky::prelude::*;

use super::{
    block, common_options, memory_flags, trailing_flags, Accelerator, ExprParser,
    FileResourceKind, Resource,
};
use crate::rc::expression::{hex_literal, integer_literal, string_literal, Expression};
use crate::rc::syntax::{comma, identifier, keyword, ParserError};

/// `STRINGTABLE BEGIN id "text" ... END`, one record per row.
pub(super) fn string_table(expr: ExprParser) -> impl Parser<char, Vec<Resource>, Error = ParserError> + Clone {
    let row = identifier()
        .then_ignore(comma().or_not())
        .then(string_literal())
        .map(|(id, text)| Resource::StringResource { id, text });

    keyword("STRINGTABLE")
        .ignore_then(memory_flags())
        .ignore_then(common_options(expr))
        .ignore_then(block(row.repeated()))
}

/// `id ACCELERATORS BEGIN event, id[, flags...] ... END`
pub(super) fn accelerators(expr: ExprParser) -> impl Parser<char, Resource, Error = ParserError> + Clone {
    let row = expr
        .clone()
        .then_ignore(comma())
        .then(identifier())
        .then_ignore(trailing_flags(expr.clone()))
        .map(|(event, id)| Accelerator { event, id });

    identifier()
        .then_ignore(keyword("ACCELERATORS"))
        .then_ignore(memory_flags())
        .then_ignore(common_options(expr))
        .then(block(row.repeated()))
        .map(|(id, entries)| Resource::Accelerators { id, entries })
}

/// `id TOOLBAR w, h BEGIN BUTTON id | SEPARATOR ... END`; separators are dropped.
pub(super) fn toolbar(expr: ExprParser) -> impl Parser<char, Resource, Error = ParserError> + Clone {
    let row = keyword("BUTTON")
        .ignore_then(identifier())
        .map(Some)
        .or(keyword("SEPARATOR").to(None));

    identifier()
        .then_ignore(keyword("TOOLBAR"))
        .then_ignore(memory_flags())
        .then_ignore(expr.clone())
        .then_ignore(comma())
        .then_ignore(expr)
        .then(block(row.repeated()))
        .map(|(id, rows)| Resource::Toolbar {
            id,
            buttons: rows.into_iter().flatten().collect(),
        })
}

/// `1 TEXTINCLUDE BEGIN "line" "line" ... END`
pub(super) fn text_include() -> impl Parser<char, Resource, Error = ParserError> + Clone {
    integer_literal()
        .then_ignore(keyword("TEXTINCLUDE"))
        .then_ignore(memory_flags())
        .then(block(string_literal().repeated()))
        .map(|(id, lines)| Resource::TextInclude {
            id: Expression::integer(id),
            lines,
        })
}

pub(super) fn language(expr: ExprParser) -> impl Parser<char, Resource, Error = ParserError> + Clone {
    keyword("LANGUAGE")
        .ignore_then(expr.clone())
        .then_ignore(comma())
        .then(expr)
        .map(|(language, sublanguage)| Resource::Language {
            language,
            sublanguage,
        })
}

pub(super) fn afx_dialog_layout() -> impl Parser<char, Resource, Error = ParserError> + Clone {
    identifier()
        .then_ignore(keyword("AFX_DIALOG_LAYOUT"))
        .then_ignore(memory_flags())
        .then(block(integer_literal().separated_by(comma()).allow_trailing()))
        .map(|(id, values)| Resource::AfxDialogLayout { id, values })
}

/// Combo-box initial data. Each row is `control, message, length, 0` followed by hex
/// words or strings; the body ends with a lone `0`.
pub(super) fn dlg_init() -> impl Parser<char, Resource, Error = ParserError> + Clone {
    let datum = hex_literal()
        .ignored()
        .or(string_literal().ignored())
        .then_ignore(comma().or_not());
    let row = identifier()
        .then_ignore(comma())
        .then_ignore(integer_literal())
        .then_ignore(comma())
        .then_ignore(integer_literal())
        .then_ignore(comma())
        .then_ignore(integer_literal())
        .then_ignore(comma().or_not())
        .then_ignore(datum.repeated());
    let body = row.repeated().then_ignore(integer_literal()).or_not();

    identifier()
        .then_ignore(keyword("DLGINIT"))
        .then_ignore(memory_flags())
        .then_ignore(block(body))
        .map(|id| Resource::DlgInit { id })
}

/// `id KIND "path"` for every [`FileResourceKind`].
pub(super) fn file_resource() -> impl Parser<char, Resource, Error = ParserError> + Clone {
    let [first, rest @ ..] = FileResourceKind::ALL;
    rest.iter().fold(file_statement(first).boxed(), |parser, kind| {
        parser.or(file_statement(*kind)).boxed()
    })
}

fn file_statement(kind: FileResourceKind) -> impl Parser<char, Resource, Error = ParserError> + Clone {
    identifier()
        .then_ignore(keyword(kind.keyword()))
        .then_ignore(memory_flags())
        .then(string_literal())
        .map(move |(id, filename)| Resource::FileResource { kind, id, filename })
}
