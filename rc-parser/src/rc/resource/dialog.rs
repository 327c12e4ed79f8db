//! DIALOG / DIALOGEX statements and their control lists.

use chumsky::prelude::*;

use super::{block, memory_flags, ControlIdentity, ControlKind, ExprParser, Resource};
use crate::rc::expression::string_literal;
use crate::rc::syntax::{comma, identifier, keyword, ParserError};

/// `id DIALOG[EX] x, y, w, h[, help]` + optional clauses + control block.
///
/// `max_extra` is the number of numeric fields allowed after the first (3 for DIALOG,
/// 4 for DIALOGEX).
pub(super) fn dialog(
    statement: &'static str,
    max_extra: usize,
    expr: ExprParser,
) -> impl Parser<char, Resource, Error = ParserError> + Clone {
    let geometry = expr
        .clone()
        .then_ignore(comma().ignore_then(expr.clone()).repeated().at_least(3).at_most(max_extra));

    identifier()
        .then_ignore(keyword(statement))
        .then_ignore(memory_flags())
        .then_ignore(geometry)
        .then(optional_clauses(expr.clone()))
        .then(block(control(expr).repeated()))
        .map(|((id, menu), controls)| Resource::Dialog { id, controls, menu })
}

/// The clauses between the dialog header and its body, in any order. Only `MENU`
/// captures anything; a second `MENU` is rejected.
fn optional_clauses(expr: ExprParser) -> impl Parser<char, Option<String>, Error = ParserError> + Clone {
    let clause = choice((
        keyword("CAPTION").ignore_then(string_literal()).to(None),
        keyword("STYLE").ignore_then(expr.clone()).to(None),
        keyword("EXSTYLE").ignore_then(expr.clone()).to(None),
        keyword("MENU").ignore_then(identifier()).map(Some),
        keyword("FONT")
            .ignore_then(expr.clone())
            .then_ignore(comma())
            .then_ignore(expr.clone())
            .then_ignore(comma().ignore_then(expr.clone()).repeated().at_most(3))
            .to(None),
        keyword("CLASS")
            .ignore_then(comma().or_not())
            .ignore_then(expr.clone())
            .to(None),
        keyword("LANGUAGE")
            .ignore_then(expr.clone())
            .then_ignore(comma())
            .then_ignore(expr.clone())
            .to(None),
        keyword("CHARACTERISTICS").ignore_then(expr.clone()).to(None),
        keyword("VERSION").ignore_then(expr).to(None),
    ));

    clause.repeated().try_map(|captures, span| {
        let mut menus = captures.into_iter().flatten();
        let menu = menus.next();
        match menus.next() {
            Some(_) => Err(Simple::custom(span, "dialog declares more than one MENU")),
            None => Ok(menu),
        }
    })
}

/// `, expr` four to six times: position, size and style fields after the id.
fn trailing_fields(expr: ExprParser) -> impl Parser<char, (), Error = ParserError> + Clone {
    comma()
        .ignore_then(expr)
        .repeated()
        .at_least(4)
        .at_most(6)
        .ignored()
}

fn typed_control(
    kind: ControlKind,
    expr: ExprParser,
) -> BoxedParser<'static, char, ControlIdentity, ParserError> {
    let caption = if kind.requires_caption() {
        expr.clone().then_ignore(comma()).ignored().boxed()
    } else {
        empty().boxed()
    };

    keyword(kind.keyword())
        .ignore_then(caption)
        .ignore_then(identifier())
        .then_ignore(trailing_fields(expr))
        .map(move |id| ControlIdentity::Typed { kind, id })
        .boxed()
}

/// `CONTROL caption, id, class, style, x, y, w, h[, exstyle[, help]]`
fn generic_control(expr: ExprParser) -> impl Parser<char, ControlIdentity, Error = ParserError> + Clone {
    keyword("CONTROL")
        .ignore_then(expr.clone())
        .ignore_then(comma())
        .ignore_then(identifier())
        .then_ignore(comma())
        .then(string_literal().or(identifier()))
        .then_ignore(comma())
        .then_ignore(expr.clone())
        .then_ignore(trailing_fields(expr))
        .map(|(id, class_name)| ControlIdentity::Named { class_name, id })
}

pub(super) fn control(expr: ExprParser) -> impl Parser<char, ControlIdentity, Error = ParserError> + Clone {
    ControlKind::ALL
        .iter()
        .fold(generic_control(expr.clone()).boxed(), |parser, kind| {
            parser.or(typed_control(*kind, expr.clone())).boxed()
        })
}
