//! MENU statements.

use chumsky::prelude::*;

use super::{block, common_options, memory_flags, trailing_flags, ExprParser, MenuItem, Resource};
use crate::rc::expression::string_literal;
use crate::rc::syntax::{comma, identifier, keyword, ParserError};

pub(super) fn menu(expr: ExprParser) -> impl Parser<char, Resource, Error = ParserError> + Clone {
    let items = recursive(|items| {
        let popup = keyword("POPUP")
            .ignore_then(string_literal())
            .then_ignore(trailing_flags(expr.clone()))
            .then(block(items))
            .map(|(caption, children)| MenuItem::Popup { caption, children });
        let separator = keyword("MENUITEM")
            .ignore_then(keyword("SEPARATOR"))
            .to(MenuItem::Separator);
        let leaf = keyword("MENUITEM")
            .ignore_then(string_literal())
            .then_ignore(comma())
            .then(expr.clone())
            .then_ignore(trailing_flags(expr.clone()))
            .map(|(caption, id)| MenuItem::Leaf { id, caption });

        choice((popup, separator, leaf)).repeated()
    });

    identifier()
        .then_ignore(keyword("MENU"))
        .then_ignore(memory_flags())
        .then_ignore(common_options(expr.clone()))
        .then(block(items))
        .map(|(id, items)| Resource::Menu { id, items })
}

#[cfg(test)]
mod tests {
    use super::super::parse_resources;
    use super::*;
    use crate::rc::expression::Expression;
    use rstest::rstest;

    fn leaf(id: &str, caption: &str) -> MenuItem {
        MenuItem::Leaf {
            id: Expression::identifier(id),
            caption: caption.to_string(),
        }
    }

    fn popup(caption: &str, children: Vec<MenuItem>) -> MenuItem {
        MenuItem::Popup {
            caption: caption.to_string(),
            children,
        }
    }

    #[rstest]
    #[case::empty("IDR_MENU0", "", vec![])]
    #[case::popup(
        "IDR_MENU1",
        "POPUP \"&File\" BEGIN\r\nMENUITEM \"A\", ID_1\r\nEND",
        vec![popup("&File", vec![leaf("ID_1", "A")])]
    )]
    #[case::separator(
        "IDR_MENU2",
        "POPUP \"Edit\" BEGIN\r\n  MENUITEM SEPARATOR\r\nEND",
        vec![popup("Edit", vec![MenuItem::Separator])]
    )]
    #[case::top_level_item("IDR_MENU3", "MENUITEM \"B\", ID_2", vec![leaf("ID_2", "B")])]
    #[case::nested(
        "IDR_MENU4",
        "POPUP \"P1\" BEGIN\r\nMENUITEM \"M1\", ID_M1\r\n  POPUP \"P2\" BEGIN\r\n    MENUITEM \"M2\", ID_M2\r\n  END\r\nEND",
        vec![popup("P1", vec![leaf("ID_M1", "M1"), popup("P2", vec![leaf("ID_M2", "M2")])])]
    )]
    #[case::flags(
        "IDR_MENU5",
        "MENUITEM \"&Bold\\tCtrl+B\", ID_BOLD, CHECKED, GRAYED\r\nPOPUP \"More\", HELP BEGIN END",
        vec![leaf("ID_BOLD", "&Bold\tCtrl+B"), popup("More", vec![])]
    )]
    fn parses_menus(#[case] id: &str, #[case] body: &str, #[case] expected: Vec<MenuItem>) {
        let source = format!("{id} MENU\r\nBEGIN\r\n{body}\r\nEND\r\n");
        let expected = Resource::Menu {
            id: id.to_string(),
            items: expected,
        };
        assert_eq!(parse_resources(&source), Ok(vec![expected]));
    }

    #[test]
    fn unterminated_popup_fails() {
        assert!(parse_resources("IDR_M MENU BEGIN POPUP \"x\" BEGIN END").is_err());
    }
}
