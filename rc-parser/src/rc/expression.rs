//! Expression grammar used by resource statements and directive values.
//!
//! Precedence, loosest first: `||`, `&&`, `|`, `&`, comparisons, `+ -`, `* /`, unary
//! (`NOT ! - ~`), atoms. Equal-precedence chains fold to the left, so `a - b - c` is
//! `(a - b) - c`.

use chumsky::prelude::*;
use serde::Serialize;
use std::fmt;

use super::error::GrammarError;
use super::syntax::{finish, identifier, keyword, noise, not_at, token, ParserError};

/// A parsed expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expression {
    Identifier {
        name: String,
    },
    StringLiteral {
        text: String,
    },
    IntegerLiteral {
        value: i32,
    },
    UnaryOperator {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    BinaryOperator {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn identifier(name: impl Into<String>) -> Self {
        Expression::Identifier { name: name.into() }
    }

    pub fn string(text: impl Into<String>) -> Self {
        Expression::StringLiteral { text: text.into() }
    }

    pub fn integer(value: i32) -> Self {
        Expression::IntegerLiteral { value }
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Expression::UnaryOperator {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Expression::BinaryOperator {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Expression::Identifier { name } => Some(name),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Expression::IntegerLiteral { value } => Some(*value),
            _ => None,
        }
    }
}

/// Renders source text that parses back to the same tree. Nested operators are always
/// parenthesized.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier { name } => write!(f, "{}", name),
            Expression::StringLiteral { text } => {
                f.write_str("\"")?;
                for c in text.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        c if (c as u32) < 0x20 => write!(f, "\\x{:02x}", c as u32)?,
                        c => write!(f, "{}", c)?,
                    }
                }
                f.write_str("\"")
            }
            // Negative values only come from hex literals with the sign bit set.
            Expression::IntegerLiteral { value } if *value < 0 => write!(f, "0x{:X}", *value as u32),
            Expression::IntegerLiteral { value } => write!(f, "{}", value),
            Expression::UnaryOperator { op, operand } => match operand.as_ref() {
                Expression::UnaryOperator { .. } | Expression::BinaryOperator { .. } => {
                    write!(f, "{} ({})", op, operand)
                }
                _ => write!(f, "{} {}", op, operand),
            },
            Expression::BinaryOperator { op, left, right } => {
                write_operand(f, left)?;
                write!(f, " {} ", op)?;
                write_operand(f, right)
            }
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, operand: &Expression) -> fmt::Result {
    match operand {
        Expression::BinaryOperator { .. } | Expression::UnaryOperator { .. } => {
            write!(f, "({})", operand)
        }
        _ => write!(f, "{}", operand),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UnaryOp {
    #[serde(rename = "NOT")]
    Not,
    #[serde(rename = "!")]
    LogicalNot,
    #[serde(rename = "-")]
    Negate,
    #[serde(rename = "~")]
    Complement,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Not => "NOT",
            UnaryOp::LogicalNot => "!",
            UnaryOp::Negate => "-",
            UnaryOp::Complement => "~",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinaryOp {
    #[serde(rename = "||")]
    Or,
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "|")]
    BitOr,
    #[serde(rename = "&")]
    BitAnd,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitAnd => "&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a complete expression; surrounding whitespace and comments are allowed.
pub fn parse_expression(text: &str) -> Result<Expression, GrammarError> {
    expression()
        .then_ignore(finish())
        .parse(text)
        .map_err(|errors| GrammarError::from_simple("expression", text, errors))
}

/// The value of `text` if it is exactly one integer literal (noise allowed around it).
pub fn parse_integer_literal(text: &str) -> Option<i32> {
    noise()
        .ignore_then(integer_literal())
        .then_ignore(finish())
        .parse(text)
        .ok()
}

/// The full expression rule.
pub(crate) fn expression() -> impl Parser<char, Expression, Error = ParserError> + Clone {
    recursive(|expr| {
        let atom = choice((
            identifier().map(Expression::identifier),
            expr.delimited_by(token("("), token(")")),
            integer_literal().map(Expression::integer),
            string_literal().map(Expression::string),
        ))
        .labelled("expression");

        let unary = unary_operator()
            .repeated()
            .then(atom)
            .foldr(Expression::unary)
            .boxed();

        let product = binary_level(unary, choice((op("*", BinaryOp::Mul), op("/", BinaryOp::Div))));
        let sum = binary_level(product, choice((op("+", BinaryOp::Add), op("-", BinaryOp::Sub))));
        let comparison = binary_level(
            sum,
            choice((
                op("==", BinaryOp::Eq),
                op("!=", BinaryOp::Ne),
                op("<=", BinaryOp::Le),
                op(">=", BinaryOp::Ge),
                op("<", BinaryOp::Lt),
                op(">", BinaryOp::Gt),
            )),
        );
        let bit_and = binary_level(comparison, lone_op('&', BinaryOp::BitAnd));
        let bit_or = binary_level(bit_and, lone_op('|', BinaryOp::BitOr));
        let and = binary_level(bit_or, op("&&", BinaryOp::And));
        binary_level(and, op("||", BinaryOp::Or))
    })
}

/// One precedence level: `operand (operator operand)*`, folded left.
fn binary_level<P, Q>(operand: P, operator: Q) -> BoxedParser<'static, char, Expression, ParserError>
where
    P: Parser<char, Expression, Error = ParserError> + Clone + 'static,
    Q: Parser<char, BinaryOp, Error = ParserError> + Clone + 'static,
{
    operand
        .clone()
        .then(operator.then(operand).repeated())
        .foldl(|left, (op, right)| Expression::binary(op, left, right))
        .boxed()
}

fn op(text: &'static str, op: BinaryOp) -> impl Parser<char, BinaryOp, Error = ParserError> + Clone {
    just(text).padded_by(noise()).to(op)
}

/// A one-character operator that must not be the first half of its doubled form.
fn lone_op(c: char, op: BinaryOp) -> impl Parser<char, BinaryOp, Error = ParserError> + Clone {
    just(c)
        .then_ignore(not_at(just(c)))
        .padded_by(noise())
        .to(op)
}

fn unary_operator() -> impl Parser<char, UnaryOp, Error = ParserError> + Clone {
    choice((
        keyword("NOT").to(UnaryOp::Not),
        just('!').padded_by(noise()).to(UnaryOp::LogicalNot),
        just('-').padded_by(noise()).to(UnaryOp::Negate),
        just('~').padded_by(noise()).to(UnaryOp::Complement),
    ))
}

/// `0x`-prefixed hexadecimal digits, without suffix or padding. Values above
/// `0x7FFFFFFF` wrap to negative, as resource compilers read them.
fn hex_digits() -> impl Parser<char, i32, Error = ParserError> + Clone {
    just('0')
        .ignore_then(one_of("xX"))
        .ignore_then(
            filter(|c: &char| c.is_ascii_hexdigit())
                .repeated()
                .at_least(1)
                .collect::<String>(),
        )
        .try_map(|digits, span| {
            u32::from_str_radix(&digits, 16)
                .map(|value| value as i32)
                .map_err(|_| Simple::custom(span, "hex literal does not fit in 32 bits"))
        })
}

fn decimal_digits() -> impl Parser<char, i32, Error = ParserError> + Clone {
    filter(|c: &char| c.is_ascii_digit())
        .repeated()
        .at_least(1)
        .collect::<String>()
        .try_map(|digits, span| {
            digits
                .parse::<i32>()
                .map_err(|_| Simple::custom(span, "decimal literal does not fit in a signed 32-bit integer"))
        })
}

/// Decimal or hex integer with an optional `L` suffix, padded.
pub(crate) fn integer_literal() -> impl Parser<char, i32, Error = ParserError> + Clone {
    hex_digits()
        .or(decimal_digits())
        .then_ignore(one_of("Ll").or_not())
        .padded_by(noise())
        .labelled("integer literal")
}

/// Hex-only integer literal, padded. DLGINIT data words are always written in hex.
pub(crate) fn hex_literal() -> impl Parser<char, i32, Error = ParserError> + Clone {
    hex_digits()
        .then_ignore(one_of("Ll").or_not())
        .padded_by(noise())
        .labelled("hex literal")
}

/// A `"..."` literal, decoded. `""` inside the literal is one quote.
pub(crate) fn string_literal() -> impl Parser<char, String, Error = ParserError> + Clone {
    let octal = filter(|c: &char| c.is_digit(8))
        .repeated()
        .at_least(1)
        .at_most(3)
        .collect::<String>()
        .try_map(|digits, span| {
            u32::from_str_radix(&digits, 8)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| Simple::custom(span, "invalid octal escape"))
        });
    let hex = just('x')
        .ignore_then(
            filter(|c: &char| c.is_ascii_hexdigit())
                .repeated()
                .at_least(1)
                .at_most(2)
                .collect::<String>(),
        )
        .try_map(|digits, span| {
            u32::from_str_radix(&digits, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| Simple::custom(span, "invalid hex escape"))
        });
    let escape = just('\\').ignore_then(choice((
        just('n').to('\n'),
        just('t').to('\t'),
        just('r').to('\r'),
        just('a').to('\u{7}'),
        just('b').to('\u{8}'),
        just('f').to('\u{c}'),
        just('v').to('\u{b}'),
        hex,
        octal,
        any(),
    )));
    let doubled_quote = just("\"\"").to('"');

    choice((escape, doubled_quote, none_of("\"\\")))
        .repeated()
        .collect::<String>()
        .delimited_by(just('"'), just('"'))
        .padded_by(noise())
        .labelled("string literal")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use proptest::prelude::any;
    use rstest::rstest;

    fn ident(name: &str) -> Expression {
        Expression::identifier(name)
    }

    #[rstest]
    #[case::empty(r#""""#, "")]
    #[case::backslash(r#""\\""#, "\\")]
    #[case::newline(r#""\n""#, "\n")]
    #[case::tab(r#""\t""#, "\t")]
    #[case::escaped_quote(r#""\"""#, "\"")]
    #[case::doubled_quote(r#""""""#, "\"")]
    #[case::doubled_inside(r#""say ""hi""""#, "say \"hi\"")]
    #[case::octal_nul(r#""B\0""#, "B\0")]
    #[case::octal_three(r#""\101\000""#, "A\0")]
    #[case::hex_escape(r#""\x41b""#, "Ab")]
    #[case::multibyte("\"日本語\"", "日本語")]
    fn decodes_string_literals(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(parse_expression(source), Ok(Expression::string(expected)));
    }

    #[rstest]
    #[case("0", 0)]
    #[case("999", 999)]
    #[case("0xFF", 255)]
    #[case("0xff", 255)]
    #[case("0XaA", 170)]
    #[case("0x0010", 16)]
    #[case("1L", 1)]
    #[case("0x80000000L", i32::MIN)]
    #[case("0xFFFFFFFF", -1)]
    #[case("007", 7)]
    #[case("2147483647", i32::MAX)]
    #[case("2147483647L", i32::MAX)]
    fn parses_integer_literals(#[case] source: &str, #[case] expected: i32) {
        assert_eq!(parse_expression(source), Ok(Expression::integer(expected)));
    }

    #[rstest]
    #[case::hex_over_32_bits("0x100000000")]
    #[case::decimal_over_u32("4294967296")]
    #[case::decimal_over_i32("2147483648")]
    #[case::decimal_in_u32_range("3000000000")]
    fn rejects_oversized_literals(#[case] source: &str) {
        assert!(parse_expression(source).is_err());
    }

    #[test]
    fn oversized_defines_are_not_integers() {
        assert_eq!(parse_integer_literal("2147483648"), None);
        assert_eq!(parse_integer_literal("0xFFFFFFFF"), Some(-1));
    }

    #[test]
    fn equal_precedence_folds_left() {
        let expected = Expression::binary(
            BinaryOp::Sub,
            Expression::binary(BinaryOp::Sub, ident("a"), ident("b")),
            ident("c"),
        );
        assert_eq!(parse_expression("a - b - c"), Ok(expected));
    }

    #[test]
    fn bit_or_binds_looser_than_bit_and() {
        let expected = Expression::binary(
            BinaryOp::BitOr,
            ident("v1"),
            Expression::binary(BinaryOp::BitAnd, ident("v2"), ident("v3")),
        );
        assert_eq!(parse_expression("v1 | v2 & v3"), Ok(expected));
    }

    #[test]
    fn logical_operators_are_not_split_into_bitwise_ones() {
        let expected = Expression::binary(
            BinaryOp::Or,
            ident("a"),
            Expression::binary(BinaryOp::And, ident("b"), ident("c")),
        );
        assert_eq!(parse_expression("a || b && c"), Ok(expected));
    }

    #[test]
    fn comparison_prefers_two_character_operators() {
        let expected = Expression::binary(BinaryOp::Le, ident("a"), Expression::integer(3));
        assert_eq!(parse_expression("a <= 3"), Ok(expected));
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expected = Expression::binary(
            BinaryOp::Add,
            Expression::integer(1),
            Expression::binary(BinaryOp::Mul, Expression::integer(2), Expression::integer(3)),
        );
        assert_eq!(parse_expression("1 + 2 * 3"), Ok(expected));
    }

    #[rstest]
    #[case("NOT ENABLE", UnaryOp::Not, ident("ENABLE"))]
    #[case("-999", UnaryOp::Negate, Expression::integer(999))]
    #[case("~WS_BORDER", UnaryOp::Complement, ident("WS_BORDER"))]
    #[case("!flag", UnaryOp::LogicalNot, ident("flag"))]
    fn parses_unary_operators(#[case] source: &str, #[case] op: UnaryOp, #[case] operand: Expression) {
        assert_eq!(parse_expression(source), Ok(Expression::unary(op, operand)));
    }

    #[test]
    fn not_binds_tighter_than_bit_or() {
        let expected = Expression::binary(
            BinaryOp::BitOr,
            Expression::unary(UnaryOp::Not, ident("WS_VISIBLE")),
            ident("WS_TABSTOP"),
        );
        assert_eq!(parse_expression("NOT WS_VISIBLE | WS_TABSTOP"), Ok(expected));
    }

    #[test]
    fn not_prefix_of_identifier_stays_identifier() {
        assert_eq!(parse_expression("NOTHING"), Ok(ident("NOTHING")));
    }

    #[test]
    fn parentheses_override_precedence() {
        let expected = Expression::binary(
            BinaryOp::Mul,
            Expression::binary(BinaryOp::Add, ident("a"), ident("b")),
            ident("c"),
        );
        assert_eq!(parse_expression("(a + b) * c"), Ok(expected));
    }

    #[test]
    fn comments_are_allowed_between_tokens() {
        let expected = Expression::binary(BinaryOp::BitOr, ident("v1"), ident("v2"));
        assert_eq!(
            parse_expression(" /* lead */ v1 // trailing\r\n | /* mid\r\n */ v2 // end"),
            Ok(expected)
        );
    }

    #[test]
    fn reports_position_of_failure() {
        let error = parse_expression("a +\n  )").unwrap_err();
        assert_eq!(error.grammar, "expression");
        assert_eq!(error.position.line, 1);
        assert_eq!(error.found, Some(')'));
    }

    #[test]
    fn renders_parsable_text() {
        let tree = parse_expression("NOT a | (b - c) - 0xFFFFFFFF").unwrap();
        assert_eq!(parse_expression(&tree.to_string()), Ok(tree));
    }

    fn arb_expression() -> impl Strategy<Value = Expression> {
        let leaf = prop_oneof![
            "[a-z_][a-z0-9_]{0,6}".prop_map(Expression::identifier),
            any::<i32>().prop_map(Expression::integer),
            "[ -~\n\t]{0,8}".prop_map(Expression::string),
        ];
        let unary_ops = prop_oneof![
            Just(UnaryOp::Not),
            Just(UnaryOp::LogicalNot),
            Just(UnaryOp::Negate),
            Just(UnaryOp::Complement),
        ];
        let binary_ops = prop_oneof![
            Just(BinaryOp::Or),
            Just(BinaryOp::And),
            Just(BinaryOp::BitOr),
            Just(BinaryOp::BitAnd),
            Just(BinaryOp::Eq),
            Just(BinaryOp::Ne),
            Just(BinaryOp::Lt),
            Just(BinaryOp::Gt),
            Just(BinaryOp::Le),
            Just(BinaryOp::Ge),
            Just(BinaryOp::Add),
            Just(BinaryOp::Sub),
            Just(BinaryOp::Mul),
            Just(BinaryOp::Div),
        ];
        leaf.prop_recursive(4, 24, 2, move |inner| {
            prop_oneof![
                (unary_ops.clone(), inner.clone()).prop_map(|(op, e)| Expression::unary(op, e)),
                (binary_ops.clone(), inner.clone(), inner)
                    .prop_map(|(op, l, r)| Expression::binary(op, l, r)),
            ]
        })
    }

    proptest! {
        #[test]
        fn rendered_expressions_round_trip(tree in arb_expression()) {
            prop_assert_eq!(parse_expression(&tree.to_string()), Ok(tree));
        }
    }
}
