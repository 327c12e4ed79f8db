//! Lexical building blocks shared by the three grammars.
//!
//! Resource scripts allow whitespace and both comment styles between any two tokens, so
//! most rules are built from [`token`], [`keyword`] or an explicit `padded_by(noise())`.

use chumsky::prelude::*;

/// Type alias for parser error
pub(crate) type ParserError = Simple<char>;

/// `// ...` up to (not including) the line break.
pub(crate) fn line_comment() -> impl Parser<char, String, Error = ParserError> + Clone {
    just("//").ignore_then(none_of("\r\n").repeated().collect::<String>())
}

/// `/* ... */`, possibly spanning lines.
pub(crate) fn block_comment() -> impl Parser<char, String, Error = ParserError> + Clone {
    just("/*")
        .ignore_then(take_until(just("*/")))
        .map(|(body, _)| body.into_iter().collect::<String>())
}

pub(crate) fn comment() -> impl Parser<char, String, Error = ParserError> + Clone {
    line_comment().or(block_comment())
}

/// Any run of whitespace and comments, possibly empty.
pub(crate) fn noise() -> impl Parser<char, (), Error = ParserError> + Clone {
    filter(|c: &char| c.is_whitespace())
        .ignored()
        .or(comment().ignored())
        .repeated()
        .ignored()
}

/// Spaces, tabs and block comments that stay on the current line.
pub(crate) fn inline_noise() -> impl Parser<char, (), Error = ParserError> + Clone {
    one_of(" \t")
        .ignored()
        .or(block_comment().ignored())
        .repeated()
        .ignored()
}

/// A line break, returned verbatim.
pub(crate) fn newline() -> impl Parser<char, &'static str, Error = ParserError> + Clone {
    just("\r\n").or(just("\n")).or(just("\r"))
}

/// A fixed punctuation token surrounded by noise.
pub(crate) fn token(text: &'static str) -> impl Parser<char, (), Error = ParserError> + Clone {
    just(text).padded_by(noise()).ignored()
}

pub(crate) fn comma() -> impl Parser<char, (), Error = ParserError> + Clone {
    token(",")
}

/// A whole-word keyword surrounded by noise; `MENUITEM` never matches `MENU`.
pub(crate) fn keyword(word: &'static str) -> impl Parser<char, (), Error = ParserError> + Clone {
    text::keyword(word).padded_by(noise()).labelled(word)
}

/// `[A-Za-z_][A-Za-z0-9_]*` surrounded by noise.
pub(crate) fn identifier() -> impl Parser<char, String, Error = ParserError> + Clone {
    text::ident().padded_by(noise()).labelled("identifier")
}

/// Zero-width negative lookahead: succeeds without consuming when `pattern` fails here.
pub(crate) fn not_at<P, O>(pattern: P) -> impl Parser<char, (), Error = ParserError> + Clone
where
    P: Parser<char, O, Error = ParserError> + Clone,
{
    pattern
        .rewind()
        .or_not()
        .try_map(|found, span| match found {
            Some(_) => Err(Simple::custom(span, "unexpected token")),
            None => Ok(()),
        })
}

/// Consumes the remainder of the input, padded; used as the final step of every entry point.
pub(crate) fn finish() -> impl Parser<char, (), Error = ParserError> + Clone {
    noise().then_ignore(end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_skips_mixed_comments() {
        let parser = noise().ignore_then(just('x'));
        assert_eq!(parser.parse(" // a\r\n /* b\r\n c */\tx"), Ok('x'));
    }

    #[test]
    fn keyword_requires_a_word_boundary() {
        assert!(keyword("MENU").then_ignore(end()).parse("MENUITEM").is_err());
        assert_eq!(keyword("MENU").then_ignore(end()).parse(" MENU /**/ "), Ok(()));
    }

    #[test]
    fn not_at_consumes_nothing() {
        let parser = not_at(just('#')).ignore_then(just('a'));
        assert_eq!(parser.parse("a"), Ok('a'));
        assert!(parser.parse("#").is_err());
    }

    #[test]
    fn unterminated_block_comment_is_not_a_comment() {
        assert!(comment().parse("/* open").is_err());
    }
}
