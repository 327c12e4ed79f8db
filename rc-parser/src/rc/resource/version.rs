//! VERSIONINFO statements.
//!
//! The seven fixed-info clauses must appear in declaration order. Their values and the
//! string/var blocks are checked for shape only.

use chumsky::prelude::*;

use super::{block, ExprParser, Resource};
use crate::rc::syntax::{comma, identifier, keyword, noise, ParserError};

const FIXED_FIELDS: [&str; 5] = ["FILEFLAGSMASK", "FILEFLAGS", "FILEOS", "FILETYPE", "FILESUBTYPE"];

pub(super) fn version_info(expr: ExprParser) -> impl Parser<char, Resource, Error = ParserError> + Clone {
    let fixed_info = FIXED_FIELDS.iter().fold(
        version_list("FILEVERSION", expr.clone())
            .then_ignore(version_list("PRODUCTVERSION", expr.clone()))
            .boxed(),
        |parser, field| {
            parser
                .then_ignore(keyword(*field).ignore_then(expr.clone()))
                .boxed()
        },
    );

    let string_table = keyword("BLOCK")
        .ignore_then(expr.clone())
        .ignore_then(block(value(expr.clone()).repeated()));
    let string_file_info = keyword("BLOCK")
        .ignore_then(block_name("StringFileInfo"))
        .ignore_then(block(string_table.repeated()));
    let var_file_info = keyword("BLOCK")
        .ignore_then(block_name("VarFileInfo"))
        .ignore_then(block(value(expr).repeated()));

    identifier()
        .then_ignore(keyword("VERSIONINFO"))
        .then_ignore(fixed_info)
        .then_ignore(block(string_file_info.ignored().or(var_file_info.ignored()).repeated()))
        .map(|id| Resource::VersionInfo { id })
}

/// `KEYWORD a, b, c, d`
fn version_list(
    name: &'static str,
    expr: ExprParser,
) -> impl Parser<char, (), Error = ParserError> + Clone {
    keyword(name)
        .ignore_then(expr.clone())
        .then_ignore(comma().ignore_then(expr).repeated())
        .ignored()
}

/// `VALUE key, value[, value...]`
fn value(expr: ExprParser) -> impl Parser<char, (), Error = ParserError> + Clone {
    keyword("VALUE")
        .ignore_then(expr.clone())
        .then_ignore(comma().ignore_then(expr).repeated().at_least(1))
        .ignored()
}

fn block_name(name: &'static str) -> impl Parser<char, (), Error = ParserError> + Clone {
    just('"')
        .ignore_then(just(name))
        .then_ignore(just('"'))
        .padded_by(noise())
        .ignored()
}

#[cfg(test)]
mod tests {
    use super::super::parse_resources;
    use super::*;

    const FIXED_INFO: &str = "FILEVERSION 8,0,4,0\r\n\
                              PRODUCTVERSION 8,0,4,0\r\n\
                              FILEFLAGSMASK 0x3fL\r\n\
                              FILEFLAGS 0x1L\r\n\
                              FILEOS 0x4L\r\n\
                              FILETYPE 0x1L\r\n\
                              FILESUBTYPE 0x0L\r\n";

    fn version(id: &str) -> Resource {
        Resource::VersionInfo { id: id.to_string() }
    }

    #[test]
    fn parses_full_version_info() {
        let source = format!(
            "VS_VERSION_INFO VERSIONINFO\r\n{FIXED_INFO}\
             BEGIN\r\n\
             \x20   BLOCK \"StringFileInfo\"\r\n\
             \x20   BEGIN\r\n\
             \x20       BLOCK \"041103a4\"\r\n\
             \x20       BEGIN\r\n\
             \x20           VALUE \"FileVersion\", \"8.0.4.0\"\r\n\
             \x20           VALUE \"comments\", \"this is comment\"\r\n\
             \x20       END\r\n\
             \x20   END\r\n\
             \x20   BLOCK \"VarFileInfo\"\r\n\
             \x20   BEGIN\r\n\
             \x20       VALUE \"Translation\", 0x411, 932\r\n\
             \x20   END\r\n\
             END\r\n"
        );
        assert_eq!(parse_resources(&source), Ok(vec![version("VS_VERSION_INFO")]));
    }

    #[test]
    fn parses_empty_body() {
        let source = format!("VS_1 VERSIONINFO\r\n{FIXED_INFO}BEGIN\r\nEND\r\n");
        assert_eq!(parse_resources(&source), Ok(vec![version("VS_1")]));
    }

    #[test]
    fn rejects_fixed_info_out_of_order() {
        let source = "VS_2 VERSIONINFO\r\n\
                      FILESUBTYPE 0\r\n\
                      FILETYPE 1\r\n\
                      FILEOS 4\r\n\
                      FILEFLAGS 0x1\r\n\
                      FILEFLAGSMASK 0xFF\r\n\
                      PRODUCTVERSION 9,9,9,9\r\n\
                      FILEVERSION 9,9,9,9\r\n\
                      BEGIN\r\n\
                      END\r\n";
        assert!(parse_resources(source).is_err());
    }

    #[test]
    fn rejects_missing_fixed_field() {
        let source = FIXED_INFO.replace("FILEOS 0x4L\r\n", "");
        let source = format!("VS_3 VERSIONINFO\r\n{source}BEGIN\r\nEND\r\n");
        assert!(parse_resources(&source).is_err());
    }

    #[test]
    fn rejects_unknown_block() {
        let source = format!("VS_4 VERSIONINFO\r\n{FIXED_INFO}BEGIN BLOCK \"Other\" BEGIN END END");
        assert!(parse_resources(&source).is_err());
    }
}
