//! Resource-script grammars and supporting types.

pub mod directive;
pub mod error;
pub mod expression;
pub mod position;
pub mod resource;
pub mod symbols;
pub(crate) mod syntax;
