//! # rcscript
//!
//! Parse Windows resource scripts (`.rc`) with the project's symbolic ids intact.
//!
//! The grammars live in [`parser`] and the two-pass preprocessing in [`preprocess`];
//! [`load`] chains them for the common case:
//!
//!     let project = ProjectInfo::new("app", "app.rc");
//!     let script = rcscript::load(&Precompiler::new(PreprocessorFlavor::Msvc), &project, &CancelToken::new())?;
//!     for dialog in script.dialog_symbols()? { ... }

pub use rc_parser as parser;
pub use rc_preprocess as preprocess;

pub use rc_parser::{
    parse_directives, parse_expression, parse_resources, strip_directives, DialogSymbols, Directive,
    Expression, GrammarError, Resource,
};
pub use rc_preprocess::{
    CancelToken, MacroPolicy, Precompiled, PrecompiledParseError, Precompiler, PreprocessError,
    PreprocessorFlavor, ProjectInfo,
};

/// Why [`load`] produced no resources.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Parse(#[from] PrecompiledParseError),
}

/// A precompiled resource script and the resources parsed from it.
#[derive(Debug, Clone)]
pub struct ResourceScript {
    pub precompiled: Precompiled,
    pub resources: Vec<Resource>,
}

impl ResourceScript {
    /// Dialogs with their control ids resolved through the project's integer defines.
    pub fn dialog_symbols(&self) -> Result<Vec<DialogSymbols>, GrammarError> {
        let defines = self.precompiled.define_table()?;
        Ok(rc_parser::resolve_dialogs(&self.resources, &defines))
    }
}

/// Precompile `project` and parse the result.
#[tracing::instrument(skip_all, fields(rc_file = %project.rc_file.display()))]
pub fn load(precompiler: &Precompiler, project: &ProjectInfo, cancel: &CancelToken) -> Result<ResourceScript, Error> {
    let precompiled = precompiler.precompile(project, cancel)?;
    let resources = rc_preprocess::parse_precompiled(&precompiled)?;
    tracing::info!(resources = resources.len(), "resource script loaded");
    Ok(ResourceScript {
        precompiled,
        resources,
    })
}
