//! Error taxonomy for preprocessing.

use std::io;
use std::path::PathBuf;

use rc_parser::GrammarError;

/// File bytes that are not recognizable text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("invalid UTF-8 at byte {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("neither UTF-8 (invalid at byte {offset}) nor {fallback}")]
    Undecodable {
        offset: usize,
        fallback: &'static str,
    },

    #[error("invalid UTF-16 text")]
    InvalidUtf16,

    #[error("UTF-16 text has an odd number of bytes")]
    OddLength,

    #[error("NUL byte at offset {offset}; not a text file")]
    Binary { offset: usize },
}

/// Failures running the external preprocessor.
#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    #[error("working directory does not exist: {}", .0.display())]
    MissingWorkingDirectory(PathBuf),

    #[error("command not found: {program}")]
    CommandNotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("failed to run {program}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Exit Code : {code}, Message: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("command was cancelled")]
    Cancelled,
}

/// Everything that can abort [`crate::Precompiler::precompile`].
#[derive(thiserror::Error, Debug)]
pub enum PreprocessError {
    #[error("invalid file or encoding: {}", path.display())]
    Encoding {
        path: PathBuf,
        #[source]
        source: EncodingError,
    },

    #[error(transparent)]
    Process(ProcessError),

    #[error("resource script is not inside the project directory: {}", .0.display())]
    RcFileOutsideProject(PathBuf),

    #[error("i/o error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("preprocessing was cancelled")]
    Cancelled,
}

impl PreprocessError {
    /// Cancellation is an expected outcome, not a failure to report.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            PreprocessError::Cancelled | PreprocessError::Process(ProcessError::Cancelled)
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PreprocessError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<ProcessError> for PreprocessError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Cancelled => PreprocessError::Cancelled,
            other => PreprocessError::Process(other),
        }
    }
}

/// The resource grammar rejected precompiled text. The text is kept so it can be
/// inspected or dumped.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{error}")]
pub struct PrecompiledParseError {
    pub error: GrammarError,
    pub precompiled_text: String,
}
