//! Selective preprocessing of Windows resource scripts.
//!
//! A resource script only makes sense after its `#include`s are resolved, but running
//! the C preprocessor over it also replaces every symbolic id (`IDC_OK`) with its number.
//! [`Precompiler`] runs the preprocessor twice: once to find the included files, and
//! once over copies of the project's own files whose text lines are escaped, so that the
//! resulting text keeps the project's symbols.
//!
//!     let project = ProjectInfo::new("app", "app.rc").with_include_path("res");
//!     let precompiled = Precompiler::new(PreprocessorFlavor::Msvc)
//!         .precompile(&project, &CancelToken::new())?;
//!     let resources = parse_precompiled(&precompiled)?;
//!
//! The preprocessor is reached through [`CommandRunner`]; [`SystemRunner`] spawns the
//! real program and the `test-support` feature adds an in-process emulator.

pub mod encoding;
pub mod error;
pub mod escape;
pub mod flavor;
pub mod paths;
pub mod pipeline;
pub mod process;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use encoding::{DecodedText, EncodingDetector, TextDetector, TextEncoding};
pub use error::{EncodingError, PrecompiledParseError, PreprocessError, ProcessError};
pub use escape::{escape_source, unescape_output, MacroPolicy};
pub use flavor::{PreprocessorFlavor, ProjectInfo, SENTINEL_DEFINES};
pub use pipeline::{parse_precompiled, LocalSource, Precompiled, Precompiler};
pub use process::{CancelToken, CommandRunner, Invocation, ProcessOutput, SystemRunner};
