//! Shared configuration loader for rcscript.
//!
//! `defaults/rcscript.default.toml` is embedded so the documented defaults and runtime
//! behavior stay in sync. Callers layer user files and command-line overrides on top via
//! [`Loader`] before deserializing into [`RcConfig`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use rc_preprocess::{MacroPolicy, Precompiler, PreprocessorFlavor, ProjectInfo, TextDetector};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_TOML: &str = include_str!("../defaults/rcscript.default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct RcConfig {
    pub preprocessor: PreprocessorConfig,
    pub project: ProjectConfig,
    pub output: OutputConfig,
}

/// Which preprocessor to run and what it may expand.
#[derive(Debug, Clone, Deserialize)]
pub struct PreprocessorConfig {
    pub flavor: PreprocessorFlavor,
    pub command: Option<String>,
    pub macro_policy: MacroPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    pub root: PathBuf,
    pub rc_file: Option<PathBuf>,
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
    #[serde(default)]
    pub defines: Vec<String>,
    pub fallback_encoding: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub dump_on_error: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Json,
    Yaml,
    Debug,
}

impl RcConfig {
    /// Pipeline input for the configured project, once a resource script is known.
    pub fn project_info(&self) -> Option<ProjectInfo> {
        let rc_file = self.project.rc_file.as_ref()?;
        Some(ProjectInfo {
            project_dir: self.project.root.clone(),
            rc_file: rc_file.clone(),
            include_paths: self.project.include_paths.clone(),
            defines: self.project.defines.clone(),
        })
    }

    /// How project files are decoded.
    pub fn detector(&self) -> Result<TextDetector, ConfigError> {
        let label = &self.project.fallback_encoding;
        TextDetector::for_label(label)
            .ok_or_else(|| ConfigError::Message(format!("unknown fallback encoding: {label}")))
    }

    /// A precompiler set up from the `[preprocessor]` table, running real processes.
    pub fn precompiler(&self) -> Result<Precompiler, ConfigError> {
        let precompiler = Precompiler::new(self.preprocessor.flavor)
            .with_macro_policy(self.preprocessor.macro_policy)
            .with_detector(self.detector()?);
        Ok(match &self.preprocessor.command {
            Some(command) => precompiler.with_command(command.clone()),
            None => precompiler,
        })
    }
}

/// Stacks configuration sources over the embedded defaults; later layers win.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    pub fn new() -> Self {
        let defaults = File::from_str(DEFAULT_TOML, FileFormat::Toml);
        Self {
            builder: Config::builder().add_source(defaults),
        }
    }

    /// Add a TOML file that must exist.
    pub fn with_file(self, path: impl AsRef<Path>) -> Self {
        self.layer(path.as_ref(), true)
    }

    /// Add a TOML file if it exists, e.g. `rcscript.toml` in the working directory.
    pub fn with_optional_file(self, path: impl AsRef<Path>) -> Self {
        self.layer(path.as_ref(), false)
    }

    fn layer(mut self, path: &Path, required: bool) -> Self {
        let file = File::from(path).format(FileFormat::Toml).required(required);
        self.builder = self.builder.add_source(file);
        self
    }

    /// Override one dotted key such as `preprocessor.flavor`.
    pub fn set_override<V: Into<ValueKind>>(mut self, key: &str, value: V) -> Result<Self, ConfigError> {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<RcConfig, ConfigError> {
        let merged = self.builder.build()?;
        merged.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// The embedded defaults alone.
pub fn load_defaults() -> Result<RcConfig, ConfigError> {
    Loader::new().build()
}
