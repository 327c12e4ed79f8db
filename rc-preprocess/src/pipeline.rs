//! Two-pass selective preprocessing.
//!
//! The first pass runs the preprocessor on the resource script as-is, only to learn
//! which files it includes. Files inside the project are then copied to a scratch
//! directory with their text escaped, and the second pass runs there. What comes back
//! is the project's own text with includes resolved and local macro names untouched.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rc_parser::{integer_defines, parse_directives, parse_resources, strip_directives, GrammarError, Resource};

use crate::encoding::{TextDetector, EncodingDetector};
use crate::error::{PrecompiledParseError, PreprocessError};
use crate::escape::{escape_source, unescape_output, MacroPolicy};
use crate::flavor::{PreprocessorFlavor, ProjectInfo};
use crate::paths::{absolutize, is_inside, relative_inside};
use crate::process::{CancelToken, CommandRunner, Invocation, SystemRunner};

/// Result of [`Precompiler::precompile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precompiled {
    /// Every file the resource script includes, directly or not, in report order.
    pub referenced_files: Vec<PathBuf>,
    /// Decoded text of each project file that was escaped, the resource script last.
    pub local_sources: Vec<LocalSource>,
    /// Project text with includes resolved and directive lines removed.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSource {
    pub path: PathBuf,
    pub text: String,
}

impl Precompiled {
    /// Integer `#define`s of all project files, ambiguous names removed.
    pub fn define_table(&self) -> Result<BTreeMap<String, i32>, GrammarError> {
        let mut directives = Vec::new();
        for source in &self.local_sources {
            directives.extend(parse_directives(&source.text)?);
        }
        Ok(integer_defines(&directives))
    }
}

/// Drives the external preprocessor through both passes.
pub struct Precompiler {
    flavor: PreprocessorFlavor,
    command: Option<String>,
    policy: MacroPolicy,
    runner: Box<dyn CommandRunner>,
    detector: Box<dyn EncodingDetector>,
}

impl Precompiler {
    pub fn new(flavor: PreprocessorFlavor) -> Self {
        Self {
            flavor,
            command: None,
            policy: MacroPolicy::default(),
            runner: Box::new(SystemRunner),
            detector: Box::new(TextDetector::default()),
        }
    }

    /// Run a different program than the flavor's default (`cl` / `gcc`).
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_macro_policy(mut self, policy: MacroPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_runner(mut self, runner: impl CommandRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    pub fn with_detector(mut self, detector: impl EncodingDetector + 'static) -> Self {
        self.detector = Box::new(detector);
        self
    }

    pub fn flavor(&self) -> PreprocessorFlavor {
        self.flavor
    }

    pub fn macro_policy(&self) -> MacroPolicy {
        self.policy
    }

    pub fn command(&self) -> &str {
        self.command
            .as_deref()
            .unwrap_or_else(|| self.flavor.default_command())
    }

    /// First pass only: the files `project.rc_file` includes, as absolute paths.
    #[tracing::instrument(skip_all, fields(rc_file = %project.rc_file.display()))]
    pub fn discover_includes(&self, project: &ProjectInfo, cancel: &CancelToken) -> Result<Vec<PathBuf>, PreprocessError> {
        let layout = ProjectLayout::resolve(project)?;
        self.discover(&layout, project, cancel)
    }

    /// Both passes: precompiled project text plus what was read on the way.
    ///
    /// The scratch directory is removed on every exit path.
    #[tracing::instrument(skip_all, fields(rc_file = %project.rc_file.display(), policy = ?self.policy))]
    pub fn precompile(&self, project: &ProjectInfo, cancel: &CancelToken) -> Result<Precompiled, PreprocessError> {
        let layout = ProjectLayout::resolve(project)?;
        let referenced_files = self.discover(&layout, project, cancel)?;

        let mut local_files: Vec<PathBuf> = referenced_files
            .iter()
            .filter_map(|path| relative_inside(&layout.project_dir, path))
            .filter(|relative| *relative != layout.rc_relative)
            .collect();
        local_files.push(layout.rc_relative.clone());
        tracing::debug!(count = local_files.len(), "escaping project files");

        let scratch = tempfile::Builder::new()
            .prefix("rcscript-")
            .tempdir()
            .map_err(|err| PreprocessError::io(env::temp_dir(), err))?;

        let mut local_sources = Vec::with_capacity(local_files.len());
        for relative in &local_files {
            if cancel.is_cancelled() {
                return Err(PreprocessError::Cancelled);
            }
            let source = layout.project_dir.join(relative);
            let target = scratch.path().join(relative);
            let text = self.escape_file(&source, &target)?;
            local_sources.push(LocalSource { path: source, text });
        }

        let include_paths = self.rebased_include_paths(&layout, project);
        let invocation = self.invocation(scratch.path(), &include_paths, project, &layout.rc_relative);
        let output = self.runner.run(&invocation, cancel)?;
        let text = strip_directives(&unescape_output(&output.stdout, self.policy));

        if let Err(err) = scratch.close() {
            tracing::warn!(error = %err, "failed to remove scratch directory");
        }
        tracing::info!(
            referenced = referenced_files.len(),
            local = local_sources.len(),
            "precompiled resource script"
        );

        Ok(Precompiled {
            referenced_files,
            local_sources,
            text,
        })
    }

    fn discover(&self, layout: &ProjectLayout, project: &ProjectInfo, cancel: &CancelToken) -> Result<Vec<PathBuf>, PreprocessError> {
        if cancel.is_cancelled() {
            return Err(PreprocessError::Cancelled);
        }
        let include_paths: Vec<String> = project
            .include_paths
            .iter()
            .map(|path| path.display().to_string())
            .collect();
        let invocation = self.invocation(&layout.project_dir, &include_paths, project, &layout.rc_relative);
        let output = self.runner.run(&invocation, cancel)?;

        let rc_path = layout.project_dir.join(&layout.rc_relative);
        let mut files: Vec<PathBuf> = Vec::new();
        for path in self.flavor.included_files(&output.stderr, &layout.project_dir) {
            if path == rc_path || files.contains(&path) {
                continue;
            }
            if !path.is_file() {
                tracing::debug!(path = %path.display(), "ignoring note that names no file");
                continue;
            }
            tracing::debug!(path = %path.display(), local = is_inside(&layout.project_dir, &path), "include");
            files.push(path);
        }
        Ok(files)
    }

    /// Decode `source`, escape it, and write it to `target` in the same encoding.
    fn escape_file(&self, source: &Path, target: &Path) -> Result<String, PreprocessError> {
        let bytes = fs::read(source).map_err(|err| PreprocessError::io(source, err))?;
        let decoded = self.detector.decode(&bytes).map_err(|err| PreprocessError::Encoding {
            path: source.to_path_buf(),
            source: err,
        })?;
        let escaped = escape_source(&decoded.text, self.policy);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| PreprocessError::io(parent, err))?;
        }
        fs::write(target, decoded.encoding.encode(&escaped)).map_err(|err| PreprocessError::io(target, err))?;
        tracing::trace!(path = %source.display(), encoding = ?decoded.encoding, "escaped");
        Ok(decoded.text)
    }

    /// Include paths for the second pass, which runs in the scratch directory. Paths
    /// inside the project become scratch-relative; the rest are made absolute. The
    /// original project directory goes last so relative includes that leave the project
    /// still resolve.
    fn rebased_include_paths(&self, layout: &ProjectLayout, project: &ProjectInfo) -> Vec<String> {
        project
            .include_paths
            .iter()
            .map(|path| {
                let absolute = absolutize(&layout.project_dir, path);
                match relative_inside(&layout.project_dir, &absolute) {
                    Some(relative) if relative.as_os_str().is_empty() => ".".to_string(),
                    Some(relative) => relative.display().to_string(),
                    None => absolute.display().to_string(),
                }
            })
            .chain([layout.project_dir.display().to_string()])
            .collect()
    }

    fn invocation(&self, working_dir: &Path, include_paths: &[String], project: &ProjectInfo, rc_file: &Path) -> Invocation {
        Invocation {
            program: self.command().to_string(),
            args: self
                .flavor
                .arguments(include_paths, &project.defines, &rc_file.display().to_string()),
            working_dir: working_dir.to_path_buf(),
            output_encoding: self.flavor.output_encoding(),
        }
    }
}

/// The project directory as an absolute path, and the resource script relative to it.
struct ProjectLayout {
    project_dir: PathBuf,
    rc_relative: PathBuf,
}

impl ProjectLayout {
    fn resolve(project: &ProjectInfo) -> Result<Self, PreprocessError> {
        let cwd = env::current_dir().map_err(|err| PreprocessError::io(".", err))?;
        let project_dir = absolutize(&cwd, &project.project_dir);
        let rc_path = absolutize(&project_dir, &project.rc_file);
        match relative_inside(&project_dir, &rc_path) {
            Some(rc_relative) if !rc_relative.as_os_str().is_empty() => Ok(Self {
                project_dir,
                rc_relative,
            }),
            _ => Err(PreprocessError::RcFileOutsideProject(rc_path)),
        }
    }
}

/// Parse the precompiled text, keeping it alongside the error on failure.
pub fn parse_precompiled(precompiled: &Precompiled) -> Result<Vec<Resource>, PrecompiledParseError> {
    parse_resources(&precompiled.text).map_err(|error| PrecompiledParseError {
        error,
        precompiled_text: precompiled.text.clone(),
    })
}
