//! Command lines and include notes of the supported preprocessors.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::encoding::TextEncoding;
use crate::paths::{absolutize, normalize_separators};

/// Defines passed on every invocation, marking resource-compiler mode.
pub const SENTINEL_DEFINES: [&str; 2] = ["RC_INVOKED", "WINAPI_PARTITION_DESKTOP=0"];

/// `Note: including file:  C:\path\resource.h` (text before the path is localized)
static MSVC_NOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[^:\r\n]*:[^:\r\n]*:[\t ]*(.*)$").expect("msvc note pattern is valid"));

/// `. resource.h`, `.. nested.h`
static GCC_NOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\.+ (.*)$").expect("gcc note pattern is valid"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreprocessorFlavor {
    #[default]
    Msvc,
    Gcc,
}

impl PreprocessorFlavor {
    pub fn default_command(&self) -> &'static str {
        match self {
            PreprocessorFlavor::Msvc => "cl",
            PreprocessorFlavor::Gcc => "gcc",
        }
    }

    /// Arguments that preprocess `rc_file` to stdout and trace includes on stderr.
    pub fn arguments(&self, include_paths: &[String], defines: &[String], rc_file: &str) -> Vec<String> {
        let defines = defines
            .iter()
            .map(String::as_str)
            .chain(SENTINEL_DEFINES);
        match self {
            PreprocessorFlavor::Msvc => include_paths
                .iter()
                .map(|path| format!("/I{}", path))
                .chain(defines.map(|define| format!("/D{}", define)))
                .chain(["/EP", "/showIncludes", "/nologo", "/C"].map(String::from))
                .chain([rc_file.to_string()])
                .collect(),
            PreprocessorFlavor::Gcc => ["-H", "-P", "-nostdinc", "-C"]
                .map(String::from)
                .into_iter()
                .chain(defines.map(|define| format!("-D{}", define)))
                .chain(include_paths.iter().map(|path| format!("-I{}", path)))
                .chain(["-E", "-x", "c-header"].map(String::from))
                .chain([rc_file.to_string()])
                .collect(),
        }
    }

    /// Encoding to decode the preprocessed text with.
    pub fn output_encoding(&self) -> Option<TextEncoding> {
        match self {
            PreprocessorFlavor::Msvc => Some(TextEncoding::Utf8),
            PreprocessorFlavor::Gcc => None,
        }
    }

    /// Absolute, normalized paths of the files named by include notes in `diagnostics`,
    /// in report order. Relative paths are taken against `working_dir`.
    pub fn included_files(&self, diagnostics: &str, working_dir: &Path) -> Vec<PathBuf> {
        let pattern = match self {
            PreprocessorFlavor::Msvc => &*MSVC_NOTE,
            PreprocessorFlavor::Gcc => &*GCC_NOTE,
        };
        pattern
            .captures_iter(diagnostics)
            .filter_map(|captures| captures.get(1))
            .map(|path| path.as_str().replace('\r', ""))
            .map(|path| path.trim_end().to_string())
            .filter(|path| !path.is_empty())
            .map(|path| absolutize(working_dir, Path::new(&normalize_separators(&path))))
            .collect()
    }
}

/// Where the resource script lives and how to preprocess it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub project_dir: PathBuf,
    /// Relative to `project_dir`, or absolute inside it.
    pub rc_file: PathBuf,
    pub include_paths: Vec<PathBuf>,
    /// `NAME` or `NAME=VALUE`.
    pub defines: Vec<String>,
}

impl ProjectInfo {
    pub fn new(project_dir: impl Into<PathBuf>, rc_file: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            rc_file: rc_file.into(),
            include_paths: Vec::new(),
            defines: Vec::new(),
        }
    }

    pub fn with_include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_paths.push(path.into());
        self
    }

    pub fn with_define(mut self, define: impl Into<String>) -> Self {
        self.defines.push(define.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn msvc_arguments() {
        let args = PreprocessorFlavor::Msvc.arguments(
            &strings(&["inc", "C:\\sdk"]),
            &strings(&["_UNICODE", "LEVEL=2"]),
            "app.rc",
        );
        assert_eq!(
            args,
            strings(&[
                "/Iinc",
                "/IC:\\sdk",
                "/D_UNICODE",
                "/DLEVEL=2",
                "/DRC_INVOKED",
                "/DWINAPI_PARTITION_DESKTOP=0",
                "/EP",
                "/showIncludes",
                "/nologo",
                "/C",
                "app.rc",
            ])
        );
    }

    #[test]
    fn gcc_arguments() {
        let args = PreprocessorFlavor::Gcc.arguments(&strings(&["inc"]), &[], "res/app.rc");
        assert_eq!(
            args,
            strings(&[
                "-H",
                "-P",
                "-nostdinc",
                "-C",
                "-DRC_INVOKED",
                "-DWINAPI_PARTITION_DESKTOP=0",
                "-Iinc",
                "-E",
                "-x",
                "c-header",
                "res/app.rc",
            ])
        );
    }

    #[cfg(unix)]
    #[test]
    fn msvc_notes_yield_paths_after_the_second_colon() {
        let stderr = "app.rc\r\n\
                      Note: including file: /proj/resource.h\r\n\
                      Note: including file:  /sdk/afxres.h\r\n";
        let files = PreprocessorFlavor::Msvc.included_files(stderr, Path::new("/proj"));
        assert_eq!(
            files,
            vec![PathBuf::from("/proj/resource.h"), PathBuf::from("/sdk/afxres.h")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn gcc_notes_resolve_against_the_working_dir() {
        let stderr = ". Resources/hoge.h\n\
                      .. /usr/include/afxres.h\n\
                      Multiple include guards may be useful for:\n\
                      Resources/hoge.h\n";
        let files = PreprocessorFlavor::Gcc.included_files(stderr, Path::new("/proj"));
        assert_eq!(
            files,
            vec![
                PathBuf::from("/proj/Resources/hoge.h"),
                PathBuf::from("/usr/include/afxres.h")
            ]
        );
    }

    #[test]
    fn flavors_deserialize_from_kebab_case() {
        #[derive(Deserialize)]
        struct Holder {
            flavor: PreprocessorFlavor,
        }
        let holder: Holder = serde_json::from_str(r#"{"flavor":"gcc"}"#).unwrap();
        assert_eq!(holder.flavor, PreprocessorFlavor::Gcc);
    }
}
