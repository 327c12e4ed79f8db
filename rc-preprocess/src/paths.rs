//! Lexical path handling for preprocessor output.
//!
//! Nothing here touches the filesystem: paths reported by the preprocessor are
//! normalized and compared as text, with case folded on platforms whose filesystems
//! are usually case-insensitive.

use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

const CASE_INSENSITIVE: bool = cfg!(any(windows, target_os = "macos"));

/// Replace both `/` and `\` with the host separator.
pub fn normalize_separators(raw: &str) -> String {
    raw.chars()
        .map(|c| if c == '/' || c == '\\' { MAIN_SEPARATOR } else { c })
        .collect()
}

/// `path` joined onto `base` when relative, with `.` and `..` resolved lexically.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        lexical_normalize(path)
    } else {
        lexical_normalize(&base.join(path))
    }
}

pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// `path` relative to `root`, if it lies inside it. `root` itself yields an empty path.
/// Both are expected to be absolute and normalized.
pub fn relative_inside(root: &Path, path: &Path) -> Option<PathBuf> {
    let relative = if CASE_INSENSITIVE {
        pathdiff::diff_paths(fold_case(path), fold_case(root))?
    } else {
        pathdiff::diff_paths(path, root)?
    };
    let escapes = relative
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return None;
    }
    // Original spelling of the tail, even when case was folded for the comparison.
    Some(path.components().skip(root.components().count()).collect())
}

pub fn is_inside(root: &Path, path: &Path) -> bool {
    relative_inside(root, path).is_some()
}

fn fold_case(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().to_lowercase())
}
