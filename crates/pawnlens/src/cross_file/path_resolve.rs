//
// cross_file/path_resolve.rs
//
// Include token and main-path resolution
//
// Search order for `#include <name>` / `#include "name"`:
//
// 1. the including file's directory
// 2. its `include/` subdirectory
// 3. configured include directories (workspace-relative entries, resolved
//    against every workspace folder, before absolute entries)
// 4. the SourceMod home and its `include/` subdirectory
//
// The first existing file wins. Both delimiter styles use the same order.
//

use std::path::{Component, Path, PathBuf};

use tower_lsp::lsp_types::Url;

use super::config::IndexConfig;

/// Search inputs that are the same for every file of a workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPaths {
    pub workspace_folders: Vec<PathBuf>,
    pub config: IndexConfig,
}

impl SearchPaths {
    pub fn new(workspace_folders: Vec<PathBuf>, config: IndexConfig) -> Self {
        Self {
            workspace_folders,
            config,
        }
    }

    /// Directories searched for includes of `including_file`, in priority order.
    pub fn candidate_dirs(&self, including_file: &Path) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(dir) = including_file.parent() {
            dirs.push(dir.to_path_buf());
            dirs.push(dir.join("include"));
        }

        let (relative, absolute): (Vec<&PathBuf>, Vec<&PathBuf>) = self
            .config
            .include_dirs
            .iter()
            .partition(|d| d.is_relative());
        for dir in relative {
            for folder in &self.workspace_folders {
                dirs.push(folder.join(dir));
            }
        }
        dirs.extend(absolute.into_iter().cloned());

        if let Some(home) = &self.config.sourcemod_home {
            dirs.push(home.clone());
            dirs.push(home.join("include"));
        }

        dirs.into_iter().filter_map(|d| normalize_path(&d)).collect()
    }

    /// Resolve an include token to an existing file.
    pub fn resolve_include(&self, text: &str, including_file: &Path) -> Option<PathBuf> {
        let file_name = include_file_name(text);
        let found = self
            .candidate_dirs(including_file)
            .into_iter()
            .filter_map(|dir| normalize_path(&dir.join(&file_name)))
            .find(|candidate| candidate.is_file());
        match &found {
            Some(path) => log::trace!(
                "Resolved include '{}' from '{}' to '{}'",
                text,
                including_file.display(),
                path.display()
            ),
            None => log::trace!(
                "Unresolved include '{}' from '{}'",
                text,
                including_file.display()
            ),
        }
        found
    }

    /// Configured main path, resolved against the first workspace folder
    /// when relative.
    pub fn configured_main_path(&self) -> Option<PathBuf> {
        let main = self.config.main_path.as_ref()?;
        if main.is_absolute() {
            return normalize_path(main);
        }
        let folder = self.workspace_folders.first()?;
        normalize_path(&folder.join(main))
    }
}

/// Include token as a file name: `.inc` is appended unless the token
/// already ends in `.inc` or `.sp`.
pub fn include_file_name(text: &str) -> String {
    let text = text.trim();
    if text.ends_with(".inc") || text.ends_with(".sp") {
        text.to_string()
    } else {
        format!("{}.inc", text)
    }
}

/// Resolve a main-path directive relative to the declaring file's directory.
pub fn resolve_main_path(raw: &str, file_path: &Path) -> Option<PathBuf> {
    if raw.is_empty() {
        return None;
    }
    let raw_path = Path::new(raw);
    let resolved = if raw_path.is_absolute() {
        raw_path.to_path_buf()
    } else {
        file_path.parent()?.join(raw_path)
    };
    normalize_path(&resolved)
}

/// Normalize a path by resolving `.` and `..` components lexically
pub fn normalize_path(path: &Path) -> Option<PathBuf> {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                // Only pop a Normal segment; RootDir and Prefix are kept
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
            Component::CurDir => {}
            c => components.push(c),
        }
    }

    if components.is_empty() {
        return None;
    }

    let mut result = PathBuf::new();
    for c in components {
        result.push(c);
    }
    Some(result)
}

/// Convert a resolved path to a file URI.
pub fn path_to_uri(path: &Path) -> Option<Url> {
    Url::from_file_path(path).ok()
}
