//
// cross_file/config.rs
//
// Configuration for include resolution and workspace indexing
//

use std::path::PathBuf;

/// Default cap on the size of files indexed from disk (2 MiB)
pub const DEFAULT_MAX_FILE_SIZE_BYTES: usize = 2 * 1024 * 1024;

/// Indexing configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Extra include directories, workspace-relative or absolute
    pub include_dirs: Vec<PathBuf>,
    /// SourceMod installation root; `<home>` and `<home>/include` are searched last
    pub sourcemod_home: Option<PathBuf>,
    /// Main file used as traversal entry when a file declares none
    pub main_path: Option<PathBuf>,
    /// Whether to scan the workspace for `.sp`/`.inc` files on startup
    pub index_workspace: bool,
    /// Files larger than this are not indexed from disk
    pub max_file_size_bytes: usize,
}

impl Default for IndexConfig {
    /// No extra search directories, no main path, workspace indexing on and
    /// a 2 MiB file size cap.
    ///
    /// # Examples
    ///
    /// ```
    /// use pawnlens::cross_file::IndexConfig;
    ///
    /// let cfg = IndexConfig::default();
    /// assert!(cfg.index_workspace);
    /// assert!(cfg.include_dirs.is_empty());
    /// assert_eq!(cfg.max_file_size_bytes, 2 * 1024 * 1024);
    /// ```
    fn default() -> Self {
        Self {
            include_dirs: Vec::new(),
            sourcemod_home: None,
            main_path: None,
            index_workspace: true,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
        }
    }
}

impl IndexConfig {
    /// Check if settings that affect include edges changed between two configs
    pub fn search_settings_changed(&self, other: &Self) -> bool {
        self.include_dirs != other.include_dirs
            || self.sourcemod_home != other.sourcemod_home
            || self.main_path != other.main_path
    }
}
