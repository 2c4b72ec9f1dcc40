//
// state.rs
//
// Open documents, the item store and the configuration they are indexed with
//

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use ropey::Rope;
use tower_lsp::lsp_types::{Position, TextDocumentContentChangeEvent, Url};
use walkdir::WalkDir;

use crate::cross_file::{
    get_file_snapshot, link_includes, read_source, FileCache, FileSnapshot, IndexConfig,
    SearchPaths,
};
use crate::error::IndexError;
use crate::items::{FileItemSet, Item};
use crate::position;
use crate::store::FileItemStore;
use crate::walker::parse_file;

/// An open document
pub struct Document {
    pub contents: Rope,
    pub version: Option<i32>,
    pub revision: u64,
}

impl Document {
    pub fn new(text: &str, version: Option<i32>) -> Self {
        Self {
            contents: Rope::from_str(text),
            version,
            revision: 0,
        }
    }

    pub fn apply_change(&mut self, change: TextDocumentContentChangeEvent) {
        if let Some(range) = change.range {
            let start_line = range.start.line as usize;
            let end_line = range.end.line as usize;
            if start_line >= self.contents.len_lines() || end_line >= self.contents.len_lines() {
                log::warn!("Ignoring edit outside the document (line {})", end_line);
                return;
            }

            let start_line_text = self.contents.line(start_line).to_string();
            let end_line_text = self.contents.line(end_line).to_string();

            let start_char =
                utf16_offset_to_char_offset(&start_line_text, range.start.character as usize);
            let end_char = utf16_offset_to_char_offset(&end_line_text, range.end.character as usize);

            let start_idx = self.contents.line_to_char(start_line) + start_char;
            let end_idx = self.contents.line_to_char(end_line) + end_char;

            self.contents.remove(start_idx..end_idx);
            self.contents.insert(start_idx, &change.text);
        } else {
            // Full document sync
            self.contents = Rope::from_str(&change.text);
        }

        self.revision += 1;
    }

    pub fn text(&self) -> String {
        self.contents.to_string()
    }
}

fn utf16_offset_to_char_offset(line_text: &str, utf16_offset: usize) -> usize {
    let mut utf16_count = 0;
    let mut char_count = 0;

    for ch in line_text.chars() {
        if utf16_count >= utf16_offset || ch == '\n' || ch == '\r' {
            return char_count;
        }
        utf16_count += ch.len_utf16();
        char_count += 1;
    }
    char_count
}

/// Global LSP state
pub struct WorldState {
    pub documents: HashMap<Url, Document>,
    pub store: FileItemStore,
    pub workspace_folders: Vec<Url>,
    pub config: IndexConfig,
    pub search: SearchPaths,
    pub file_cache: FileCache,
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldState {
    pub fn new() -> Self {
        let config = IndexConfig::default();
        log::info!("Initializing index configuration with defaults:");
        log::info!("  index_workspace: {}", config.index_workspace);
        log::info!("  max_file_size_bytes: {}", config.max_file_size_bytes);

        Self {
            documents: HashMap::new(),
            store: FileItemStore::new(),
            workspace_folders: Vec::new(),
            search: SearchPaths::new(Vec::new(), config.clone()),
            config,
            file_cache: FileCache::new(),
        }
    }

    pub fn add_workspace_folder(&mut self, uri: Url) {
        if let Ok(path) = uri.to_file_path() {
            self.search.workspace_folders.push(path);
        }
        self.workspace_folders.push(uri);
    }

    /// Replace the configuration. Returns true when include edges had to be
    /// recomputed.
    pub fn set_config(&mut self, config: IndexConfig) -> bool {
        let relink = self.config.search_settings_changed(&config);
        self.search.config = config.clone();
        self.config = config;
        if relink {
            log::info!("Search settings changed; relinking {} files", self.store.len());
            self.relink_all();
        }
        relink
    }

    /// Configured main path as a file URI.
    pub fn fallback_main(&self) -> Option<Url> {
        position::fallback_main(&self.search)
    }

    pub fn open_document(&mut self, uri: Url, text: &str, version: Option<i32>) {
        self.file_cache.invalidate(&uri);
        self.update_file(&uri, text);
        self.documents.insert(uri, Document::new(text, version));
    }

    pub fn apply_change(&mut self, uri: &Url, change: TextDocumentContentChangeEvent) {
        let Some(doc) = self.documents.get_mut(uri) else {
            return;
        };
        doc.apply_change(change);
        let text = doc.text();
        self.update_file(uri, &text);
    }

    /// Close a document. Its items fall back to the disk contents, or are
    /// dropped when the file does not exist on disk.
    pub fn close_document(&mut self, uri: &Url) {
        self.documents.remove(uri);
        if let Err(err) = self.index_from_disk(uri) {
            log::trace!("Dropping items of closed document {}: {}", uri, err);
            self.store.remove(uri);
        }
    }

    pub fn get_document(&self, uri: &Url) -> Option<&Document> {
        self.documents.get(uri)
    }

    /// Current text of `uri`: the open document, else the file on disk.
    pub fn document_text(&self, uri: &Url) -> Option<String> {
        if let Some(doc) = self.documents.get(uri) {
            return Some(doc.text());
        }
        let path = uri.to_file_path().ok()?;
        read_source(&path, self.config.max_file_size_bytes)
            .map(|(text, _)| text)
            .ok()
    }

    /// Parse `text` as the new contents of `uri`, link its includes and swap
    /// it into the store.
    pub fn update_file(&self, uri: &Url, text: &str) -> Arc<FileItemSet> {
        let mut set = parse_file(uri, text);
        link_includes(&mut set, &self.search);
        self.store.put(uri.clone(), set)
    }

    /// Index `uri` from disk unless it is open or unchanged since it was last
    /// read.
    pub fn index_from_disk(&self, uri: &Url) -> Result<(), IndexError> {
        if self.documents.contains_key(uri) {
            return Ok(());
        }
        let path = uri
            .to_file_path()
            .map_err(|_| IndexError::NotAFile(uri.to_string()))?;
        let snapshot = get_file_snapshot(&path)?;
        if self.store.contains(uri) && self.file_cache.is_fresh(uri, &snapshot) {
            return Ok(());
        }
        let (text, snapshot) = read_source(&path, self.config.max_file_size_bytes)?;
        log::trace!("Indexing {} from disk", uri);
        self.update_file(uri, &text);
        self.file_cache.record(uri.clone(), snapshot);
        Ok(())
    }

    /// Load include targets and main paths reachable from `uri` that are not
    /// in the store yet. Returns the number of files indexed.
    pub fn index_missing_includes(&self, uri: &Url) -> usize {
        let mut visited = HashSet::new();
        let mut pending = vec![uri.clone()];
        if let Some(main) = self.fallback_main() {
            pending.push(main);
        }
        let mut indexed = 0;

        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if !self.store.contains(&current) {
                match self.index_from_disk(&current) {
                    Ok(()) => indexed += 1,
                    Err(err) => {
                        log::warn!("Failed to index {}: {}", current, err);
                        continue;
                    }
                }
            }
            if let Some(set) = self.store.get(&current) {
                pending.extend(set.includes.values().map(|rel| rel.uri.clone()));
                pending.extend(set.main_uri.clone());
            }
        }
        if indexed > 0 {
            log::trace!("Indexed {} missing include files for {}", indexed, uri);
        }
        indexed
    }

    /// Recompute include edges and main paths of every stored file.
    pub fn relink_all(&self) {
        for uri in self.store.uris() {
            if let Some(set) = self.store.get(&uri) {
                let mut set = (*set).clone();
                link_includes(&mut set, &self.search);
                self.store.put(uri, set);
            }
        }
    }

    /// A file changed on disk. Open documents are authoritative and ignored.
    pub fn file_changed_on_disk(&self, uri: &Url) {
        if self.documents.contains_key(uri) {
            return;
        }
        self.file_cache.invalidate(uri);
        if let Err(err) = self.index_from_disk(uri) {
            log::warn!("Failed to reindex {}: {}", uri, err);
        }
    }

    /// A file was deleted on disk.
    pub fn file_deleted(&self, uri: &Url) {
        if self.documents.contains_key(uri) {
            return;
        }
        self.file_cache.invalidate(uri);
        self.store.remove(uri);
    }

    pub fn apply_workspace_scan(&self, scanned: Vec<ScannedFile>) {
        let total = scanned.len();
        let mut applied = 0;
        for file in scanned {
            // Open documents are authoritative
            if self.documents.contains_key(&file.uri) {
                continue;
            }
            self.file_cache.record(file.uri.clone(), file.snapshot);
            self.store.put(file.uri, file.set);
            applied += 1;
        }
        log::info!("Applied {} of {} scanned workspace files", applied, total);
    }

    pub fn items_at(&self, uri: &Url, position: Position) -> Vec<Arc<Item>> {
        let Some(text) = self.document_text(uri) else {
            return Vec::new();
        };
        position::items_at(&self.store, &self.search, uri, &text, position)
    }
}

/// A file read and linked by a workspace scan.
#[derive(Debug)]
pub struct ScannedFile {
    pub uri: Url,
    pub set: FileItemSet,
    pub snapshot: FileSnapshot,
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "sp" || ext == "inc")
}

/// Source files under `folders`, sorted.
pub fn collect_source_files(folders: &[PathBuf]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = folders
        .iter()
        .flat_map(|folder| {
            WalkDir::new(folder)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_source_file(e.path()))
                .map(|e| e.into_path())
        })
        .collect();
    files.sort();
    files.dedup();
    files
}

/// Read, parse and link every `.sp`/`.inc` file of the workspace without
/// holding any lock. Files are parsed in parallel.
pub fn scan_workspace(search: &SearchPaths) -> Vec<ScannedFile> {
    let files = collect_source_files(&search.workspace_folders);
    log::info!("Scanning {} workspace source files", files.len());
    let max_size = search.config.max_file_size_bytes;

    let scanned: Vec<ScannedFile> = files
        .par_iter()
        .filter_map(|path| {
            let uri = Url::from_file_path(path).ok()?;
            let (text, snapshot) = match read_source(path, max_size) {
                Ok(read) => read,
                Err(err) => {
                    log::warn!("Skipping {}: {}", path.display(), err);
                    return None;
                }
            };
            let mut set = parse_file(&uri, &text);
            link_includes(&mut set, search);
            Some(ScannedFile { uri, set, snapshot })
        })
        .collect();

    log::info!("Scanned {} workspace files", scanned.len());
    scanned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tower_lsp::lsp_types::Range;

    fn change(start: (u32, u32), end: (u32, u32), text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range: Some(Range::new(
                Position::new(start.0, start.1),
                Position::new(end.0, end.1),
            )),
            range_length: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_document_apply_change_ascii() {
        let mut doc = Document::new("int count;", None);
        doc.apply_change(change((0, 4), (0, 9), "total"));
        assert_eq!(doc.text(), "int total;");
        assert_eq!(doc.revision, 1);
    }

    #[test]
    fn test_document_apply_change_utf16_emoji() {
        // 🎉 is 4 bytes in UTF-8, 2 UTF-16 code units
        let mut doc = Document::new("a🎉b", None);
        doc.apply_change(change((0, 3), (0, 3), "x"));
        assert_eq!(doc.text(), "a🎉xb");
    }

    #[test]
    fn test_document_apply_change_multiline() {
        let mut doc = Document::new("line1\n🎉line2", None);
        doc.apply_change(change((1, 2), (1, 7), "test"));
        assert_eq!(doc.text(), "line1\n🎉test");
    }

    #[test]
    fn test_document_full_sync() {
        let mut doc = Document::new("old", None);
        doc.apply_change(TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: "new".to_string(),
        });
        assert_eq!(doc.text(), "new");
    }

    #[test]
    fn test_utf16_offset_to_char_offset() {
        assert_eq!(utf16_offset_to_char_offset("hello", 3), 3);
        assert_eq!(utf16_offset_to_char_offset("a🎉b", 3), 2);
        assert_eq!(utf16_offset_to_char_offset("a中b", 2), 2);
        assert_eq!(utf16_offset_to_char_offset("ab\n", 9), 2);
    }

    fn workspace() -> (TempDir, Url) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("scripting/include")).unwrap();
        fs::write(
            root.join("scripting/include/helpers.inc"),
            "/** Doubles a value. */\nstock int Double(int v) { return v * 2; }\n",
        )
        .unwrap();
        let main = Url::from_file_path(root.join("scripting/plugin.sp")).unwrap();
        (dir, main)
    }

    #[test]
    fn test_open_document_loads_missing_includes() {
        let (dir, main) = workspace();
        let mut state = WorldState::new();
        state.add_workspace_folder(Url::from_file_path(dir.path()).unwrap());

        let text = "#include <helpers>\nvoid F() { Double(1); }\n";
        state.open_document(main.clone(), text, Some(1));
        assert_eq!(state.index_missing_includes(&main), 1);
        // Already loaded
        assert_eq!(state.index_missing_includes(&main), 0);

        let found = state.items_at(&main, Position::new(1, 13));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Double");
    }

    #[test]
    fn test_edit_reindexes_document() {
        let mut state = WorldState::new();
        let uri = Url::parse("file:///nonexistent/a.sp").unwrap();
        state.open_document(uri.clone(), "int a;", Some(1));
        state.apply_change(&uri, change((0, 4), (0, 5), "b"));
        let set = state.store.get(&uri).unwrap();
        assert_eq!(set.items[0].name, "b");

        state.close_document(&uri);
        assert!(state.store.get(&uri).is_none());
    }

    #[test]
    fn test_config_change_relinks() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sm/include")).unwrap();
        fs::write(root.join("sm/include/sourcemod.inc"), "native int GetMaxClients();\n").unwrap();
        let main = Url::from_file_path(root.join("plugin.sp")).unwrap();

        let mut state = WorldState::new();
        state.open_document(main.clone(), "#include <sourcemod>\n", None);
        assert!(state.store.get(&main).unwrap().includes.is_empty());

        let config = IndexConfig {
            sourcemod_home: Some(root.join("sm")),
            ..Default::default()
        };
        assert!(state.set_config(config.clone()));
        assert_eq!(state.store.get(&main).unwrap().includes.len(), 1);
        // Same settings again change nothing
        assert!(!state.set_config(config));
    }

    #[test]
    fn test_scan_workspace_finds_sources() {
        let (dir, _) = workspace();
        fs::write(dir.path().join("scripting/plugin.sp"), "#include <helpers>\nint x;\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "int ignored;").unwrap();

        let search = SearchPaths::new(vec![dir.path().to_path_buf()], IndexConfig::default());
        let scanned = scan_workspace(&search);
        assert_eq!(scanned.len(), 2);
        let plugin = scanned
            .iter()
            .find(|f| f.uri.path().ends_with("plugin.sp"))
            .unwrap();
        assert_eq!(plugin.set.includes.len(), 1);

        let state = WorldState::new();
        state.apply_workspace_scan(scanned);
        assert_eq!(state.store.len(), 2);
    }

    #[test]
    fn test_file_deleted_keeps_open_documents() {
        let mut state = WorldState::new();
        let uri = Url::parse("file:///nonexistent/open.sp").unwrap();
        state.open_document(uri.clone(), "int a;", None);
        state.file_deleted(&uri);
        assert!(state.store.contains(&uri));
    }

    #[test]
    fn test_index_from_disk_errors() {
        let state = WorldState::new();
        let err = state
            .index_from_disk(&Url::parse("untitled:Untitled-1").unwrap())
            .unwrap_err();
        assert!(matches!(err, IndexError::NotAFile(_)));

        let err = state
            .index_from_disk(&Url::parse("file:///definitely/missing.inc").unwrap())
            .unwrap_err();
        assert!(matches!(err, IndexError::Io { .. }));
    }
}
