//
// cross_file/file_cache.rs
//
// Disk snapshots of indexed files, used to skip re-parsing unchanged files
//

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use std::time::SystemTime;

use tower_lsp::lsp_types::Url;

use crate::error::IndexError;

/// Snapshot metadata for a file on disk, used to determine index validity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileSnapshot {
    /// File modification time (from filesystem metadata)
    pub mtime: SystemTime,
    /// File size in bytes
    pub size: u64,
}

impl FileSnapshot {
    /// Create snapshot from filesystem metadata
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        Self {
            mtime: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            size: metadata.len(),
        }
    }
}

/// Snapshots of the disk state each stored file was indexed from.
#[derive(Debug, Default)]
pub struct FileCache {
    inner: RwLock<HashMap<Url, FileSnapshot>>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `uri` was indexed from exactly this disk state
    pub fn is_fresh(&self, uri: &Url, current: &FileSnapshot) -> bool {
        self.inner
            .read()
            .map(|guard| guard.get(uri) == Some(current))
            .unwrap_or(false)
    }

    pub fn record(&self, uri: Url, snapshot: FileSnapshot) {
        if let Ok(mut guard) = self.inner.write() {
            guard.insert(uri, snapshot);
        }
    }

    /// Forget a URI (its contents now come from an editor, or it was deleted)
    pub fn invalidate(&self, uri: &Url) {
        if let Ok(mut guard) = self.inner.write() {
            guard.remove(uri);
        }
    }
}

/// Get file snapshot from disk.
pub fn get_file_snapshot(path: &Path) -> Result<FileSnapshot, IndexError> {
    let metadata = std::fs::metadata(path).map_err(|source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(FileSnapshot::from_metadata(&metadata))
}

/// Read a source file, refusing files over `max_size` bytes. Invalid UTF-8
/// is replaced rather than rejected.
pub fn read_source(path: &Path, max_size: usize) -> Result<(String, FileSnapshot), IndexError> {
    let snapshot = get_file_snapshot(path)?;
    if snapshot.size > max_size as u64 {
        return Err(IndexError::TooLarge {
            path: path.to_path_buf(),
            size: snapshot.size,
            limit: max_size,
        });
    }
    let bytes = std::fs::read(path).map_err(|source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    };
    Ok((text, snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn test_uri(name: &str) -> Url {
        Url::parse(&format!("file:///{}", name)).unwrap()
    }

    #[test]
    fn test_fresh_only_for_identical_snapshot() {
        let cache = FileCache::new();
        let uri = test_uri("a.inc");
        let snapshot = FileSnapshot {
            mtime: SystemTime::UNIX_EPOCH,
            size: 10,
        };
        assert!(!cache.is_fresh(&uri, &snapshot));
        cache.record(uri.clone(), snapshot);
        assert!(cache.is_fresh(&uri, &snapshot));

        let grown = FileSnapshot { size: 20, ..snapshot };
        assert!(!cache.is_fresh(&uri, &grown));
    }

    #[test]
    fn test_invalidate() {
        let cache = FileCache::new();
        let uri = test_uri("a.inc");
        let snapshot = FileSnapshot {
            mtime: SystemTime::UNIX_EPOCH,
            size: 10,
        };
        cache.record(uri.clone(), snapshot);
        cache.invalidate(&uri);
        assert!(!cache.is_fresh(&uri, &snapshot));
    }

    #[test]
    fn test_read_source_and_size_limit() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "int x;").unwrap();
        let (text, snapshot) = read_source(temp.path(), 1024).unwrap();
        assert!(text.contains("int x;"));
        assert_eq!(snapshot.size, 7);

        let err = read_source(temp.path(), 3).unwrap_err();
        assert!(matches!(err, IndexError::TooLarge { .. }));
    }

    #[test]
    fn test_read_source_lossy_utf8() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"// caf\xe9\nint x;\n").unwrap();
        let (text, _) = read_source(temp.path(), 1024).unwrap();
        assert!(text.contains("int x;"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = get_file_snapshot(Path::new("/definitely/not/here.inc")).unwrap_err();
        assert!(matches!(err, IndexError::Io { .. }));
    }
}
