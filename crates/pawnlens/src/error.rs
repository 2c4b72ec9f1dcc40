//
// error.rs
//
// Error types for disk indexing. Parsing and querying never fail; these
// cover unreadable files, non-file URIs and oversize inputs.
//

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("URI is not a local file: {0}")]
    NotAFile(String),

    #[error("'{}' is {size} bytes, over the {limit} byte limit", path.display())]
    TooLarge {
        path: PathBuf,
        size: u64,
        limit: usize,
    },

    #[error("Workspace scan failed: {0}")]
    Scan(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = IndexError::TooLarge {
            path: PathBuf::from("/w/big.inc"),
            size: 10,
            limit: 5,
        };
        assert_eq!(err.to_string(), "'/w/big.inc' is 10 bytes, over the 5 byte limit");

        let err = IndexError::NotAFile("untitled:1".to_string());
        assert_eq!(err.to_string(), "URI is not a local file: untitled:1");
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error as _;
        let err = IndexError::Io {
            path: PathBuf::from("/nope"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("Failed to read '/nope'"));
    }
}
