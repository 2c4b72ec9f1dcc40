// lib.rs: SourcePawn symbol indexing and the language server built on it.
//
// The binary in main.rs only parses arguments and starts `backend`.

pub mod backend;
pub mod builtins;
pub mod cross_file;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod items;
pub mod position;
pub mod state;
pub mod store;
pub mod syntax;
pub mod utf16;
pub mod walker;

// test_utils is available in test builds and when the `test-support` feature is enabled.
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
