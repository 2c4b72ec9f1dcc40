//! Deterministic fixture workspace generator for benchmarks and tests.
//!
//! Generates synthetic SourcePawn workspaces with controlled characteristics:
//! file count, functions per file, `#include` chains, methodmaps and global
//! variables.
//!
//! All output is deterministic (no randomness) so benchmarks are reproducible.

use std::fmt::Write;
use std::path::Path;
use tempfile::TempDir;

/// Configuration for generating a fixture workspace.
#[derive(Debug, Clone)]
pub struct FixtureConfig {
    pub file_count: usize,
    pub functions_per_file: usize,
    pub include_chain_depth: usize,
    pub methodmaps_per_file: usize,
    pub globals_per_file: usize,
}

impl FixtureConfig {
    /// Small workspace: 10 files, 5 functions each, include chain depth 3.
    pub fn small() -> Self {
        Self {
            file_count: 10,
            functions_per_file: 5,
            include_chain_depth: 3,
            methodmaps_per_file: 1,
            globals_per_file: 5,
        }
    }

    /// Medium workspace: 50 files, 10 functions each, include chain depth 10.
    pub fn medium() -> Self {
        Self {
            file_count: 50,
            functions_per_file: 10,
            include_chain_depth: 10,
            methodmaps_per_file: 2,
            globals_per_file: 10,
        }
    }

    /// Large workspace: 200 files, 20 functions each, include chain depth 15.
    pub fn large() -> Self {
        Self {
            file_count: 200,
            functions_per_file: 20,
            include_chain_depth: 15,
            methodmaps_per_file: 3,
            globals_per_file: 20,
        }
    }
}

/// File name of fixture file `index`: the first file is the plugin, the
/// rest are include files.
pub fn fixture_file_name(index: usize) -> String {
    if index == 0 {
        "file_0.sp".to_string()
    } else {
        format!("file_{}.inc", index)
    }
}

/// Generate the content of a single source file deterministically.
///
/// - `index`: file index (0-based), used for naming and include chain linkage
/// - `config`: the workspace configuration
fn generate_source_content(index: usize, config: &FixtureConfig) -> String {
    let mut content = String::new();

    // Include chain: file_0 includes file_1, file_1 includes file_2, etc.
    if index < config.include_chain_depth && index + 1 < config.file_count {
        writeln!(content, "#include \"file_{}\"", index + 1).unwrap();
        content.push('\n');
    }

    for global_i in 0..config.globals_per_file {
        writeln!(content, "int g_value_{}_{} = {}; // Counter {}", index, global_i, global_i, global_i)
            .unwrap();
    }
    if config.globals_per_file > 0 {
        content.push('\n');
    }

    for map_i in 0..config.methodmaps_per_file {
        writeln!(content, "methodmap Map_{}_{} < Handle", index, map_i).unwrap();
        writeln!(content, "{{").unwrap();
        writeln!(content, "    public native Map_{}_{}(int size);", index, map_i).unwrap();
        writeln!(content, "    public native int Get(int slot);").unwrap();
        writeln!(content, "    property int Length {{").unwrap();
        writeln!(content, "        public native get();").unwrap();
        writeln!(content, "    }}").unwrap();
        writeln!(content, "}}").unwrap();
        content.push('\n');
    }

    for func_i in 0..config.functions_per_file {
        writeln!(content, "/**").unwrap();
        writeln!(content, " * Generated function {} of file {}.", func_i, index).unwrap();
        writeln!(content, " *").unwrap();
        writeln!(content, " * @param x       First operand.").unwrap();
        writeln!(content, " * @param y       Second operand.").unwrap();
        writeln!(content, " * @return        Combined value.").unwrap();
        writeln!(content, " */").unwrap();
        writeln!(
            content,
            "stock int func_{}_{}(int x, int y = {})",
            index,
            func_i,
            func_i + 1
        )
        .unwrap();
        writeln!(content, "{{").unwrap();
        writeln!(content, "    int result = x + y * {};", func_i + 1).unwrap();
        writeln!(content, "    if (result < 0)").unwrap();
        writeln!(content, "    {{").unwrap();
        writeln!(content, "        return 0;").unwrap();
        writeln!(content, "    }}").unwrap();
        writeln!(content, "    return result;").unwrap();
        writeln!(content, "}}").unwrap();
        content.push('\n');
    }

    content
}

/// Create a temporary fixture workspace from the given configuration.
///
/// Returns a `TempDir` whose path contains the generated `.sp`/`.inc` files.
/// The directory is cleaned up when the `TempDir` is dropped.
///
/// Calling this twice with the same `FixtureConfig` produces byte-identical files.
pub fn create_fixture_workspace(config: &FixtureConfig) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory for fixture workspace");
    write_fixture_workspace(temp_dir.path(), config);
    temp_dir
}

/// Write fixture files into an existing directory.
pub fn write_fixture_workspace(dir: &Path, config: &FixtureConfig) {
    for i in 0..config.file_count {
        let content = generate_source_content(i, config);
        let filename = fixture_file_name(i);
        let filepath = dir.join(&filename);
        std::fs::write(&filepath, &content)
            .unwrap_or_else(|e| panic!("Failed to write fixture file {}: {}", filename, e));
    }
}
