// cross_file.rs - Benchmarks for include graph traversal and cursor resolution
//
// Run with: cargo bench --bench cross_file --features test-support
// Compare baselines: cargo bench --bench cross_file --features test-support -- --baseline before

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::Path;
use tower_lsp::lsp_types::Position;
use url::Url;

use pawnlens::cross_file::{link_includes, resolve_universe, IndexConfig, SearchPaths};
use pawnlens::position::items_at;
use pawnlens::store::FileItemStore;
use pawnlens::test_utils::fixture_workspace::{
    create_fixture_workspace, fixture_file_name, FixtureConfig,
};
use pawnlens::walker::parse_file;

/// Parse and link every fixture file into a fresh store.
fn index_workspace(workspace_path: &Path, search: &SearchPaths) -> FileItemStore {
    let store = FileItemStore::new();

    let mut entries: Vec<_> = std::fs::read_dir(workspace_path)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "sp" || ext == "inc")
                .unwrap_or(false)
        })
        .collect();
    entries.sort_by_key(|e| e.path());

    for entry in &entries {
        let path = entry.path();
        let content = std::fs::read_to_string(&path).unwrap();
        let uri = Url::from_file_path(&path).unwrap();
        let mut set = parse_file(&uri, &content);
        link_includes(&mut set, search);
        store.put(uri, set);
    }

    store
}

fn search_for(workspace_path: &Path) -> SearchPaths {
    SearchPaths::new(vec![workspace_path.to_path_buf()], IndexConfig::default())
}

fn file_0_uri(workspace_path: &Path) -> Url {
    Url::from_file_path(workspace_path.join(fixture_file_name(0))).unwrap()
}

// ---------------------------------------------------------------------------
// Benchmark: universe resolution with varying include chain depths
//
// Measures the cost of collecting every item visible from file_0.sp (the
// root of the include chain) for chain depths 1, 5, and 15.
// ---------------------------------------------------------------------------

fn bench_universe_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_file_universe");
    group.sample_size(20);

    let chain_depths: &[usize] = &[1, 5, 15];

    for &depth in chain_depths {
        let file_count = (depth + 5).max(10);
        let config = FixtureConfig {
            file_count,
            functions_per_file: 5,
            include_chain_depth: depth,
            methodmaps_per_file: 1,
            globals_per_file: 3,
        };

        let workspace = create_fixture_workspace(&config);
        let workspace_path = workspace.path();
        let search = search_for(workspace_path);
        let store = index_workspace(workspace_path, &search);
        let uri = file_0_uri(workspace_path);

        group.bench_with_input(BenchmarkId::new("depth", depth), &depth, |b, _| {
            b.iter(|| black_box(resolve_universe(&store, black_box(&uri), None)))
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: indexing and cursor resolution on small and medium workspaces
//
// Measures the cost of:
//   - Parsing and linking every file into a fresh store
//   - Resolving the items under a cursor in the root file
// ---------------------------------------------------------------------------

fn bench_indexing_and_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_file_index");
    group.sample_size(20);

    let configs: &[(&str, FixtureConfig)] = &[
        ("small_10", FixtureConfig::small()),
        ("medium_50", FixtureConfig::medium()),
    ];

    for (label, config) in configs {
        let workspace = create_fixture_workspace(config);
        let workspace_path = workspace.path();
        let search = search_for(workspace_path);

        group.bench_with_input(
            BenchmarkId::new("index_workspace", *label),
            &workspace_path,
            |b, path| b.iter(|| black_box(index_workspace(black_box(path), &search))),
        );

        let store = index_workspace(workspace_path, &search);
        let uri = file_0_uri(workspace_path);
        let text = std::fs::read_to_string(workspace_path.join(fixture_file_name(0))).unwrap();
        let (line, column) = text
            .lines()
            .enumerate()
            .find_map(|(i, l)| l.find("func_0_0").map(|col| (i as u32, col as u32)))
            .unwrap();
        let position = Position::new(line, column + 2);

        group.bench_with_input(
            BenchmarkId::new("items_at", *label),
            &position,
            |b, position| {
                b.iter(|| {
                    black_box(items_at(
                        &store,
                        &search,
                        black_box(&uri),
                        &text,
                        *position,
                    ))
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_universe_resolution, bench_indexing_and_lookup);
criterion_main!(benches);
