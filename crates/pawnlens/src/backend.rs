//
// backend.rs
//
// tower-lsp server: document sync, configuration and request dispatch
//

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::Client;
use tower_lsp::LanguageServer;
use tower_lsp::LspService;
use tower_lsp::Server;

use crate::cross_file::IndexConfig;
use crate::error::IndexError;
use crate::handlers;
use crate::state::{scan_workspace, WorldState};

/// Client-facing names of the indexing settings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct IndexSettings {
    include_directories: Option<Vec<String>>,
    sourcemod_home: Option<String>,
    main_path: Option<String>,
    index_workspace: Option<bool>,
    max_file_size_bytes: Option<u64>,
}

fn non_empty_path(raw: String) -> Option<PathBuf> {
    Some(PathBuf::from(raw)).filter(|p| !p.as_os_str().is_empty())
}

/// Read an [`IndexConfig`] from initialization options or configuration
/// settings. Keys may sit at the top level or under a `sourcepawn` object;
/// missing keys keep their defaults.
pub fn parse_index_config(settings: &serde_json::Value) -> Option<IndexConfig> {
    let section = settings.get("sourcepawn").unwrap_or(settings);
    if !section.is_object() {
        return None;
    }
    let raw: IndexSettings = match serde_json::from_value(section.clone()) {
        Ok(raw) => raw,
        Err(err) => {
            log::warn!("Invalid pawnlens settings: {}", err);
            return None;
        }
    };

    let mut config = IndexConfig::default();
    if let Some(dirs) = raw.include_directories {
        config.include_dirs = dirs.into_iter().filter_map(non_empty_path).collect();
    }
    if let Some(home) = raw.sourcemod_home {
        config.sourcemod_home = non_empty_path(home);
    }
    if let Some(main) = raw.main_path {
        config.main_path = non_empty_path(main);
    }
    if let Some(v) = raw.index_workspace {
        config.index_workspace = v;
    }
    if let Some(v) = raw.max_file_size_bytes {
        config.max_file_size_bytes = v as usize;
    }

    log::trace!("Parsed index config: {:?}", config);
    Some(config)
}

pub struct Backend {
    client: Client,
    state: Arc<RwLock<WorldState>>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            state: Arc::new(RwLock::new(WorldState::new())),
        }
    }

    /// Load not-yet-indexed include targets of `uri` from disk.
    async fn index_includes_of(&self, uri: &Url) {
        index_includes_off_runtime(Arc::clone(&self.state), uri.clone()).await;
    }
}

/// Load missing include files of `uri` on the blocking pool. The read lock is
/// taken there so disk reads never stall the runtime.
async fn index_includes_off_runtime(state: Arc<RwLock<WorldState>>, uri: Url) -> usize {
    let task = tokio::task::spawn_blocking(move || {
        let state = state.blocking_read();
        state.index_missing_includes(&uri)
    });
    match task.await {
        Ok(indexed) => indexed,
        Err(err) => {
            log::warn!("{}", IndexError::Scan(err.to_string()));
            0
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        log::info!("Initializing pawnlens");

        let mut state = self.state.write().await;

        if let Some(folders) = params.workspace_folders {
            for folder in folders {
                log::info!("Adding workspace folder: {}", folder.uri);
                state.add_workspace_folder(folder.uri);
            }
        } else if let Some(root_uri) = params.root_uri {
            log::info!("Adding root URI as workspace folder: {}", root_uri);
            state.add_workspace_folder(root_uri);
        }

        if let Some(config) = params
            .initialization_options
            .as_ref()
            .and_then(parse_index_config)
        {
            state.set_config(config);
        }

        drop(state);

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::INCREMENTAL,
                )),
                document_symbol_provider: Some(OneOf::Left(true)),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![String::from(".")]),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                signature_help_provider: Some(SignatureHelpOptions {
                    trigger_characters: Some(vec![String::from("("), String::from(",")]),
                    ..Default::default()
                }),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                semantic_tokens_provider: Some(
                    SemanticTokensServerCapabilities::SemanticTokensOptions(
                        SemanticTokensOptions {
                            legend: handlers::semantic_tokens_legend(),
                            full: Some(SemanticTokensFullOptions::Bool(true)),
                            range: None,
                            ..Default::default()
                        },
                    ),
                ),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: String::from("pawnlens"),
                version: Some(String::from(env!("CARGO_PKG_VERSION"))),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        log::info!("pawnlens initialized");

        let (search, index_workspace) = {
            let state = self.state.read().await;
            (state.search.clone(), state.config.index_workspace)
        };

        if !index_workspace {
            log::info!("Workspace indexing disabled");
            return;
        }

        // Scan without holding the state lock
        let scanned = match tokio::task::spawn_blocking(move || scan_workspace(&search)).await {
            Ok(scanned) => scanned,
            Err(err) => {
                log::warn!("{}", IndexError::Scan(err.to_string()));
                return;
            }
        };

        let state = self.state.read().await;
        state.apply_workspace_scan(scanned);
        log::info!("Workspace initialization complete: {} files indexed", state.store.len());
    }

    async fn shutdown(&self) -> Result<()> {
        log::info!("pawnlens shutting down");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        {
            let mut state = self.state.write().await;
            state.open_document(
                uri.clone(),
                &params.text_document.text,
                Some(params.text_document.version),
            );
        }
        self.index_includes_of(&uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        {
            let mut state = self.state.write().await;
            for change in params.content_changes {
                state.apply_change(&uri, change);
            }
            if let Some(doc) = state.documents.get_mut(&uri) {
                doc.version = Some(params.text_document.version);
            }
        }
        self.index_includes_of(&uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let mut state = self.state.write().await;
        state.close_document(&params.text_document.uri);
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let Some(config) = parse_index_config(&params.settings) else {
            log::warn!("Failed to parse configuration from settings, keeping existing configuration");
            return;
        };

        let open_uris: Vec<Url> = {
            let mut state = self.state.write().await;
            if !state.set_config(config) {
                return;
            }
            state.documents.keys().cloned().collect()
        };

        // New search paths can reach files that were never loaded
        for uri in open_uris {
            self.index_includes_of(&uri).await;
        }
        self.client
            .log_message(MessageType::INFO, "pawnlens: include paths updated")
            .await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        log::trace!(
            "Received watched files change: {} changes",
            params.changes.len()
        );

        let state = self.state.read().await;
        for change in &params.changes {
            match change.typ {
                FileChangeType::CREATED | FileChangeType::CHANGED => {
                    state.file_changed_on_disk(&change.uri)
                }
                FileChangeType::DELETED => state.file_deleted(&change.uri),
                _ => {}
            }
        }
        // A created file may resolve includes that were dangling before
        if params
            .changes
            .iter()
            .any(|c| c.typ == FileChangeType::CREATED)
        {
            state.relink_all();
        }
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let state = self.state.read().await;
        Ok(handlers::document_symbol(&state, &params.text_document.uri))
    }

    async fn semantic_tokens_full(
        &self,
        params: SemanticTokensParams,
    ) -> Result<Option<SemanticTokensResult>> {
        let state = self.state.read().await;
        Ok(handlers::semantic_tokens_full(&state, &params.text_document.uri))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let state = self.state.read().await;
        Ok(handlers::completion(
            &state,
            &params.text_document_position.text_document.uri,
            params.text_document_position.position,
        ))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let state = self.state.read().await;
        Ok(handlers::hover(
            &state,
            &params.text_document_position_params.text_document.uri,
            params.text_document_position_params.position,
        ))
    }

    async fn signature_help(&self, params: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        let state = self.state.read().await;
        Ok(handlers::signature_help(
            &state,
            &params.text_document_position_params.text_document.uri,
            params.text_document_position_params.position,
        ))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let state = self.state.read().await;
        Ok(handlers::goto_definition(
            &state,
            &params.text_document_position_params.text_document.uri,
            params.text_document_position_params.position,
        ))
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let state = self.state.read().await;
        Ok(handlers::references(
            &state,
            &params.text_document_position.text_document.uri,
            params.text_document_position.position,
            params.context.include_declaration,
        ))
    }
}

pub async fn start_lsp() -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::build(Backend::new).finish();
    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_includes_indexed_off_runtime() {
        let dir = TempDir::new().unwrap();
        let inc = dir.path().join("helpers.inc");
        std::fs::write(&inc, "stock void Help() {}\n").unwrap();
        let main = Url::from_file_path(dir.path().join("main.sp")).unwrap();

        let state = Arc::new(RwLock::new(WorldState::new()));
        {
            let mut state = state.write().await;
            state.add_workspace_folder(Url::from_file_path(dir.path()).unwrap());
            state.open_document(main.clone(), "#include \"helpers\"\n", Some(1));
        }

        let indexed = index_includes_off_runtime(Arc::clone(&state), main.clone()).await;
        assert_eq!(indexed, 1);
        let state = state.read().await;
        assert!(state.store.contains(&Url::from_file_path(&inc).unwrap()));
    }

    #[test]
    fn test_parse_index_config_nested() {
        let settings = json!({
            "sourcepawn": {
                "includeDirectories": ["scripting/include", "/opt/sm/include", ""],
                "sourcemodHome": "/opt/sourcemod",
                "mainPath": "scripting/plugin.sp",
                "indexWorkspace": false,
                "maxFileSizeBytes": 1024
            }
        });
        let config = parse_index_config(&settings).unwrap();
        assert_eq!(
            config.include_dirs,
            vec![PathBuf::from("scripting/include"), PathBuf::from("/opt/sm/include")]
        );
        assert_eq!(config.sourcemod_home, Some(PathBuf::from("/opt/sourcemod")));
        assert_eq!(config.main_path, Some(PathBuf::from("scripting/plugin.sp")));
        assert!(!config.index_workspace);
        assert_eq!(config.max_file_size_bytes, 1024);
    }

    #[test]
    fn test_parse_index_config_top_level_and_defaults() {
        let config = parse_index_config(&json!({ "sourcemodHome": "" })).unwrap();
        assert_eq!(config.sourcemod_home, None);
        assert_eq!(config, IndexConfig::default());
    }

    #[test]
    fn test_parse_index_config_rejects_non_objects() {
        assert!(parse_index_config(&json!(null)).is_none());
        assert!(parse_index_config(&json!({ "sourcepawn": 3 })).is_none());
        assert!(parse_index_config(&json!({ "indexWorkspace": "yes" })).is_none());
    }
}
