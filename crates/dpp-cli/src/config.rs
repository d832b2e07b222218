use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use dpp_engine::EngineConfig;
use dpp_ledger::{FeedLedger, InMemoryLedger, LedgerClient};
use dpp_server::ServerConfig;
use dpp_store::{CursorStore, DocumentStore, FileCursorStore, FileDocumentStore};
use serde::{Deserialize, Serialize};

/// Configuration file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "dpp.toml";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root for passports (`panels/`) and the cursor file.
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl StoreConfig {
    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir.join("panels")
    }

    pub fn cursor_file(&self) -> PathBuf {
        self.data_dir.join("cursors.json")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    /// NDJSON event feed plus NDJSON anchor journal.
    Feed,
    /// Empty in-process ledger; useful for read-only deployments.
    Memory,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub kind: LedgerKind,
    /// Cursor key; change it when pointing at a different chain or contract.
    pub source_id: String,
    pub events_path: PathBuf,
    pub anchors_path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            kind: LedgerKind::Feed,
            source_id: "local-feed".into(),
            events_path: PathBuf::from("data/events.ndjson"),
            anchors_path: PathBuf::from("data/anchors.ndjson"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub store: StoreConfig,
    pub ledger: LedgerConfig,
}

impl AppConfig {
    /// Load from `path`, else from `./dpp.toml` if present, else defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => PathBuf::from(DEFAULT_CONFIG_FILE),
            None => return Ok(Self::default()),
        };
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn document_store(&self) -> anyhow::Result<Arc<dyn DocumentStore>> {
        let dir = self.store.documents_dir();
        let store = FileDocumentStore::open(&dir)
            .with_context(|| format!("opening document store {}", dir.display()))?;
        Ok(Arc::new(store))
    }

    pub fn cursor_store(&self) -> anyhow::Result<Arc<dyn CursorStore>> {
        let path = self.store.cursor_file();
        let store = FileCursorStore::open(&path)
            .with_context(|| format!("opening cursor store {}", path.display()))?;
        Ok(Arc::new(store))
    }

    pub fn ledger(&self) -> Arc<dyn LedgerClient> {
        match self.ledger.kind {
            LedgerKind::Feed => Arc::new(FeedLedger::new(
                self.ledger.source_id.clone(),
                self.ledger.events_path.clone(),
                self.ledger.anchors_path.clone(),
            )),
            LedgerKind::Memory => Arc::new(InMemoryLedger::new(self.ledger.source_id.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server.bind_addr.port(), 8000);
        assert_eq!(config.engine.batch_size, 100);
    }

    #[test]
    fn sections_override_independently() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            bind_addr = "0.0.0.0:9000"

            [engine]
            poll_interval_ms = 500
            anchor_max_attempts = 8

            [engine.fetch_backoff]
            max_ms = 10000

            [store]
            data_dir = "/var/lib/dpp"

            [ledger]
            kind = "memory"
            source_id = "sepolia:0x59b6"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind_addr.port(), 9000);
        assert!(config.server.cors);
        assert_eq!(config.engine.poll_interval_ms, 500);
        assert_eq!(config.engine.anchor_max_attempts, 8);
        assert_eq!(config.engine.fetch_backoff.max_ms, 10_000);
        assert_eq!(config.engine.fetch_backoff.base_ms, 500);
        assert_eq!(config.store.documents_dir(), PathBuf::from("/var/lib/dpp/panels"));
        assert_eq!(config.ledger.kind, LedgerKind::Memory);
        assert_eq!(config.ledger.events_path, PathBuf::from("data/events.ndjson"));
    }

    #[test]
    fn unknown_ledger_kind_is_rejected() {
        assert!(AppConfig::from_toml("[ledger]\nkind = \"carrier-pigeon\"").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn stores_open_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            store: StoreConfig {
                data_dir: dir.path().to_path_buf(),
            },
            ..AppConfig::default()
        };
        let store = config.document_store().unwrap();
        assert!(store.list_ids().unwrap().is_empty());
        assert!(dir.path().join("panels").is_dir());
        assert_eq!(config.cursor_store().unwrap().load("x").unwrap(), None);
        assert_eq!(config.ledger().source_id(), "local-feed");
    }
}
