//! File-backed stores: one pretty-printed JSON file per document.
//!
//! Writes go to a temporary file in the same directory and are renamed into
//! place, so a crash leaves either the old or the new file, never a torn one.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dpp_types::{Document, Position};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{CursorStore, DocumentStore, Mutation};

/// Document store keeping `<root>/<entity_id>.json` per passport.
///
/// Updates take a per-entity lock, then compare the on-disk `version` with the
/// one they read before renaming the new file into place. A writer outside
/// this process that bumped the version in between yields
/// [`StoreError::Conflict`].
#[derive(Debug)]
pub struct FileDocumentStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileDocumentStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, entity_id: &str) -> StoreResult<PathBuf> {
        let valid = !entity_id.is_empty()
            && entity_id != "."
            && entity_id != ".."
            && entity_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StoreError::InvalidId(entity_id.to_string()));
        }
        Ok(self.root.join(format!("{entity_id}.json")))
    }

    fn entity_lock(&self, entity_id: &str) -> StoreResult<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(Arc::clone(locks.entry(entity_id.to_string()).or_default()))
    }

    fn read_document(&self, path: &Path, entity_id: &str) -> StoreResult<Document> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(entity_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))
    }

    fn write_document(&self, path: &Path, document: &Document) -> StoreResult<()> {
        write_json_atomically(&self.root, path, document)
    }
}

impl DocumentStore for FileDocumentStore {
    fn get(&self, entity_id: &str) -> StoreResult<Document> {
        let path = self.path_for(entity_id)?;
        self.read_document(&path, entity_id)
    }

    fn insert(&self, mut document: Document) -> StoreResult<Document> {
        let path = self.path_for(&document.entity_id)?;
        let lock = self.entity_lock(&document.entity_id)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned)?;

        if path.exists() {
            return Err(StoreError::AlreadyExists(document.entity_id));
        }
        document.version = 1;
        self.write_document(&path, &document)?;
        debug!(entity_id = %document.entity_id, "document registered");
        Ok(document)
    }

    fn atomic_update(&self, entity_id: &str, mutation: &mut Mutation<'_>) -> StoreResult<Document> {
        let path = self.path_for(entity_id)?;
        let lock = self.entity_lock(entity_id)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned)?;

        let current = self.read_document(&path, entity_id)?;
        let mut next = current.clone();
        mutation(&mut next)?;
        next.entity_id = current.entity_id.clone();
        next.version = current.version + 1;

        let on_disk = self.read_document(&path, entity_id)?;
        if on_disk.version != current.version {
            return Err(StoreError::Conflict {
                entity_id: entity_id.to_string(),
                expected: current.version,
                found: on_disk.version,
            });
        }

        self.write_document(&path, &next)?;
        debug!(entity_id, version = next.version, "document updated");
        Ok(next)
    }

    fn list_ids(&self) -> StoreResult<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn exists(&self, entity_id: &str) -> StoreResult<bool> {
        Ok(self.path_for(entity_id)?.exists())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct CursorRecord {
    block: u64,
    log_index: u64,
    updated_at: DateTime<Utc>,
}

/// Cursor positions for all sources in a single JSON file.
#[derive(Debug)]
pub struct FileCursorStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCursorStore {
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    fn read_all(&self) -> StoreResult<BTreeMap<String, CursorRecord>> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Serialization(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self, source_id: &str) -> StoreResult<Option<Position>> {
        let _guard = self.lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(self
            .read_all()?
            .get(source_id)
            .map(|r| Position::new(r.block, r.log_index)))
    }

    fn save(&self, source_id: &str, position: Position) -> StoreResult<()> {
        let _guard = self.lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut all = self.read_all()?;
        all.insert(
            source_id.to_string(),
            CursorRecord {
                block: position.block,
                log_index: position.log_index,
                updated_at: Utc::now(),
            },
        );
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        write_json_atomically(&dir, &self.path, &all)
    }
}

fn write_json_atomically<T: Serialize>(dir: &Path, path: &Path, value: &T) -> StoreResult<()> {
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpp_types::{SectionRecord, Tier, OPERATION_LOG};

    fn temp_store() -> (tempfile::TempDir, FileDocumentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::open(dir.path().join("panels")).unwrap();
        (dir, store)
    }

    #[test]
    fn insert_get_and_list() {
        let (_dir, store) = temp_store();
        store
            .insert(Document::new("P1").with_section(OPERATION_LOG, SectionRecord::log(Tier::Tier2)))
            .unwrap();
        store.insert(Document::new("P2")).unwrap();

        let doc = store.get("P1").unwrap();
        assert_eq!(doc.version, 1);
        assert!(doc.section(OPERATION_LOG).is_some());
        assert_eq!(store.list_ids().unwrap(), vec!["P1".to_string(), "P2".to_string()]);
    }

    #[test]
    fn update_survives_reopen() {
        let (dir, store) = temp_store();
        store.insert(Document::new("P1")).unwrap();
        store
            .atomic_update("P1", &mut |doc| {
                doc.sections
                    .insert("notes".into(), SectionRecord::log(Tier::Tier1));
                Ok(())
            })
            .unwrap();

        let reopened = FileDocumentStore::open(dir.path().join("panels")).unwrap();
        let doc = reopened.get("P1").unwrap();
        assert_eq!(doc.version, 2);
        assert!(doc.section("notes").is_some());
    }

    #[test]
    fn external_write_during_update_is_a_conflict() {
        let (_dir, store) = temp_store();
        store.insert(Document::new("P1")).unwrap();
        let path = store.path_for("P1").unwrap();

        let result = store.atomic_update("P1", &mut |doc| {
            let mut external = doc.clone();
            external.version += 1;
            fs::write(&path, serde_json::to_vec(&external).unwrap()).unwrap();
            doc.warnings.clear();
            Ok(())
        });

        assert!(matches!(result, Err(StoreError::Conflict { expected: 1, found: 2, .. })));
    }

    #[test]
    fn path_traversal_ids_are_rejected() {
        let (_dir, store) = temp_store();
        assert!(matches!(store.get("../etc"), Err(StoreError::InvalidId(_))));
        assert!(matches!(store.get(""), Err(StoreError::InvalidId(_))));
    }

    #[test]
    fn missing_document_is_not_found() {
        let (_dir, store) = temp_store();
        assert!(matches!(store.get("ghost"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn cursor_file_persists_per_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("cursors.json");
        let cursors = FileCursorStore::open(&path).unwrap();
        cursors.save("sepolia", Position::new(10, 1)).unwrap();
        cursors.save("local", Position::new(2, 0)).unwrap();

        let reopened = FileCursorStore::open(&path).unwrap();
        assert_eq!(reopened.load("sepolia").unwrap(), Some(Position::new(10, 1)));
        assert_eq!(reopened.load("local").unwrap(), Some(Position::new(2, 0)));
        assert_eq!(reopened.load("other").unwrap(), None);
    }
}
