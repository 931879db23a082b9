//! JSON-on-disk namespace store.
//!
//! One file per logical namespace. Object namespaces (`preferences`,
//! `context`) are pretty-printed JSON objects stamped with an `updated_at`
//! field on every save; array namespaces (`history`) are pretty-printed
//! JSON arrays written wholesale.
//!
//! Writes go through a temp-file-then-rename so a crashed writer never
//! leaves a truncated file behind. There is no cross-process locking:
//! concurrent writers race and the last rename wins. The store assumes a
//! single interactive session per memory directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::AppError;

/// Reserved key overwritten on every object-namespace save.
pub const UPDATED_AT_KEY: &str = "updated_at";

pub struct NamespaceStore {
    dir: PathBuf,
}

impl NamespaceStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: &Path) -> Result<Self, AppError> {
        fs::create_dir_all(dir)
            .map_err(|e| AppError::Memory(format!("cannot create {}: {e}", dir.display())))?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{namespace}.json"))
    }

    /// Load an object namespace. A missing file is an empty mapping;
    /// malformed JSON is surfaced to the caller, not recovered.
    pub fn load_object(&self, namespace: &str) -> Result<Map<String, Value>, AppError> {
        let path = self.path(namespace);
        match fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data)
                .map_err(|e| AppError::Memory(format!("malformed {}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(AppError::Memory(format!("cannot read {}: {e}", path.display()))),
        }
    }

    /// Overwrite an object namespace wholesale, stamping `updated_at` first.
    pub fn save_object(
        &self,
        namespace: &str,
        mut mapping: Map<String, Value>,
    ) -> Result<(), AppError> {
        mapping.insert(
            UPDATED_AT_KEY.to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
        self.write_pretty(namespace, &Value::Object(mapping))
    }

    /// Load an array namespace. Missing file → empty array.
    pub fn load_array(&self, namespace: &str) -> Result<Vec<Value>, AppError> {
        let path = self.path(namespace);
        match fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data)
                .map_err(|e| AppError::Memory(format!("malformed {}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(AppError::Memory(format!("cannot read {}: {e}", path.display()))),
        }
    }

    /// Overwrite an array namespace wholesale.
    pub fn save_array(&self, namespace: &str, items: Vec<Value>) -> Result<(), AppError> {
        self.write_pretty(namespace, &Value::Array(items))
    }

    fn write_pretty(&self, namespace: &str, value: &Value) -> Result<(), AppError> {
        let data = serde_json::to_string_pretty(value)
            .map_err(|e| AppError::Memory(format!("serialise {namespace}: {e}")))?;
        let path = self.path(namespace);
        write_atomic(&path, data.as_bytes())
    }
}

/// Write `data` to `<path>.tmp`, then rename over `path`.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), AppError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)
        .map_err(|e| AppError::Memory(format!("cannot write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path)
        .map_err(|e| AppError::Memory(format!("cannot rename {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, NamespaceStore) {
        let dir = TempDir::new().unwrap();
        let store = NamespaceStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn missing_namespace_loads_empty() {
        let (_dir, store) = setup();
        assert!(store.load_object("preferences").unwrap().is_empty());
        assert!(store.load_array("history").unwrap().is_empty());
    }

    #[test]
    fn save_stamps_updated_at() {
        let (_dir, store) = setup();
        let mut m = Map::new();
        m.insert("language".into(), json!("Chinese"));
        store.save_object("preferences", m).unwrap();

        let loaded = store.load_object("preferences").unwrap();
        assert_eq!(loaded.get("language"), Some(&json!("Chinese")));
        assert!(loaded.contains_key(UPDATED_AT_KEY));
    }

    #[test]
    fn save_overwrites_wholesale() {
        let (_dir, store) = setup();
        let mut m = Map::new();
        m.insert("a".into(), json!(1));
        store.save_object("context", m).unwrap();

        let mut m2 = Map::new();
        m2.insert("b".into(), json!(2));
        store.save_object("context", m2).unwrap();

        let loaded = store.load_object("context").unwrap();
        assert!(!loaded.contains_key("a"));
        assert_eq!(loaded.get("b"), Some(&json!(2)));
    }

    #[test]
    fn malformed_json_errors() {
        let (dir, store) = setup();
        std::fs::write(dir.path().join("preferences.json"), "{not json").unwrap();
        let err = store.load_object("preferences").unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn array_round_trip() {
        let (_dir, store) = setup();
        store
            .save_array("history", vec![json!({"role": "user"}), json!({"role": "assistant"})])
            .unwrap();
        let loaded = store.load_array("history").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0]["role"], "user");
    }

    #[test]
    fn no_tmp_file_left_behind() {
        let (dir, store) = setup();
        store.save_object("preferences", Map::new()).unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
