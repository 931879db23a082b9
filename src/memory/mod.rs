//! Long-term memory for the assistant.
//!
//! Three file-backed namespaces under one memory directory:
//! - `preferences.json` — stated user preferences, keyed object
//! - `context.json`     — background facts, keyed object
//! - `history.json`     — append-only conversation log, array
//!
//! [`MemoryManager::summary`] renders the whole store as a Markdown block
//! for direct injection into a system prompt. The heading text and bullet
//! format are part of the contract — downstream prompts depend on them.

pub mod store;

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;
use store::{NamespaceStore, UPDATED_AT_KEY, write_atomic};

const PREFERENCES_NS: &str = "preferences";
const CONTEXT_NS: &str = "context";
const HISTORY_NS: &str = "history";

/// Who produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Assistant,
}

/// One conversation turn in the append-only log. Never mutated or removed
/// once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub role: HistoryRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// On-disk shape of an export file.
#[derive(Debug, Serialize, Deserialize)]
struct ExportFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preferences: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    history: Option<Vec<Value>>,
    exported_at: String,
}

pub struct MemoryManager {
    store: NamespaceStore,
}

impl MemoryManager {
    /// Open (creating if necessary) the memory directory.
    pub fn open(dir: &Path) -> Result<Self, AppError> {
        Ok(Self { store: NamespaceStore::open(dir)? })
    }

    pub fn dir(&self) -> &Path {
        self.store.dir()
    }

    // ── Preferences ───────────────────────────────────────────────────

    pub fn save_preference(&self, key: &str, value: Value) -> Result<(), AppError> {
        let mut prefs = self.store.load_object(PREFERENCES_NS)?;
        prefs.insert(key.to_string(), value);
        self.store.save_object(PREFERENCES_NS, prefs)
    }

    pub fn get_preference(&self, key: &str) -> Result<Option<Value>, AppError> {
        Ok(self.store.load_object(PREFERENCES_NS)?.get(key).cloned())
    }

    // ── Context ───────────────────────────────────────────────────────

    pub fn save_context(&self, key: &str, value: Value) -> Result<(), AppError> {
        let mut ctx = self.store.load_object(CONTEXT_NS)?;
        ctx.insert(key.to_string(), value);
        self.store.save_object(CONTEXT_NS, ctx)
    }

    pub fn get_context(&self, key: &str) -> Result<Option<Value>, AppError> {
        Ok(self.store.load_object(CONTEXT_NS)?.get(key).cloned())
    }

    pub fn get_all_context(&self) -> Result<Map<String, Value>, AppError> {
        self.store.load_object(CONTEXT_NS)
    }

    // ── History ───────────────────────────────────────────────────────

    /// Append one turn to the on-disk log. Read-everything, append,
    /// write-everything — O(total history) per call, acceptable for a log
    /// expected to stay under a few thousand entries.
    pub fn add_to_history(
        &self,
        role: HistoryRole,
        content: &str,
        metadata: Option<Value>,
    ) -> Result<(), AppError> {
        let mut history = self.store.load_array(HISTORY_NS)?;
        let entry = HistoryEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            role,
            content: content.to_string(),
            metadata,
        };
        history.push(
            serde_json::to_value(entry)
                .map_err(|e| AppError::Memory(format!("serialise history entry: {e}")))?,
        );
        self.store.save_array(HISTORY_NS, history)
    }

    /// Return history entries, oldest first; `limit` keeps only the most
    /// recent N.
    pub fn get_history(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>, AppError> {
        let raw = self.store.load_array(HISTORY_NS)?;
        let mut entries = Vec::with_capacity(raw.len());
        for value in raw {
            entries.push(
                serde_json::from_value(value)
                    .map_err(|e| AppError::Memory(format!("malformed history entry: {e}")))?,
            );
        }
        if let Some(n) = limit {
            let start = entries.len().saturating_sub(n);
            entries.drain(..start);
        }
        Ok(entries)
    }

    // ── Summary ───────────────────────────────────────────────────────

    /// Render the store for system-prompt injection.
    ///
    /// Empty namespaces omit their section header; the history count line is
    /// always present.
    pub fn summary(&self) -> Result<String, AppError> {
        let prefs = self.store.load_object(PREFERENCES_NS)?;
        let ctx = self.store.load_object(CONTEXT_NS)?;
        let history_len = self.store.load_array(HISTORY_NS)?.len();

        let mut out = String::from("## Your Long-Term Memory\n\n");

        if !prefs.is_empty() {
            out.push_str("### User Preferences\n");
            push_bullets(&mut out, &prefs);
            out.push('\n');
        }

        if !ctx.is_empty() {
            out.push_str("### Context Information\n");
            push_bullets(&mut out, &ctx);
            out.push('\n');
        }

        out.push_str(&format!(
            "### Conversation History\n- Total messages: {history_len}\n"
        ));

        Ok(out)
    }

    // ── Export / import ───────────────────────────────────────────────

    /// Write the whole store to a single JSON document at `path`.
    pub fn export(&self, path: &Path) -> Result<(), AppError> {
        let export = ExportFile {
            preferences: Some(self.store.load_object(PREFERENCES_NS)?),
            context: Some(self.store.load_object(CONTEXT_NS)?),
            history: Some(self.store.load_array(HISTORY_NS)?),
            exported_at: chrono::Utc::now().to_rfc3339(),
        };
        let data = serde_json::to_string_pretty(&export)
            .map_err(|e| AppError::Memory(format!("serialise export: {e}")))?;
        write_atomic(path, data.as_bytes())
    }

    /// Restore namespaces from an export file. Only the keys present in the
    /// file are replaced.
    pub fn import(&self, path: &Path) -> Result<(), AppError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| AppError::Memory(format!("cannot read {}: {e}", path.display())))?;
        let export: ExportFile = serde_json::from_str(&data)
            .map_err(|e| AppError::Memory(format!("malformed {}: {e}", path.display())))?;

        if let Some(mut prefs) = export.preferences {
            prefs.remove(UPDATED_AT_KEY);
            self.store.save_object(PREFERENCES_NS, prefs)?;
        }
        if let Some(mut ctx) = export.context {
            ctx.remove(UPDATED_AT_KEY);
            self.store.save_object(CONTEXT_NS, ctx)?;
        }
        if let Some(history) = export.history {
            self.store.save_array(HISTORY_NS, history)?;
        }
        Ok(())
    }
}

/// `- key: value` lines, reserved `updated_at` skipped. Strings render bare,
/// everything else as compact JSON.
fn push_bullets(out: &mut String, mapping: &Map<String, Value>) {
    for (key, value) in mapping {
        if key == UPDATED_AT_KEY {
            continue;
        }
        match value {
            Value::String(s) => out.push_str(&format!("- {key}: {s}\n")),
            other => out.push_str(&format!("- {key}: {other}\n")),
        }
    }
}
