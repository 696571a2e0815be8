//! JSON-document persistence over a minimal key-value backend.
//!
//! The entry list and the goal set each live as one JSON document under a
//! fixed key. Documents are validated on the way in: callers only ever see
//! typed [`Entry`] and [`GoalSet`] values.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::models::{ENTRIES_KEY, ENTRIES_REJECTED_KEY, Entry, GOALS_KEY, GoalSet};

/// String-keyed storage of string values.
///
/// Single-threaded by design: one foreground session reads and writes.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Returns whether a value was present.
    fn remove(&self, key: &str) -> Result<bool>;
}

// --- SQLite backend ---

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open journal database: {}", path.display()))?;
        let store = SqliteStore { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteStore { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("Failed to read '{key}'"))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .with_context(|| format!("Failed to write '{key}'"))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let changes = self
            .conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .with_context(|| format!("Failed to remove '{key}'"))?;
        Ok(changes > 0)
    }
}

// --- In-memory backend ---

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.values.borrow_mut().remove(key).is_some())
    }
}

// --- Decoding ---

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("document is not valid JSON")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON {expected}, found {found}")]
    Shape {
        expected: &'static str,
        found: &'static str,
    },
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A stored record that could not be read as an [`Entry`].
#[derive(Debug)]
pub struct RejectedRecord {
    pub index: usize,
    pub raw: Value,
    pub error: serde_json::Error,
}

/// A decoded entry list: the usable entries plus the records that were not.
#[derive(Debug, Default)]
pub struct EntryDocument {
    pub entries: Vec<Entry>,
    pub rejected: Vec<RejectedRecord>,
}

/// Decode a stored entry list record by record. Fields are coerced leniently;
/// a record without a usable `id` or `date` is set aside in `rejected`.
/// Only a document that is not a JSON array fails as a whole.
pub fn decode_entries(raw: &str) -> Result<EntryDocument, DecodeError> {
    let items = match serde_json::from_str::<Value>(raw)? {
        Value::Array(items) => items,
        other => {
            return Err(DecodeError::Shape {
                expected: "array",
                found: kind_of(&other),
            });
        }
    };
    let mut doc = EntryDocument::default();
    for (index, item) in items.into_iter().enumerate() {
        match Entry::deserialize(&item) {
            Ok(entry) => doc.entries.push(entry),
            Err(error) => doc.rejected.push(RejectedRecord {
                index,
                raw: item,
                error,
            }),
        }
    }
    Ok(doc)
}

/// Decode a stored goal set; missing or invalid fields take their defaults.
pub fn decode_goals(raw: &str) -> Result<GoalSet, DecodeError> {
    let value = serde_json::from_str::<Value>(raw)?;
    if !value.is_object() {
        return Err(DecodeError::Shape {
            expected: "object",
            found: kind_of(&value),
        });
    }
    Ok(serde_json::from_value(value)?)
}

fn error_chain(e: DecodeError) -> String {
    format!("{:#}", anyhow::Error::new(e))
}

// --- Typed stores ---

/// Outcome of [`EntryStore::repair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RepairReport {
    /// Entries still in the journal.
    pub kept: usize,
    /// Unreadable records moved aside.
    pub discarded: usize,
    /// The whole document was unreadable and has been moved aside.
    pub reset: bool,
}

/// The journal's entry list, newest first.
///
/// Records that fail to decode are hidden from readers but kept in place by
/// every write, until [`repair`](Self::repair) moves them aside.
pub struct EntryStore<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: KeyValueStore + ?Sized> EntryStore<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    fn document(&self) -> Result<Option<Result<EntryDocument, DecodeError>>> {
        let raw = self.store.get(ENTRIES_KEY)?;
        Ok(raw.map(|raw| {
            let decoded = decode_entries(&raw);
            if let Ok(doc) = &decoded {
                for record in &doc.rejected {
                    warn!(
                        key = ENTRIES_KEY,
                        index = record.index,
                        error = %record.error,
                        "skipping unreadable entry record"
                    );
                }
            }
            decoded
        }))
    }

    fn document_strict(&self) -> Result<EntryDocument> {
        match self.document()? {
            None => Ok(EntryDocument::default()),
            Some(decoded) => decoded.map_err(anyhow::Error::new).with_context(|| {
                format!(
                    "Stored entry list under '{ENTRIES_KEY}' is corrupt; refusing to overwrite it (run `repair --force` to move it aside)"
                )
            }),
        }
    }

    /// All readable entries. Unreadable records are skipped with a warning;
    /// a document that is not a JSON array is logged and read as empty.
    pub fn load(&self) -> Result<Vec<Entry>> {
        match self.document()? {
            None => Ok(Vec::new()),
            Some(Ok(doc)) => {
                debug!(count = doc.entries.len(), "loaded entries");
                Ok(doc.entries)
            }
            Some(Err(e)) => {
                warn!(
                    key = ENTRIES_KEY,
                    error = %error_chain(e),
                    "ignoring undecodable entry list"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Like [`load`](Self::load), but a document that is not a JSON array is
    /// an error.
    pub fn load_strict(&self) -> Result<Vec<Entry>> {
        Ok(self.document_strict()?.entries)
    }

    fn write(&self, entries: &[Entry], rejected: &[RejectedRecord]) -> Result<()> {
        let mut values = entries
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()
            .context("Failed to encode entries")?;
        values.extend(rejected.iter().map(|r| r.raw.clone()));
        let raw = serde_json::to_string(&values).context("Failed to encode entries")?;
        self.store.set(ENTRIES_KEY, &raw)?;
        debug!(
            count = entries.len(),
            unreadable = rejected.len(),
            "stored entries"
        );
        Ok(())
    }

    /// Persist exactly `entries`, dropping anything stored before.
    pub fn replace_all(&self, entries: &[Entry]) -> Result<()> {
        self.write(entries, &[])
    }

    /// Insert `entries` ahead of everything already stored, keeping their order.
    pub fn prepend(&self, mut entries: Vec<Entry>) -> Result<()> {
        let doc = self.document_strict()?;
        entries.extend(doc.entries);
        self.write(&entries, &doc.rejected)
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut doc = self.document_strict()?;
        let before = doc.entries.len();
        doc.entries.retain(|e| e.id != id);
        if doc.entries.len() == before {
            return Ok(false);
        }
        self.write(&doc.entries, &doc.rejected)?;
        info!(id, "deleted entry");
        Ok(true)
    }

    pub fn get(&self, id: &str) -> Result<Option<Entry>> {
        Ok(self.load()?.into_iter().find(|e| e.id == id))
    }

    /// Move unreadable data under [`ENTRIES_REJECTED_KEY`] and keep only the
    /// readable entries. A document that is not a JSON array is moved aside
    /// as a whole, but only with `force`.
    pub fn repair(&self, force: bool) -> Result<RepairReport> {
        let Some(raw) = self.store.get(ENTRIES_KEY)? else {
            return Ok(RepairReport::default());
        };
        match decode_entries(&raw) {
            Ok(doc) => {
                let report = RepairReport {
                    kept: doc.entries.len(),
                    discarded: doc.rejected.len(),
                    reset: false,
                };
                if doc.rejected.is_empty() {
                    return Ok(report);
                }
                let aside: Vec<Value> = doc.rejected.into_iter().map(|r| r.raw).collect();
                let aside = serde_json::to_string(&aside).context("Failed to encode records")?;
                self.store.set(ENTRIES_REJECTED_KEY, &aside)?;
                self.write(&doc.entries, &[])?;
                info!(
                    kept = report.kept,
                    discarded = report.discarded,
                    "repaired entry list"
                );
                Ok(report)
            }
            Err(e) => {
                if !force {
                    return Err(anyhow::Error::new(e)).with_context(|| {
                        format!(
                            "Stored entry list under '{ENTRIES_KEY}' is unreadable; pass --force to move it aside"
                        )
                    });
                }
                self.store.set(ENTRIES_REJECTED_KEY, &raw)?;
                self.store.remove(ENTRIES_KEY)?;
                warn!(
                    key = ENTRIES_KEY,
                    backup = ENTRIES_REJECTED_KEY,
                    "moved unreadable entry list aside"
                );
                Ok(RepairReport {
                    kept: 0,
                    discarded: 0,
                    reset: true,
                })
            }
        }
    }
}

/// The single active goal set.
pub struct GoalStore<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: KeyValueStore + ?Sized> GoalStore<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Stored goals, or the defaults when none are stored or they cannot be read.
    pub fn load(&self) -> Result<GoalSet> {
        let Some(raw) = self.store.get(GOALS_KEY)? else {
            return Ok(GoalSet::default());
        };
        Ok(decode_goals(&raw).unwrap_or_else(|e| {
            warn!(
                key = GOALS_KEY,
                error = %error_chain(e),
                "ignoring undecodable goals, using defaults"
            );
            GoalSet::default()
        }))
    }

    pub fn save(&self, goals: &GoalSet) -> Result<()> {
        let raw = serde_json::to_string(goals).context("Failed to encode goals")?;
        self.store.set(GOALS_KEY, &raw)?;
        info!(calories = goals.calories, "saved goals");
        Ok(())
    }

    /// Drop the stored goals so the defaults apply again.
    pub fn reset(&self) -> Result<bool> {
        self.store.remove(GOALS_KEY)
    }
}
