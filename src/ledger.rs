//! Persisted record of imported files (`duplicados.json`) and of hashes the user
//! deleted on purpose (`eliminados.json`).

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One imported file. Field names match the files read by the map renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub hash: String,
    #[serde(rename = "ruta")]
    pub destination_path: String,
    #[serde(rename = "ubicacion")]
    pub place_label: String,
    #[serde(rename = "fecha")]
    pub date_label: String,
    #[serde(rename = "latitud", default)]
    pub latitude: Option<f64>,
    #[serde(rename = "longitud", default)]
    pub longitude: Option<f64>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Record<'a> {
    Entry(&'a LedgerEntry),
    Raw(&'a Value),
}

#[derive(Debug)]
pub struct Ledger {
    duplicates_path: PathBuf,
    deleted_path: PathBuf,
    entries: Vec<LedgerEntry>,
    known: HashSet<String>,
    deleted: Vec<String>,
    deleted_set: HashSet<String>,
    /// Elements that failed validation on load; written back untouched.
    quarantined: Vec<Value>,
}

impl Ledger {
    /// Missing files are a first run and load as empty collections.
    pub fn load(duplicates_path: &Path, deleted_path: &Path) -> Result<Self, AppError> {
        let mut ledger = Ledger {
            duplicates_path: duplicates_path.to_path_buf(),
            deleted_path: deleted_path.to_path_buf(),
            entries: Vec::new(),
            known: HashSet::new(),
            deleted: Vec::new(),
            deleted_set: HashSet::new(),
            quarantined: Vec::new(),
        };

        for value in read_array(duplicates_path)? {
            match serde_json::from_value::<LedgerEntry>(value.clone()) {
                Ok(entry) if ledger.known.contains(&entry.hash) => {
                    log::warn!(
                        "Quarantining repeated ledger hash {} in {:?}",
                        entry.hash,
                        duplicates_path
                    );
                    ledger.quarantined.push(value);
                }
                Ok(entry) => {
                    ledger.known.insert(entry.hash.clone());
                    ledger.entries.push(entry);
                }
                Err(e) => {
                    log::warn!("Quarantining malformed ledger entry {}: {}", value, e);
                    ledger.quarantined.push(value);
                }
            }
        }

        for value in read_array(deleted_path)? {
            match value {
                Value::String(hash) => {
                    if ledger.deleted_set.insert(hash.clone()) {
                        ledger.deleted.push(hash);
                    }
                }
                other => {
                    return Err(AppError::LedgerCorrupt {
                        path: deleted_path.to_path_buf(),
                        reason: format!("expected hash string, found {}", other),
                    })
                }
            }
        }

        log::info!(
            "Ledger loaded: {} imported, {} deleted, {} quarantined.",
            ledger.entries.len(),
            ledger.deleted.len(),
            ledger.quarantined.len()
        );
        Ok(ledger)
    }

    pub fn is_new_hash(&self, hash: &str) -> bool {
        !self.known.contains(hash)
    }

    pub fn is_deleted(&self, hash: &str) -> bool {
        self.deleted_set.contains(hash)
    }

    /// Adds an entry in memory. Returns false, leaving the ledger unchanged, if the hash is known.
    pub fn append(&mut self, entry: LedgerEntry) -> bool {
        if !self.known.insert(entry.hash.clone()) {
            log::warn!("Refusing second ledger entry for hash {}", entry.hash);
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn quarantined(&self) -> &[Value] {
        &self.quarantined
    }

    /// Overwrites both files with the in-memory collections.
    pub fn flush(&self) -> Result<(), AppError> {
        let duplicates: Vec<Record<'_>> = self
            .entries
            .iter()
            .map(Record::Entry)
            .chain(self.quarantined.iter().map(Record::Raw))
            .collect();

        write_pretty(&self.duplicates_path, &duplicates)?;
        write_pretty(&self.deleted_path, &self.deleted)?;
        log::debug!(
            "Ledger flushed to {:?} and {:?}",
            self.duplicates_path,
            self.deleted_path
        );
        Ok(())
    }
}

fn read_array(path: &Path) -> Result<Vec<Value>, AppError> {
    if !path.exists() {
        log::debug!("No ledger file at {:?}, starting empty", path);
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Array(values)) => Ok(values),
        Ok(other) => Err(AppError::LedgerCorrupt {
            path: path.to_path_buf(),
            reason: format!("expected a JSON array, found {}", kind_of(&other)),
        }),
        Err(e) => Err(AppError::LedgerCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Sibling file a ledger is written to before it replaces the real one.
fn pending_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes to a sibling file and renames it over `path`, so a failed write
/// leaves the previous contents in place.
fn write_pretty<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    out.push(b'\n');

    let tmp = pending_path(path);
    let written = std::fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(&out)?;
        file.sync_all()
    });
    if let Err(e) = written {
        if tmp.is_file() {
            let _ = std::fs::remove_file(&tmp);
        }
        return Err(e.into());
    }
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        AppError::from(e)
    })?;
    Ok(())
}
