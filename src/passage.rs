//! Passage records and the positionally aligned metadata store.

use std::fs;
use std::ops::Index;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RagError;

/// A retrievable passage: where it came from plus its body text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageRecord {
    /// Source identifier (statute section, document name, ...).
    pub source: String,
    /// Passage body.
    pub text: String,
}

impl PassageRecord {
    /// Builds a record from its parts.
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// Ordered passage sequence; position `i` pairs with vector `i` in the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataStore {
    records: Vec<PassageRecord>,
}

impl MetadataStore {
    /// Wraps an already ordered list of records.
    pub fn from_records(records: Vec<PassageRecord>) -> Self {
        Self { records }
    }

    /// Reads a metadata artifact from disk.
    ///
    /// The file is JSON Lines (one record per non-blank line) unless it starts
    /// with `[`, in which case it is parsed as one JSON array.
    pub fn load(path: &Path) -> Result<Self, RagError> {
        let raw = fs::read_to_string(path)
            .map_err(|err| RagError::index_unavailable(path, format!("read failed: {err}")))?;
        Self::parse(&raw).map_err(|reason| RagError::index_unavailable(path, reason))
    }

    fn parse(raw: &str) -> Result<Self, String> {
        if raw.trim_start().starts_with('[') {
            let records: Vec<PassageRecord> =
                serde_json::from_str(raw).map_err(|err| format!("invalid metadata array: {err}"))?;
            return Ok(Self { records });
        }
        let mut records = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: PassageRecord = serde_json::from_str(line)
                .map_err(|err| format!("invalid metadata record at line {}: {err}", line_no + 1))?;
            records.push(record);
        }
        Ok(Self { records })
    }

    /// Writes the store as JSON Lines.
    pub fn save(&self, path: &Path) -> Result<(), RagError> {
        let mut out = String::new();
        for record in &self.records {
            let line = serde_json::to_string(record)
                .map_err(|err| RagError::index_unavailable(path, err))?;
            out.push_str(&line);
            out.push('\n');
        }
        fs::write(path, out).map_err(|err| RagError::index_unavailable(path, err))
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at `position`, or `None` when out of range.
    pub fn get(&self, position: usize) -> Option<&PassageRecord> {
        self.records.get(position)
    }

}

impl Index<usize> for MetadataStore {
    type Output = PassageRecord;

    fn index(&self, position: usize) -> &Self::Output {
        &self.records[position]
    }
}
