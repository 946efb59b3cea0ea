//! Domain types shared by the indexer, store, search and cache.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub type DocumentId = String;

/// A document as handed over by a corpus source, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDocument {
    pub id: DocumentId,
    pub text: String,
}

impl RawDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into() }
    }
}

/// A corpus document with its normalized text.
///
/// - `id`: stable identifier (file name or external key)
/// - `raw_text`: content exactly as loaded
/// - `processed_text`: see [`normalize_text`]
///
/// Fields are private so a document cannot change after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    id: DocumentId,
    raw_text: String,
    processed_text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let processed_text = normalize_text(&raw_text);
        Self { id: id.into(), raw_text, processed_text }
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn raw_text(&self) -> &str { &self.raw_text }
    pub fn processed_text(&self) -> &str { &self.processed_text }
}

impl From<RawDocument> for Document {
    fn from(raw: RawDocument) -> Self { Document::new(raw.id, raw.text) }
}

/// Lowercase, turn `\n` into spaces, drop `\r`, trim.
pub fn normalize_text(raw: &str) -> String {
    raw.to_lowercase().replace('\n', " ").replace('\r', "").trim().to_string()
}

/// A document frequency threshold, either an absolute document count or a
/// proportion of the corpus size.
///
/// Deserializes untagged: integers become `Count`, floats become `Proportion`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocFrequency {
    Count(usize),
    Proportion(f64),
}

impl DocFrequency {
    pub fn validate(&self, name: &str) -> Result<()> {
        match *self {
            DocFrequency::Proportion(p) if !(0.0..=1.0).contains(&p) => {
                Err(Error::InvalidConfig(format!("{name} proportion must be within [0, 1], got {p}")))
            }
            _ => Ok(()),
        }
    }

    /// Resolve to an absolute document count for a corpus of `documents`.
    pub fn resolve(&self, documents: usize) -> f64 {
        match *self {
            DocFrequency::Count(n) => n as f64,
            DocFrequency::Proportion(p) => p * documents as f64,
        }
    }
}

impl fmt::Display for DocFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocFrequency::Count(n) => write!(f, "{n} docs"),
            DocFrequency::Proportion(p) => write!(f, "{:.0}%", p * 100.0),
        }
    }
}

/// Sparse row vector with strictly increasing column indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool { self.indices.is_empty() }
    pub fn nnz(&self) -> usize { self.indices.len() }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.indices.iter().zip(self.values.iter()).map(|(&i, &v)| (i as usize, v))
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }
}

/// One ranked retrieval result. Higher `score` is always better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub document_id: DocumentId,
    pub score: f32,
}

/// Identifies one persisted snapshot: its base directory and version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub path: PathBuf,
    pub version: String,
}

impl CacheKey {
    pub fn new(path: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self { path: path.into(), version: version.into() }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.path.display(), self.version)
    }
}
