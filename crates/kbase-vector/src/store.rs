//! Versioned on-disk snapshots.
//!
//! A snapshot is four JSON artifacts under one base directory:
//! `term_model_<v>.json`, `reducer_model_<v>.json`, `embeddings_<v>.json` and
//! `document_ids_<v>.json`. Each file starts with a header line
//! `kbase-artifact/1 <kind> <xxh64>` whose checksum covers the payload that
//! follows. Files are written to a temp file in the same directory, synced and
//! renamed into place, so readers never see a partial artifact.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::hash::Hasher;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use twox_hash::XxHash64;

use kbase_core::error::{Error, Result};
use kbase_core::types::DocumentId;
use kbase_embed::{EmbeddingMatrix, Reducer};
use kbase_text::TermModel;

use crate::snapshot::{IndexedCorpus, Snapshot};

const HEADER_MAGIC: &str = "kbase-artifact/1";
const EXTENSION: &str = "json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    TermModel,
    ReducerModel,
    Embeddings,
    DocumentIds,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] =
        [ArtifactKind::TermModel, ArtifactKind::ReducerModel, ArtifactKind::Embeddings, ArtifactKind::DocumentIds];

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::TermModel => "term_model",
            ArtifactKind::ReducerModel => "reducer_model",
            ArtifactKind::Embeddings => "embeddings",
            ArtifactKind::DocumentIds => "document_ids",
        }
    }

    pub fn file_name(self, version: &str) -> String {
        format!("{}_{version}.{EXTENSION}", self.as_str())
    }

    /// Split a file name produced by [`ArtifactKind::file_name`] back into
    /// kind and version.
    fn parse_file_name(name: &str) -> Option<(ArtifactKind, &str)> {
        let stem = name.strip_suffix(EXTENSION)?.strip_suffix('.')?;
        Self::ALL.into_iter().find_map(|kind| {
            let version = stem.strip_prefix(kind.as_str())?.strip_prefix('_')?;
            (!version.is_empty()).then_some((kind, version))
        })
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Reads and writes snapshots under a single base directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    base: PathBuf,
}

impl SnapshotStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path { &self.base }

    pub fn artifact_path(&self, kind: ArtifactKind, version: &str) -> PathBuf {
        self.base.join(kind.file_name(version))
    }

    /// Persist all four artifacts of `index` under `version`, creating the
    /// base directory if needed. Existing artifacts of the same version are
    /// replaced.
    pub fn save(&self, index: &IndexedCorpus, version: &str) -> Result<()> {
        check_version(version)?;
        fs::create_dir_all(&self.base)?;
        self.write_artifact(ArtifactKind::TermModel, version, index.term_model())?;
        self.write_artifact(ArtifactKind::ReducerModel, version, index.reducer())?;
        self.write_artifact(ArtifactKind::Embeddings, version, index.embeddings())?;
        self.write_artifact(ArtifactKind::DocumentIds, version, index.document_ids())?;
        info!(base = %self.base.display(), version, documents = index.len(), "saved snapshot");
        Ok(())
    }

    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.save(snapshot.index(), snapshot.version())
    }

    /// Load `version`. Either every artifact loads and the parts agree, or
    /// nothing is returned.
    pub fn load(&self, version: &str) -> Result<Snapshot> {
        check_version(version)?;
        let missing: Vec<String> = ArtifactKind::ALL
            .into_iter()
            .map(|kind| self.artifact_path(kind, version))
            .filter(|path| !path.is_file())
            .map(|path| path.display().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::NotFound(format!("snapshot {version} is missing {}", missing.join(", "))));
        }

        let term_model: TermModel = self.read_artifact(ArtifactKind::TermModel, version)?;
        let reducer: Reducer = self.read_artifact(ArtifactKind::ReducerModel, version)?;
        let embeddings: EmbeddingMatrix = self.read_artifact(ArtifactKind::Embeddings, version)?;
        let document_ids: Vec<DocumentId> = self.read_artifact(ArtifactKind::DocumentIds, version)?;

        let index = IndexedCorpus::new(term_model, reducer, embeddings, document_ids)
            .map_err(|e| Error::Integrity(format!("snapshot {version} is inconsistent: {e}")))?;
        info!(base = %self.base.display(), version, documents = index.len(), "loaded snapshot");
        Ok(index.into_snapshot(version))
    }

    pub fn exists(&self, version: &str) -> bool {
        ArtifactKind::ALL.into_iter().all(|kind| self.artifact_path(kind, version).is_file())
    }

    /// Versions with all four artifacts present, sorted. A missing base
    /// directory has no versions.
    pub fn list_versions(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.base) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut candidates = BTreeSet::new();
        for entry in entries {
            let name = entry?.file_name();
            if let Some((_, version)) = name.to_str().and_then(ArtifactKind::parse_file_name) {
                candidates.insert(version.to_string());
            }
        }
        Ok(candidates.into_iter().filter(|v| self.exists(v)).collect())
    }

    fn write_artifact<T: Serialize + ?Sized>(&self, kind: ArtifactKind, version: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        let path = self.artifact_path(kind, version);
        let mut tmp = NamedTempFile::new_in(&self.base)?;
        writeln!(tmp, "{HEADER_MAGIC} {kind} {:016x}", checksum(&payload))?;
        tmp.write_all(&payload)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
        debug!(path = %path.display(), bytes = payload.len(), "wrote artifact");
        Ok(())
    }

    fn read_artifact<T: DeserializeOwned>(&self, kind: ArtifactKind, version: &str) -> Result<T> {
        let path = self.artifact_path(kind, version);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("{} does not exist", path.display())));
            }
            Err(e) => return Err(e.into()),
        };
        let split = bytes
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| Error::Integrity(format!("{} has no header line", path.display())))?;
        let (header, payload) = (&bytes[..split], &bytes[split + 1..]);
        let expected = parse_header(header, kind).ok_or_else(|| Error::Integrity(format!("{} has a malformed header", path.display())))?;
        let actual = checksum(payload);
        if actual != expected {
            return Err(Error::Integrity(format!(
                "{} checksum mismatch: header {expected:016x}, payload {actual:016x}",
                path.display()
            )));
        }
        debug!(path = %path.display(), bytes = payload.len(), "read artifact");
        serde_json::from_slice(payload).map_err(|e| integrity(kind, version, e))
    }
}

fn checksum(payload: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(payload);
    hasher.finish()
}

fn parse_header(header: &[u8], kind: ArtifactKind) -> Option<u64> {
    let header = std::str::from_utf8(header).ok()?;
    let mut parts = header.split_whitespace();
    if parts.next()? != HEADER_MAGIC || parts.next()? != kind.as_str() {
        return None;
    }
    let sum = u64::from_str_radix(parts.next()?, 16).ok()?;
    parts.next().is_none().then_some(sum)
}

fn integrity(kind: ArtifactKind, version: &str, err: impl fmt::Display) -> Error {
    Error::Integrity(format!("{kind} artifact of {version} is invalid: {err}"))
}

/// Versions become part of file names, so keep them to a single path segment.
fn check_version(version: &str) -> Result<()> {
    let ok = !version.is_empty()
        && version != "."
        && version != ".."
        && !version.contains(['/', '\\'])
        && !version.chars().any(char::is_whitespace);
    if ok { Ok(()) } else { Err(Error::InvalidConfig(format!("invalid snapshot version {version:?}"))) }
}
