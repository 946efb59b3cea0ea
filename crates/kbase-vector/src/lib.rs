//! kbase-vector
//!
//! Index lifecycle on top of the text and embed crates: fitting a corpus into
//! an [`IndexedCorpus`], persisting versioned snapshots with [`SnapshotStore`],
//! ranking with [`search::retrieve`], and sharing loaded snapshots through the
//! single-flight [`SnapshotCache`]. [`KnowledgeBase`] ties them together for
//! query callers.
pub mod cache;
pub mod indexer;
pub mod knowledge;
pub mod search;
pub mod snapshot;
pub mod store;

pub use cache::{BuildOnMissLoader, CacheState, SnapshotCache, SnapshotLoader, StoreLoader};
pub use indexer::CorpusIndexer;
pub use knowledge::KnowledgeBase;
pub use search::SearchOptions;
pub use snapshot::{IndexedCorpus, Snapshot};
pub use store::{ArtifactKind, SnapshotStore};
