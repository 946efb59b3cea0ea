use std::ops::Deref;

use kbase_core::error::{Error, Result};
use kbase_core::traits::Embedder;
use kbase_core::types::{normalize_text, DocumentId};
use kbase_embed::{EmbeddingMatrix, Reducer};
use kbase_text::TermModel;

/// The fitted artifacts of one corpus, before a version is attached.
///
/// Row `i` of `embeddings` belongs to `document_ids[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedCorpus {
    term_model: TermModel,
    reducer: Reducer,
    embeddings: EmbeddingMatrix,
    document_ids: Vec<DocumentId>,
}

impl IndexedCorpus {
    /// Assemble fitted parts. Each part must pass its own structural checks
    /// and their shapes must agree.
    pub fn new(
        term_model: TermModel,
        reducer: Reducer,
        embeddings: EmbeddingMatrix,
        document_ids: Vec<DocumentId>,
    ) -> Result<Self> {
        term_model.validate()?;
        reducer.validate()?;
        embeddings.validate()?;
        if document_ids.len() != embeddings.rows() {
            return Err(Error::Dimension(format!(
                "{} document ids for {} embedding rows",
                document_ids.len(),
                embeddings.rows()
            )));
        }
        if embeddings.dim() != reducer.components() {
            return Err(Error::Dimension(format!(
                "embeddings have {} columns but the reducer has {} components",
                embeddings.dim(),
                reducer.components()
            )));
        }
        if reducer.features() != term_model.vocabulary_size() {
            return Err(Error::Dimension(format!(
                "reducer expects {} features but the vocabulary has {} terms",
                reducer.features(),
                term_model.vocabulary_size()
            )));
        }
        Ok(Self { term_model, reducer, embeddings, document_ids })
    }

    pub fn term_model(&self) -> &TermModel { &self.term_model }
    pub fn reducer(&self) -> &Reducer { &self.reducer }
    pub fn embeddings(&self) -> &EmbeddingMatrix { &self.embeddings }
    pub fn document_ids(&self) -> &[DocumentId] { &self.document_ids }
    pub fn len(&self) -> usize { self.document_ids.len() }
    pub fn is_empty(&self) -> bool { self.document_ids.is_empty() }

    /// Project free text into the embedding space, normalizing it the same
    /// way corpus documents are.
    pub fn project(&self, text: &str) -> Vec<f32> {
        let weighted = self.term_model.transform(&normalize_text(text));
        self.reducer.transform(&weighted)
    }

    pub fn into_snapshot(self, version: impl Into<String>) -> Snapshot {
        Snapshot { version: version.into(), index: self }
    }
}

/// An [`IndexedCorpus`] under a version label. Immutable; shared as
/// `Arc<Snapshot>` by the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    version: String,
    index: IndexedCorpus,
}

impl Snapshot {
    pub fn new(version: impl Into<String>, index: IndexedCorpus) -> Self {
        index.into_snapshot(version)
    }

    pub fn version(&self) -> &str { &self.version }
    pub fn index(&self) -> &IndexedCorpus { &self.index }
}

impl Deref for Snapshot {
    type Target = IndexedCorpus;
    fn deref(&self) -> &IndexedCorpus { &self.index }
}

impl Embedder for Snapshot {
    fn dim(&self) -> usize { self.reducer.components() }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.project(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbase_core::config::{ReducerSettings, VectorizerSettings};
    use kbase_core::types::Document;

    use crate::indexer::CorpusIndexer;

    fn fitted() -> IndexedCorpus {
        let docs = vec![Document::new("a", "red apples and green pears"), Document::new("b", "blue skies over grey seas")];
        CorpusIndexer::new(VectorizerSettings::permissive(), ReducerSettings::default())
            .with_components(2)
            .fit(&docs)
            .expect("fit")
    }

    #[test]
    fn reassembling_fitted_parts_succeeds() {
        let index = fitted();
        let rebuilt = IndexedCorpus::new(
            index.term_model().clone(),
            index.reducer().clone(),
            index.embeddings().clone(),
            index.document_ids().to_vec(),
        )
        .expect("assemble");
        assert_eq!(rebuilt, index);
    }

    #[test]
    fn malformed_reducer_is_rejected_before_projection() {
        let index = fitted();
        let mut json = serde_json::to_value(index.reducer()).expect("json");
        json["weights"].as_array_mut().expect("weights").pop();
        let broken: Reducer = serde_json::from_value(json).expect("decode");

        let err = IndexedCorpus::new(
            index.term_model().clone(),
            broken,
            index.embeddings().clone(),
            index.document_ids().to_vec(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Integrity(_)), "{err}");
    }

    #[test]
    fn malformed_term_model_is_rejected() {
        let index = fitted();
        let mut json = serde_json::to_value(index.term_model()).expect("json");
        json["idf"].as_array_mut().expect("idf").pop();
        let broken: TermModel = serde_json::from_value(json).expect("decode");

        let err = IndexedCorpus::new(broken, index.reducer().clone(), index.embeddings().clone(), index.document_ids().to_vec())
            .unwrap_err();
        assert!(matches!(err, Error::Integrity(_)), "{err}");
    }
}
