use tracing::info;

use kbase_core::config::{ReducerSettings, Settings, VectorizerSettings};
use kbase_core::error::{Error, Result};
use kbase_core::types::{Document, RawDocument};
use kbase_embed::Reducer;
use kbase_text::TermModel;

use crate::snapshot::IndexedCorpus;

/// Fits the term model and reducer over a corpus.
#[derive(Debug, Clone, Default)]
pub struct CorpusIndexer {
    vectorizer: VectorizerSettings,
    reducer: ReducerSettings,
}

impl CorpusIndexer {
    pub fn new(vectorizer: VectorizerSettings, reducer: ReducerSettings) -> Self {
        Self { vectorizer, reducer }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.vectorizer.clone(), settings.reducer.clone())
    }

    /// Override the requested embedding dimension.
    pub fn with_components(mut self, k: usize) -> Self {
        self.reducer.components = k;
        self
    }

    pub fn vectorizer(&self) -> &VectorizerSettings { &self.vectorizer }
    pub fn reducer(&self) -> &ReducerSettings { &self.reducer }

    /// Fit over `documents` in order. Embedding row `i` belongs to
    /// `documents[i]`.
    pub fn fit(&self, documents: &[Document]) -> Result<IndexedCorpus> {
        if documents.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        let texts: Vec<&str> = documents.iter().map(Document::processed_text).collect();
        let (term_model, rows) = TermModel::fit(&texts, &self.vectorizer)?;
        let (reducer, embeddings) = Reducer::fit(&rows, term_model.vocabulary_size(), &self.reducer)?;
        let document_ids = documents.iter().map(|d| d.id().to_string()).collect();
        let index = IndexedCorpus::new(term_model, reducer, embeddings, document_ids)?;
        info!(documents = index.len(), dim = index.reducer().components(), "indexed corpus");
        Ok(index)
    }

    pub fn fit_raw(&self, documents: Vec<RawDocument>) -> Result<IndexedCorpus> {
        let documents: Vec<Document> = documents.into_iter().map(Document::from).collect();
        self.fit(&documents)
    }
}
