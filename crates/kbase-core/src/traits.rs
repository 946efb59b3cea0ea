use crate::error::Result;
use crate::types::RawDocument;

/// Produces dense vectors for free text. Implemented by fitted snapshots.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()])?;
        Ok(out.pop().unwrap_or_default())
    }
}

/// Supplies an ordered corpus. Order defines embedding row indices.
pub trait CorpusSource: Send + Sync {
    fn load_corpus(&self) -> Result<Vec<RawDocument>>;
}

impl CorpusSource for Vec<RawDocument> {
    fn load_corpus(&self) -> Result<Vec<RawDocument>> { Ok(self.clone()) }
}
