//! kbase-embed
//!
//! Dense side of the index: the truncated-SVD [`Reducer`] that projects
//! TF-IDF rows to `k` dimensions, the row-major [`EmbeddingMatrix`], and
//! cosine similarity.
pub mod linalg;
pub mod matrix;
pub mod reducer;
pub mod similarity;

pub use matrix::EmbeddingMatrix;
pub use reducer::Reducer;
pub use similarity::cosine_similarity;
