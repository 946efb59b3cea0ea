//! kbase-text
//!
//! Tokenization (tantivy analyzers) and TF-IDF term weighting. The fitted
//! [`TermModel`] is frozen: queries are transformed, never refitted.
pub mod analyzer;
pub mod vectorizer;

pub use analyzer::{build_analyzer, tokenize, ENGLISH_STOP_WORDS};
pub use vectorizer::TermModel;
