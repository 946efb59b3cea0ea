//! TF-IDF term weighting.
//!
//! Weights follow the smoothed formulation: `tf * (ln((1 + n) / (1 + df)) + 1)`
//! with raw term counts as `tf`, and every row is L2-normalized. Vocabulary
//! columns are assigned in lexicographic term order.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use kbase_core::config::VectorizerSettings;
use kbase_core::error::{Error, Result};
use kbase_core::types::SparseVector;

use crate::analyzer::{build_analyzer, tokenize};

/// A fitted vocabulary plus inverse document frequencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermModel {
    vocabulary: BTreeMap<String, u32>,
    idf: Vec<f32>,
    stop_words: bool,
    min_token_len: usize,
}

impl TermModel {
    /// Fit over already-normalized documents and return the model together
    /// with the weighted rows of the training corpus, in input order.
    pub fn fit<S: AsRef<str>>(documents: &[S], settings: &VectorizerSettings) -> Result<(Self, Vec<SparseVector>)> {
        if documents.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        settings.validate()?;

        let mut analyzer = build_analyzer(settings.stop_words);
        let tokenized: Vec<Vec<String>> = documents
            .iter()
            .map(|d| tokenize(&mut analyzer, d.as_ref(), settings.min_token_len))
            .collect();

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for tokens in &tokenized {
            let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let n = documents.len();
        let max_count = settings.max_df.resolve(n);
        let min_count = settings.min_df.resolve(n);
        let kept: BTreeMap<&str, usize> = doc_freq
            .into_iter()
            .filter(|&(_, df)| (df as f64) <= max_count && (df as f64) >= min_count)
            .collect();
        if kept.is_empty() {
            return Err(Error::Vocabulary(format!(
                "no terms remain after pruning {n} documents (min_df {}, max_df {})",
                settings.min_df, settings.max_df
            )));
        }

        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(kept.len());
        for (column, (term, df)) in kept.into_iter().enumerate() {
            vocabulary.insert(term.to_string(), column as u32);
            idf.push((((1 + n) as f64 / (1 + df) as f64).ln() + 1.0) as f32);
        }
        info!(documents = n, vocabulary = vocabulary.len(), "fitted term model");

        let model = Self { vocabulary, idf, stop_words: settings.stop_words, min_token_len: settings.min_token_len };
        let rows = tokenized.iter().map(|tokens| model.weigh(tokens)).collect();
        Ok((model, rows))
    }

    /// Weight `text` with the frozen vocabulary. Unknown terms are ignored; a
    /// text with no known terms yields an empty vector.
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut analyzer = build_analyzer(self.stop_words);
        let tokens = tokenize(&mut analyzer, text, self.min_token_len);
        let row = self.weigh(&tokens);
        debug!(tokens = tokens.len(), known = row.nnz(), "transformed text");
        row
    }

    pub fn vocabulary_size(&self) -> usize { self.vocabulary.len() }

    pub fn column(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).map(|&c| c as usize)
    }

    pub fn idf(&self, term: &str) -> Option<f32> {
        self.column(term).and_then(|c| self.idf.get(c).copied())
    }

    /// Structural checks for a model read back from disk.
    pub fn validate(&self) -> Result<()> {
        if self.vocabulary.is_empty() {
            return Err(Error::Integrity("term model has an empty vocabulary".into()));
        }
        if self.idf.len() != self.vocabulary.len() {
            return Err(Error::Integrity(format!(
                "term model has {} idf weights for {} terms",
                self.idf.len(),
                self.vocabulary.len()
            )));
        }
        let size = self.vocabulary.len();
        let mut seen = vec![false; size];
        for &column in self.vocabulary.values() {
            match seen.get_mut(column as usize) {
                Some(slot) if !*slot => *slot = true,
                _ => return Err(Error::Integrity(format!("term model column {column} is out of range or duplicated"))),
            }
        }
        Ok(())
    }

    fn weigh(&self, tokens: &[String]) -> SparseVector {
        let mut counts: BTreeMap<u32, f32> = BTreeMap::new();
        for token in tokens {
            if let Some(&column) = self.vocabulary.get(token) {
                *counts.entry(column).or_insert(0.0) += 1.0;
            }
        }
        let mut indices = Vec::with_capacity(counts.len());
        let mut values = Vec::with_capacity(counts.len());
        for (column, tf) in counts {
            indices.push(column);
            values.push(tf * self.idf[column as usize]);
        }
        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut values { *v /= norm; }
        }
        SparseVector { indices, values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbase_core::types::DocFrequency;

    fn permissive() -> VectorizerSettings { VectorizerSettings::permissive() }

    #[test]
    fn fit_assigns_sorted_columns_and_drops_stop_words() {
        let docs = ["the cat sat on the mat", "dogs bark loudly at night"];
        let (model, rows) = TermModel::fit(&docs, &permissive()).expect("fit");
        assert_eq!(model.vocabulary_size(), 7);
        assert_eq!(model.column("bark"), Some(0));
        assert_eq!(model.column("the"), None);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].nnz(), 3);
        assert!((rows[0].norm() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn smoothed_idf_favors_rare_terms() {
        let docs = ["apple banana", "apple cherry", "apple banana"];
        let (model, _) = TermModel::fit(&docs, &permissive()).expect("fit");
        let common = model.idf("apple").expect("apple");
        let rare = model.idf("cherry").expect("cherry");
        assert!((common - 1.0).abs() < 1e-6, "df == n gives idf 1");
        assert!((rare - ((4.0f32 / 2.0).ln() + 1.0)).abs() < 1e-6);
    }

    #[test]
    fn default_thresholds_prune_terms_outside_df_band() {
        let docs = ["alpha beta", "alpha gamma", "alpha beta", "delta"];
        let (model, _) = TermModel::fit(&docs, &VectorizerSettings::default()).expect("fit");
        // alpha: df 3 of 4 (75%) stays; beta: df 2 stays; gamma/delta: df 1 pruned
        assert!(model.column("alpha").is_some());
        assert!(model.column("beta").is_some());
        assert!(model.column("gamma").is_none());
        assert!(model.column("delta").is_none());
    }

    #[test]
    fn vocabulary_error_when_everything_is_pruned() {
        let docs = ["the cat sat on the mat", "dogs bark loudly at night"];
        let err = TermModel::fit(&docs, &VectorizerSettings::default()).unwrap_err();
        assert!(matches!(err, Error::Vocabulary(_)));

        let only_stop_words = ["the and of", "a an the"];
        let err = TermModel::fit(&only_stop_words, &permissive()).unwrap_err();
        assert!(matches!(err, Error::Vocabulary(_)));
    }

    #[test]
    fn empty_corpus_is_rejected() {
        let docs: [&str; 0] = [];
        assert!(matches!(TermModel::fit(&docs, &permissive()).unwrap_err(), Error::EmptyCorpus));
    }

    #[test]
    fn transform_ignores_unknown_terms() {
        let docs = ["cat mat", "dog log"];
        let (model, _) = TermModel::fit(&docs, &permissive()).expect("fit");
        let q = model.transform("cat zebra");
        assert_eq!(q.nnz(), 1);
        assert!((q.values[0] - 1.0).abs() < 1e-6);
        assert!(model.transform("zebra").is_empty());
    }

    #[test]
    fn max_df_as_count_is_respected() {
        let settings = VectorizerSettings { max_df: DocFrequency::Count(1), ..permissive() };
        let docs = ["shared apple", "shared pear"];
        let (model, _) = TermModel::fit(&docs, &settings).expect("fit");
        assert!(model.column("shared").is_none());
        assert!(model.column("apple").is_some());
        assert!(model.column("pear").is_some());
    }

    #[test]
    fn validate_detects_mismatched_idf() {
        let docs = ["cat mat", "dog log"];
        let (model, _) = TermModel::fit(&docs, &permissive()).expect("fit");
        assert!(model.validate().is_ok());
        let mut json: serde_json::Value = serde_json::to_value(&model).expect("json");
        json["idf"].as_array_mut().expect("idf").pop();
        let broken: TermModel = serde_json::from_value(json).expect("decode");
        assert!(matches!(broken.validate().unwrap_err(), Error::Integrity(_)));
    }
}
