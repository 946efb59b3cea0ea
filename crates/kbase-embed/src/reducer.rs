//! Truncated SVD over sparse TF-IDF rows.
//!
//! Uses a seeded randomized range finder: sketch `X` with a uniform random
//! matrix, sharpen the basis with a few power iterations, then solve the small
//! projected problem exactly with Jacobi. The component matrix is stored
//! `k x features` so that projecting a row is `k` sparse dot products.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use kbase_core::config::ReducerSettings;
use kbase_core::error::{Error, Result};
use kbase_core::types::SparseVector;

use crate::linalg::{orthonormalize_columns, symmetric_eigen};
use crate::matrix::EmbeddingMatrix;

const SINGULAR_EPS: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reducer {
    components: usize,
    features: usize,
    weights: Vec<f32>,
    singular_values: Vec<f32>,
}

impl Reducer {
    /// Fit on the weighted training rows (each with indices `< features`) and
    /// return the reducer with the embedding of every row, in row order.
    ///
    /// A requested dimension above `min(features, rows)` is clamped.
    pub fn fit(rows: &[SparseVector], features: usize, settings: &ReducerSettings) -> Result<(Self, EmbeddingMatrix)> {
        if rows.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        if settings.components == 0 {
            return Err(Error::Dimension("at least one component is required".into()));
        }
        if features == 0 {
            return Err(Error::Dimension("cannot reduce rows with zero features".into()));
        }
        if let Some((i, j)) = rows.iter().enumerate().find_map(|(i, r)| r.indices.iter().find(|&&j| j as usize >= features).map(|&j| (i, j))) {
            return Err(Error::Dimension(format!("row {i} references column {j} of {features}")));
        }

        let n = rows.len();
        let rank_bound = n.min(features);
        let k = settings.components.min(rank_bound);
        if k < settings.components {
            warn!(requested = settings.components, used = k, rows = n, features, "clamping reducer dimension");
        }
        let width = (k + settings.oversamples).min(rank_bound);

        let mut rng = StdRng::seed_from_u64(settings.seed);
        let omega: Vec<f64> = (0..features * width).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let mut q = multiply(rows, &omega, width);
        orthonormalize_columns(&mut q, n, width);
        for _ in 0..settings.power_iterations {
            let mut z = multiply_transposed(rows, &q, features, width);
            orthonormalize_columns(&mut z, features, width);
            q = multiply(rows, &z, width);
            orthonormalize_columns(&mut q, n, width);
        }

        // z = X^T Q, so the projected matrix B = Q^T X is z transposed.
        let z = multiply_transposed(rows, &q, features, width);
        let mut gram = vec![0.0; width * width];
        for j in 0..features {
            let zr = &z[j * width..(j + 1) * width];
            for a in 0..width {
                if zr[a] == 0.0 { continue; }
                for b in a..width {
                    gram[a * width + b] += zr[a] * zr[b];
                }
            }
        }
        for a in 0..width {
            for b in 0..a {
                gram[a * width + b] = gram[b * width + a];
            }
        }
        let (eigenvalues, eigenvectors) = symmetric_eigen(gram, width);

        let mut weights = vec![0.0f32; k * features];
        let mut singular_values = Vec::with_capacity(k);
        for c in 0..k {
            let sigma = eigenvalues[c].max(0.0).sqrt();
            singular_values.push(sigma as f32);
            if sigma < SINGULAR_EPS {
                continue;
            }
            let mut component: Vec<f64> = (0..features)
                .map(|j| (0..width).map(|a| z[j * width + a] * eigenvectors[a * width + c]).sum::<f64>() / sigma)
                .collect();
            flip_sign(&mut component);
            for (dst, v) in weights[c * features..(c + 1) * features].iter_mut().zip(component) {
                *dst = v as f32;
            }
        }
        debug!(?singular_values, "reducer spectrum");

        let reducer = Self { components: k, features, weights, singular_values };
        let embeddings = reducer.transform_rows(rows)?;
        info!(rows = n, features, components = k, "fitted reducer");
        Ok((reducer, embeddings))
    }

    /// Project one weighted row. Columns outside the fitted feature range are
    /// ignored, as are components missing from an unvalidated reducer.
    pub fn transform(&self, row: &SparseVector) -> Vec<f32> {
        (0..self.components)
            .map(|c| match self.weights.get(c * self.features..(c + 1) * self.features) {
                Some(weights) => row.iter().filter_map(|(j, v)| weights.get(j).map(|w| w * v)).sum::<f32>(),
                None => 0.0,
            })
            .collect()
    }

    /// Project every row into a `rows x components` matrix.
    pub fn transform_rows(&self, rows: &[SparseVector]) -> Result<EmbeddingMatrix> {
        EmbeddingMatrix::new(rows.len(), self.components, rows.iter().flat_map(|r| self.transform(r)).collect())
    }

    pub fn components(&self) -> usize { self.components }
    pub fn features(&self) -> usize { self.features }
    pub fn singular_values(&self) -> &[f32] { &self.singular_values }

    /// Structural checks for a reducer read back from disk.
    pub fn validate(&self) -> Result<()> {
        if self.components == 0 || self.features == 0 {
            return Err(Error::Integrity(format!("reducer shape {}x{} is empty", self.components, self.features)));
        }
        if self.weights.len() != self.components * self.features {
            return Err(Error::Integrity(format!(
                "reducer holds {} weights, expected {}x{}",
                self.weights.len(),
                self.components,
                self.features
            )));
        }
        if self.singular_values.len() != self.components {
            return Err(Error::Integrity(format!(
                "reducer has {} singular values for {} components",
                self.singular_values.len(),
                self.components
            )));
        }
        if self.weights.iter().chain(&self.singular_values).any(|v| !v.is_finite()) {
            return Err(Error::Integrity("reducer contains non-finite values".into()));
        }
        Ok(())
    }
}

/// `X * m` where `m` is `features x width`; result is `rows x width`.
fn multiply(rows: &[SparseVector], m: &[f64], width: usize) -> Vec<f64> {
    let mut out = vec![0.0; rows.len() * width];
    for (i, row) in rows.iter().enumerate() {
        let dst = &mut out[i * width..(i + 1) * width];
        for (j, v) in row.iter() {
            let src = &m[j * width..(j + 1) * width];
            for (d, s) in dst.iter_mut().zip(src) {
                *d += f64::from(v) * s;
            }
        }
    }
    out
}

/// `X^T * m` where `m` is `rows x width`; result is `features x width`.
fn multiply_transposed(rows: &[SparseVector], m: &[f64], features: usize, width: usize) -> Vec<f64> {
    let mut out = vec![0.0; features * width];
    for (i, row) in rows.iter().enumerate() {
        let src = &m[i * width..(i + 1) * width];
        for (j, v) in row.iter() {
            let dst = &mut out[j * width..(j + 1) * width];
            for (d, s) in dst.iter_mut().zip(src) {
                *d += f64::from(v) * s;
            }
        }
    }
    out
}

/// Make the entry with the largest magnitude positive.
fn flip_sign(component: &mut [f64]) {
    let pivot = component.iter().copied().max_by(|a, b| a.abs().total_cmp(&b.abs())).unwrap_or(0.0);
    if pivot < 0.0 {
        for v in component.iter_mut() { *v = -*v; }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbase_core::config::VectorizerSettings;
    use kbase_text::TermModel;

    fn settings(components: usize) -> ReducerSettings {
        ReducerSettings { components, ..ReducerSettings::default() }
    }

    fn sparse(pairs: &[(u32, f32)]) -> SparseVector {
        SparseVector { indices: pairs.iter().map(|p| p.0).collect(), values: pairs.iter().map(|p| p.1).collect() }
    }

    fn corpus_rows() -> (usize, Vec<SparseVector>) {
        let docs = [
            "cats purr and cats sleep",
            "dogs bark and dogs run",
            "cats and dogs play together",
            "stock markets fell sharply",
            "markets rallied after the fall",
        ];
        let (model, rows) = TermModel::fit(&docs, &VectorizerSettings::permissive()).expect("fit terms");
        (model.vocabulary_size(), rows)
    }

    #[test]
    fn recovers_singular_values_of_diagonal_matrix() {
        let rows = vec![sparse(&[(0, 3.0)]), sparse(&[(1, 2.0)]), sparse(&[(2, 1.0)])];
        let (reducer, embeddings) = Reducer::fit(&rows, 3, &settings(2)).expect("fit");
        let sv = reducer.singular_values();
        assert!((sv[0] - 3.0).abs() < 1e-4, "{sv:?}");
        assert!((sv[1] - 2.0).abs() < 1e-4, "{sv:?}");
        assert_eq!(embeddings.rows(), 3);
        assert_eq!(embeddings.dim(), 2);
        let first = embeddings.row(0).expect("row");
        assert!((first[0] - 3.0).abs() < 1e-4);
        assert!(first[1].abs() < 1e-4);
    }

    #[test]
    fn clamps_dimension_to_rank_bound() {
        let (features, rows) = corpus_rows();
        let (reducer, embeddings) = Reducer::fit(&rows, features, &settings(100)).expect("fit");
        assert_eq!(reducer.components(), 5.min(features));
        assert_eq!(embeddings.rows(), 5);
        assert_eq!(embeddings.dim(), reducer.components());
    }

    #[test]
    fn zero_components_is_a_dimension_error() {
        let (features, rows) = corpus_rows();
        let err = Reducer::fit(&rows, features, &settings(0)).unwrap_err();
        assert!(matches!(err, Error::Dimension(_)));
    }

    #[test]
    fn transform_of_training_row_matches_embedding() {
        let (features, rows) = corpus_rows();
        let (reducer, embeddings) = Reducer::fit(&rows, features, &settings(3)).expect("fit");
        for (i, row) in rows.iter().enumerate() {
            let projected = reducer.transform(row);
            let stored = embeddings.row(i).expect("row");
            for (a, b) in projected.iter().zip(stored) {
                assert!((a - b).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn fitting_is_deterministic_for_a_seed() {
        let (features, rows) = corpus_rows();
        let (a, ea) = Reducer::fit(&rows, features, &settings(3)).expect("fit");
        let (b, eb) = Reducer::fit(&rows, features, &settings(3)).expect("fit");
        assert_eq!(a, b);
        assert_eq!(ea, eb);
    }

    #[test]
    fn singular_values_are_descending() {
        let (features, rows) = corpus_rows();
        let (reducer, _) = Reducer::fit(&rows, features, &settings(4)).expect("fit");
        assert!(reducer.singular_values().windows(2).all(|w| w[0] >= w[1] - 1e-6));
        assert!(reducer.validate().is_ok());
    }

    #[test]
    fn out_of_range_columns_are_rejected() {
        let rows = vec![sparse(&[(5, 1.0)])];
        assert!(matches!(Reducer::fit(&rows, 3, &settings(1)).unwrap_err(), Error::Dimension(_)));
    }

    #[test]
    fn validate_catches_truncated_weights() {
        let (features, rows) = corpus_rows();
        let (reducer, _) = Reducer::fit(&rows, features, &settings(2)).expect("fit");
        let mut json = serde_json::to_value(&reducer).expect("json");
        json["weights"].as_array_mut().expect("weights").pop();
        let broken: Reducer = serde_json::from_value(json).expect("decode");
        assert!(matches!(broken.validate().unwrap_err(), Error::Integrity(_)));
        // projecting with the broken reducer must not panic
        assert_eq!(broken.transform(&rows[0]).len(), 2);
    }

    #[test]
    fn transform_rows_matches_fitted_embeddings() {
        let (features, rows) = corpus_rows();
        let (reducer, embeddings) = Reducer::fit(&rows, features, &settings(3)).expect("fit");
        assert_eq!(reducer.transform_rows(&rows).expect("transform"), embeddings);
        let empty = reducer.transform_rows(&[]).expect("no rows");
        assert_eq!(empty.rows(), 0);
    }
}
