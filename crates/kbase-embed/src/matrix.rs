use serde::{Deserialize, Serialize};

use kbase_core::error::{Error, Result};

/// Dense `rows x dim` matrix of `f32`, stored row-major. Row `i` is the
/// embedding of corpus document `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatrix {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    pub fn new(rows: usize, dim: usize, data: Vec<f32>) -> Result<Self> {
        let matrix = Self { rows, dim, data };
        matrix.validate()?;
        Ok(matrix)
    }

    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let dim = rows.first().map_or(0, Vec::len);
        let count = rows.len();
        let mut data = Vec::with_capacity(count * dim);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != dim {
                return Err(Error::Dimension(format!("row {i} has {} values, expected {dim}", row.len())));
            }
            data.extend(row);
        }
        Self::new(count, dim, data)
    }

    pub fn rows(&self) -> usize { self.rows }
    pub fn dim(&self) -> usize { self.dim }
    pub fn as_slice(&self) -> &[f32] { &self.data }

    pub fn row(&self, i: usize) -> Option<&[f32]> {
        if i >= self.rows { return None; }
        self.data.get(i * self.dim..(i + 1) * self.dim)
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.rows).filter_map(move |i| self.row(i))
    }

    /// Shape and value checks, also used on matrices read back from disk.
    pub fn validate(&self) -> Result<()> {
        let expected = self.rows.checked_mul(self.dim).ok_or_else(|| Error::Dimension("matrix shape overflows".into()))?;
        if self.data.len() != expected {
            return Err(Error::Dimension(format!(
                "{}x{} matrix holds {} values, expected {expected}",
                self.rows,
                self.dim,
                self.data.len()
            )));
        }
        if let Some(pos) = self.data.iter().position(|v| !v.is_finite()) {
            return Err(Error::Dimension(format!("non-finite value at row {}", pos / self.dim.max(1))));
        }
        Ok(())
    }
}
