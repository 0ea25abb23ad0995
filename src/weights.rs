use crate::error::{Error, Result};
use crate::index::Indices;

/// Weight table: one vector per feature, sized by the label-tuple index of
/// the feature's clique order.
///
/// All vectors live in one flat buffer so the trainer can hand the optimizer
/// a single parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    /// `offsets[f]..offsets[f + 1]` is the slice of feature `f`
    offsets: Vec<usize>,
    values: Vec<f64>,
}

fn layout(indices: &Indices) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(indices.num_features() + 1);
    let mut total = 0;
    offsets.push(0);
    for &order in indices.feature_type_of() {
        total += indices.label_tuples(order).len();
        offsets.push(total);
    }
    offsets
}

impl Weights {
    /// All-zero weights shaped after `indices`
    pub fn zeros(indices: &Indices) -> Self {
        let offsets = layout(indices);
        let total = offsets.last().copied().unwrap_or(0);
        Self {
            offsets,
            values: vec![0.0; total],
        }
    }

    /// Weights from a flat parameter vector laid out after `indices`
    pub fn from_values(indices: &Indices, values: Vec<f64>) -> Result<Self> {
        let offsets = layout(indices);
        let total = offsets.last().copied().unwrap_or(0);
        if values.len() != total {
            return Err(Error::dimension(format!(
                "weight vector has {} entries but the indices need {}",
                values.len(),
                total
            )));
        }
        Ok(Self { offsets, values })
    }

    /// Weights from one vector per feature
    pub fn from_vectors(indices: &Indices, vectors: Vec<Vec<f64>>) -> Result<Self> {
        if vectors.len() != indices.num_features() {
            return Err(Error::dimension(format!(
                "{} weight vectors for {} features",
                vectors.len(),
                indices.num_features()
            )));
        }
        for (f, vector) in vectors.iter().enumerate() {
            let expected = indices.label_tuples(indices.feature_type_of()[f]).len();
            if vector.len() != expected {
                return Err(Error::dimension(format!(
                    "weight vector of feature {} has length {} but its label index has {} entries",
                    f,
                    vector.len(),
                    expected
                )));
            }
        }
        let values = vectors.into_iter().flatten().collect();
        Self::from_values(indices, values)
    }

    /// Same layout, new values
    pub fn with_values(&self, values: Vec<f64>) -> Result<Self> {
        if values.len() != self.values.len() {
            return Err(Error::dimension(format!(
                "weight vector has {} entries, expected {}",
                values.len(),
                self.values.len()
            )));
        }
        Ok(Self {
            offsets: self.offsets.clone(),
            values,
        })
    }

    /// Verify that the layout still matches `indices`
    pub fn check(&self, indices: &Indices) -> Result<()> {
        if self.offsets != layout(indices) {
            return Err(Error::dimension(
                "weight table does not match the label-tuple indices",
            ));
        }
        Ok(())
    }

    pub fn num_features(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total number of parameters
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn vector(&self, feature: usize) -> &[f64] {
        &self.values[self.offsets[feature]..self.offsets[feature + 1]]
    }

    pub fn vector_mut(&mut self, feature: usize) -> &mut [f64] {
        &mut self.values[self.offsets[feature]..self.offsets[feature + 1]]
    }

    /// Index of a feature's first entry in the flat buffer
    pub fn offset(&self, feature: usize) -> usize {
        self.offsets[feature]
    }

    pub fn vectors(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.offsets
            .windows(2)
            .map(move |w| &self.values[w[0]..w[1]])
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Update all weights from a flat parameter vector
    ///
    /// # Panics
    ///
    /// Panics if `values.len()` does not equal `self.len()`.
    pub fn set_values(&mut self, values: &[f64]) {
        assert_eq!(
            values.len(),
            self.values.len(),
            "weights length ({}) must equal number of parameters ({})",
            values.len(),
            self.values.len()
        );
        self.values.copy_from_slice(values);
    }
}
