//! Full-precision tensors and the raw per-layer KV record.
//!
//! This is the form in which a backend hands its key/value state to the
//! cache and receives it back.

use half::f16;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TensorError {
    #[error("Shape {shape:?} needs {expected} elements, got {actual}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("Non-finite value at element {index}")]
    NonFinite { index: usize },
}

/// A dense row-major `f32` tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Vec<f32>,
    shape: Vec<usize>,
}

impl Tensor {
    /// Build a tensor, checking that `data` fills `shape` exactly.
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Result<Self, TensorError> {
        let expected = element_count(&shape);
        if data.len() != expected {
            return Err(TensorError::ShapeMismatch {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, shape })
    }

    /// Callers guarantee `data.len() == element_count(&shape)`.
    pub(crate) fn from_parts(data: Vec<f32>, shape: Vec<usize>) -> Self {
        debug_assert_eq!(data.len(), element_count(&shape));
        Self { data, shape }
    }

    /// Build a tensor from half-precision model state.
    pub fn from_f16(data: &[f16], shape: Vec<usize>) -> Result<Self, TensorError> {
        Self::new(data.iter().map(|v| v.to_f32()).collect(), shape)
    }

    /// An all-zero tensor of the given shape.
    pub fn zeros(shape: Vec<usize>) -> Self {
        Self {
            data: vec![0.0; element_count(&shape)],
            shape,
        }
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the leading dimension (sequence positions for KV state).
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Largest absolute element, or 0.0 for an empty tensor.
    pub fn max_abs(&self) -> f32 {
        self.data.iter().fold(0.0f32, |acc, v| acc.max(v.abs()))
    }

    /// Append rows along the leading dimension.
    ///
    /// `rows` must be a whole number of rows of the trailing shape.
    pub fn append_rows(&mut self, rows: &[f32]) -> Result<(), TensorError> {
        let row_len = element_count(self.shape.get(1..).unwrap_or(&[]));
        if self.shape.is_empty() || row_len == 0 || rows.len() % row_len != 0 {
            let mut shape = self.shape.clone();
            if shape.is_empty() {
                shape.push(0);
            }
            return Err(TensorError::ShapeMismatch {
                shape,
                expected: row_len,
                actual: rows.len(),
            });
        }
        self.data.extend_from_slice(rows);
        self.shape[0] += rows.len() / row_len;
        Ok(())
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

/// Number of elements a shape holds. The empty shape is a scalar.
pub fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Raw key/value state for a single model layer.
#[derive(Debug, Clone, PartialEq)]
pub struct KvLayer {
    pub key: Tensor,
    pub value: Tensor,
}

impl KvLayer {
    pub fn new(key: Tensor, value: Tensor) -> Self {
        Self { key, value }
    }

    /// Sequence positions covered by this layer's keys.
    pub fn seq_len(&self) -> usize {
        self.key.rows()
    }
}
