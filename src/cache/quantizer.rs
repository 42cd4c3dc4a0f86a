//! Per-tensor symmetric int8 quantization.
//!
//! Each tensor gets a single scale `max(|t|) / 127` and no zero point, so
//! `q = clamp(round(t / scale), -128, 127)` and `t' = q * scale`. The
//! reconstruction error of any element is at most `scale / 2`.

use crate::cache::tensor::{Tensor, TensorError};

/// Largest quantized magnitude the scale is fitted to.
pub const Q8_MAX: f32 = 127.0;

/// An int8-coded tensor with its per-tensor scale.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedTensor {
    data: Vec<i8>,
    shape: Vec<usize>,
    scale: f32,
}

impl QuantizedTensor {
    pub fn data(&self) -> &[i8] {
        &self.data
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Always positive; 1.0 for an all-zero tensor.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw byte view of the quantized buffer.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Bytes held by the quantized buffer plus its scale.
    pub fn nbytes(&self) -> usize {
        self.as_bytes().len() + std::mem::size_of::<f32>()
    }

    /// Reconstruct the full-precision tensor.
    pub fn dequantize(&self) -> Tensor {
        dequantize(self)
    }
}

/// Scale for a tensor whose largest magnitude is `max_val`.
///
/// Always positive. `max_val / scale` never exceeds 127, including when
/// `max_val` is subnormal and the exact quotient is not representable.
pub fn scale_for(max_val: f32) -> f32 {
    if max_val == 0.0 {
        // All-zero tensor: any scale reproduces it, 1.0 avoids dividing by zero.
        return 1.0;
    }
    let scale = (f64::from(max_val) / f64::from(Q8_MAX)) as f32;
    let scale = if scale * Q8_MAX < max_val {
        // Rounded down; step to the next representable value.
        f32::from_bits(scale.to_bits() + 1)
    } else {
        scale
    };
    scale.max(f32::from_bits(1))
}

/// Quantize a tensor to int8 with its own scale.
///
/// Rejects NaN and infinite elements, which have no meaningful scale.
pub fn quantize(t: &Tensor) -> Result<QuantizedTensor, TensorError> {
    if let Some(index) = t.data().iter().position(|v| !v.is_finite()) {
        return Err(TensorError::NonFinite { index });
    }

    let scale = scale_for(t.max_abs());
    let data = t
        .data()
        .iter()
        .map(|&v| (v / scale).round().clamp(-128.0, Q8_MAX) as i8)
        .collect();

    Ok(QuantizedTensor {
        data,
        shape: t.shape().to_vec(),
        scale,
    })
}

/// Map int8 codes back to floats: `t_i = q_i * scale`.
pub fn dequantize_values(q: &[i8], scale: f32) -> Vec<f32> {
    q.iter().map(|&v| f32::from(v) * scale).collect()
}

/// Reconstruct a full-precision tensor from its quantized form.
pub fn dequantize(q: &QuantizedTensor) -> Tensor {
    Tensor::from_parts(dequantize_values(&q.data, q.scale), q.shape.clone())
}
