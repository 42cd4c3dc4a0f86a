//! KV cache compression.
//!
//! - [`tensor`]: full-precision tensors and the raw per-layer KV record
//! - [`quantizer`]: per-tensor symmetric int8 quantization
//! - [`store`]: rolling single-snapshot quantized cache

pub mod quantizer;
pub mod store;
pub mod tensor;

pub use quantizer::{dequantize, quantize, QuantizedTensor};
pub use store::{CacheSnapshot, CacheStats, KvCache, LayerCache, QuantizedCacheStore};
pub use tensor::{KvLayer, Tensor, TensorError};
