//! Rolling quantized snapshot of per-layer KV state.
//!
//! The store holds exactly one snapshot: the state after the most recent
//! decode step. Every `store` builds a complete new snapshot first and only
//! then swaps it in, so an interrupted or failed store leaves the previous
//! snapshot intact.

use tracing::debug;

use crate::cache::quantizer::{quantize, QuantizedTensor};
use crate::cache::tensor::{KvLayer, TensorError};

/// What a backend needs from a KV cache between decode steps.
pub trait KvCache {
    /// Replace the cached state with `layers`.
    fn store(&mut self, layers: Vec<KvLayer>) -> Result<(), TensorError>;

    /// The cached state, or `None` when nothing has been stored.
    fn get(&self) -> Option<Vec<KvLayer>>;

    /// Drop the cached state.
    fn clear(&mut self);
}

/// Quantized key/value pair for one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerCache {
    pub key: QuantizedTensor,
    pub value: QuantizedTensor,
}

impl LayerCache {
    fn quantize(layer: &KvLayer) -> Result<Self, TensorError> {
        Ok(Self {
            key: quantize(&layer.key)?,
            value: quantize(&layer.value)?,
        })
    }

    fn dequantize(&self) -> KvLayer {
        KvLayer::new(self.key.dequantize(), self.value.dequantize())
    }
}

/// All layers' quantized state after one decode step, in layer order.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSnapshot {
    layers: Vec<LayerCache>,
}

impl CacheSnapshot {
    pub fn layers(&self) -> &[LayerCache] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Quantized bytes held across all layers.
    pub fn nbytes(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.key.nbytes() + l.value.nbytes())
            .sum()
    }

    /// Elements held across all layers.
    pub fn elements(&self) -> usize {
        self.layers.iter().map(|l| l.key.len() + l.value.len()).sum()
    }
}

/// Memory accounting for the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Layers in the current snapshot.
    pub layers: usize,
    /// Elements in the current snapshot.
    pub elements: usize,
    /// Bytes the snapshot occupies quantized.
    pub quantized_bytes: usize,
    /// Bytes the same state would take as `f32`.
    pub full_precision_bytes: usize,
    /// Successful `store` calls since construction.
    pub stores: u64,
}

impl CacheStats {
    /// `full_precision_bytes / quantized_bytes`, or 0.0 when empty.
    pub fn compression_ratio(&self) -> f64 {
        if self.quantized_bytes == 0 {
            return 0.0;
        }
        self.full_precision_bytes as f64 / self.quantized_bytes as f64
    }
}

/// Single-slot int8 KV cache.
#[derive(Debug, Default)]
pub struct QuantizedCacheStore {
    snapshot: Option<CacheSnapshot>,
    stores: u64,
}

impl QuantizedCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot, if any.
    pub fn snapshot(&self) -> Option<&CacheSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_none()
    }

    pub fn stats(&self) -> CacheStats {
        let (layers, elements, quantized_bytes) = match &self.snapshot {
            Some(s) => (s.len(), s.elements(), s.nbytes()),
            None => (0, 0, 0),
        };
        CacheStats {
            layers,
            elements,
            quantized_bytes,
            full_precision_bytes: elements * std::mem::size_of::<f32>(),
            stores: self.stores,
        }
    }
}

impl KvCache for QuantizedCacheStore {
    fn store(&mut self, layers: Vec<KvLayer>) -> Result<(), TensorError> {
        let quantized = layers
            .iter()
            .map(LayerCache::quantize)
            .collect::<Result<Vec<_>, _>>()?;

        let snapshot = CacheSnapshot { layers: quantized };
        debug!(
            layers = snapshot.len(),
            bytes = snapshot.nbytes(),
            "Stored KV snapshot"
        );
        self.snapshot = Some(snapshot);
        self.stores += 1;
        Ok(())
    }

    fn get(&self) -> Option<Vec<KvLayer>> {
        self.snapshot
            .as_ref()
            .map(|s| s.layers.iter().map(LayerCache::dequantize).collect())
    }

    fn clear(&mut self) {
        self.snapshot = None;
    }
}
