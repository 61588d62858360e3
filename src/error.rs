// src/error.rs
// ============================================================================
// ERRORS - Taxonomía de errores del exportador
// ============================================================================
//
// Fatal:       DepthMultiplier, TagMismatch, TagCount, BatchNormLength, Io
// Recuperable: rank 0 / rank > 4 → NO es error, el plan lo marca como Skip
//
// ============================================================================

use std::path::PathBuf;

use thiserror::Error;

/// Errores al construir un tensor en memoria
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TensorError {
    #[error("data length {actual} does not match shape {shape:?} (expected {expected})")]
    LengthMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    #[error("shape {shape:?} has more elements than fit in memory")]
    ShapeOverflow { shape: Vec<usize> },

    #[error("shape {shape:?} has a zero-sized dimension at axis {axis}")]
    ZeroDim { shape: Vec<usize>, axis: usize },
}

/// Errores del pase de exportación
#[derive(Debug, Error)]
pub enum ExportError {
    /// El runtime Noodle solo soporta depthwise con multiplier 1
    #[error(
        "tensor #{index} with shape {shape:?} is a depthwise conv2d kernel with depth multiplier {multiplier}; \
         the Noodle runtime only supports multiplier 1"
    )]
    DepthMultiplier {
        index: usize,
        shape: Vec<usize>,
        multiplier: usize,
    },

    #[error("tensor #{index} with shape {shape:?} cannot be tagged as '{tag}'")]
    TagMismatch {
        index: usize,
        shape: Vec<usize>,
        tag: &'static str,
    },

    #[error("got {tags} kind tags for {tensors} tensors")]
    TagCount { tags: usize, tensors: usize },

    #[error("batchnorm block at tensor #{start} has mismatched lengths {lengths:?}")]
    BatchNormLength { start: usize, lengths: Vec<usize> },

    #[error("tensor #{index}: {source}")]
    Tensor {
        index: usize,
        #[source]
        source: TensorError,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type ExportResult<T> = Result<T, ExportError>;
