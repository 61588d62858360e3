// src/classify/types.rs
// ============================================================================
// CLASSIFY TYPES - Tipos básicos del clasificador de tensores
// ============================================================================

use serde::{Deserialize, Serialize};

/// Tipo de kernel decidido para un tensor de pesos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelKind {
    /// (Kh, Kw, Cin, Cout)
    Conv2D,
    /// (Kh, Kw, Cin, 1) - solo multiplier 1
    Depthwise2D,
    /// (K, Cin, Cout)
    Conv1D,
    /// (K, Cin, M)
    Depthwise1D,
    /// (Din, Dout)
    Dense,
}

impl KernelKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Conv2D => "conv2d",
            Self::Depthwise2D => "depthwise2d",
            Self::Conv1D => "conv1d",
            Self::Depthwise1D => "depthwise1d",
            Self::Dense => "dense",
        }
    }

    /// Rank que debe tener el tensor para este tipo
    pub fn rank(&self) -> usize {
        match self {
            Self::Conv2D | Self::Depthwise2D => 4,
            Self::Conv1D | Self::Depthwise1D => 3,
            Self::Dense => 2,
        }
    }
}

impl std::fmt::Display for KernelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Bloque de bias/batchnorm que sigue a un kernel (índices absolutos)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trailing {
    None,
    Bias { index: usize },
    /// gamma, beta, mean, var en `start..start + 4`
    BatchNorm { start: usize },
    /// bias en `bias`, batchnorm en `bias + 1..bias + 5`
    BiasBatchNorm { bias: usize },
}

impl Trailing {
    /// Número de tensores que consume el bloque
    pub fn consumed(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Bias { .. } => 1,
            Self::BatchNorm { .. } => 4,
            Self::BiasBatchNorm { .. } => 5,
        }
    }

    pub fn bias_index(&self) -> Option<usize> {
        match *self {
            Self::Bias { index } => Some(index),
            Self::BiasBatchNorm { bias } => Some(bias),
            _ => None,
        }
    }

    pub fn batchnorm_start(&self) -> Option<usize> {
        match *self {
            Self::BatchNorm { start } => Some(start),
            Self::BiasBatchNorm { bias } => Some(bias + 1),
            _ => None,
        }
    }
}

/// Paso del plan de exportación, en orden de procesado
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Kernel {
        index: usize,
        kind: KernelKind,
        trailing: Trailing,
    },
    /// Rank-1 que no sigue a ningún kernel
    StandaloneBias { index: usize },
    /// Cuatro rank-1 etiquetados batchnorm fuera de un kernel (solo con tags)
    StandaloneBatchNorm { start: usize },
    /// Rank 0 o rank > 4: se salta sin abortar
    Skip { index: usize, shape: Vec<usize> },
}

impl Step {
    /// Número de tensores de entrada cubiertos por el paso
    pub fn consumed(&self) -> usize {
        match self {
            Self::Kernel { trailing, .. } => 1 + trailing.consumed(),
            Self::StandaloneBias { .. } | Self::Skip { .. } => 1,
            Self::StandaloneBatchNorm { .. } => 4,
        }
    }
}

/// Plan completo: se calcula ANTES de escribir nada
pub type Plan = Vec<Step>;

/// Tag explícito por tensor (rediseño: elimina la heurística)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorTag {
    Conv2d,
    Depthwise2d,
    Conv1d,
    Depthwise1d,
    Dense,
    Bias,
    Batchnorm,
}

impl TensorTag {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Conv2d => "conv2d",
            Self::Depthwise2d => "depthwise2d",
            Self::Conv1d => "conv1d",
            Self::Depthwise1d => "depthwise1d",
            Self::Dense => "dense",
            Self::Bias => "bias",
            Self::Batchnorm => "batchnorm",
        }
    }

    /// Kernel correspondiente, None para bias/batchnorm
    pub fn kernel_kind(&self) -> Option<KernelKind> {
        match self {
            Self::Conv2d => Some(KernelKind::Conv2D),
            Self::Depthwise2d => Some(KernelKind::Depthwise2D),
            Self::Conv1d => Some(KernelKind::Conv1D),
            Self::Depthwise1d => Some(KernelKind::Depthwise1D),
            Self::Dense => Some(KernelKind::Dense),
            Self::Bias | Self::Batchnorm => None,
        }
    }
}

/// Archivo de tags: `{ "kinds": ["conv2d", "bias", ...] }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagFile {
    pub kinds: Vec<TensorTag>,
}
