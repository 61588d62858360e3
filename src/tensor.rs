// src/tensor.rs
// ============================================================================
// TENSOR - Array f32 n-dimensional inmutable (row-major)
// ============================================================================

use crate::error::TensorError;

/// Tensor de entrada tal como sale del framework de entrenamiento.
///
/// Layout siempre row-major (último eje varía más rápido). Rank 0 y rank > 4
/// son representables para que el exportador pueda saltarlos con diagnóstico.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

/// Producto de los ejes; None si no cabe en usize
pub fn checked_numel(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, TensorError> {
        if let Some(axis) = shape.iter().position(|&d| d == 0) {
            return Err(TensorError::ZeroDim { shape, axis });
        }

        let Some(expected) = checked_numel(&shape) else {
            return Err(TensorError::ShapeOverflow { shape });
        };
        if data.len() != expected {
            return Err(TensorError::LengthMismatch {
                shape,
                expected,
                actual: data.len(),
            });
        }

        Ok(Self { shape, data })
    }

    /// Vector rank-1 (bias, parámetros de batchnorm)
    pub fn vector(data: Vec<f32>) -> Result<Self, TensorError> {
        Self::new(vec![data.len()], data)
    }

    /// Tensor cuyo valor en cada posición es su índice plano.
    /// Útil en tests para seguir a dónde va cada elemento al permutar.
    pub fn iota(shape: &[usize]) -> Result<Self, TensorError> {
        let numel = checked_numel(shape).ok_or_else(|| TensorError::ShapeOverflow {
            shape: shape.to_vec(),
        })?;
        Self::new(shape.to_vec(), (0..numel).map(|i| i as f32).collect())
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Tamaño del eje `axis`; admite índices negativos estilo numpy (-1 = último)
    pub fn dim(&self, axis: isize) -> Option<usize> {
        let rank = self.shape.len() as isize;
        let idx = if axis < 0 { rank + axis } else { axis };
        if idx < 0 || idx >= rank {
            return None;
        }
        Some(self.shape[idx as usize])
    }

    pub fn is_vector(&self) -> bool {
        self.shape.len() == 1
    }

    /// Longitud si es rank-1
    pub fn vector_len(&self) -> Option<usize> {
        if self.is_vector() {
            Some(self.shape[0])
        } else {
            None
        }
    }
}

/// Tensor con el nombre que tenía en el archivo de origen
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTensor {
    pub name: String,
    pub tensor: Tensor,
}

impl NamedTensor {
    pub fn new(name: impl Into<String>, tensor: Tensor) -> Self {
        Self {
            name: name.into(),
            tensor,
        }
    }
}
