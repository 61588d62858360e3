// src/layout.rs
// ============================================================================
// LAYOUT - Transcodifica kernels al orden de ejes que espera Noodle
// ============================================================================
//
//   Conv2D       (Kh,Kw,Cin,Cout) → (Cout,Cin,Kh,Kw)   OIHW
//   Depthwise2D  (Kh,Kw,Cin,1)    → (Cin,Kh,Kw)        CIMHW (M=1 desaparece)
//   Conv1D       (K,Cin,Cout)     → (Cout,Cin,K)       OIK
//   Depthwise1D  (K,Cin,M)        → (Cin,M,K)          CMK
//   Dense        (Din,Dout)       → (Dout,Din)         OI
//   Bias         (C)              → (C)
//   BatchNorm    4 x (C)          → gamma|beta|mean|var
//
// Siempre row-major tras la permutación. No hay otras permutaciones legales.
//
// ============================================================================

use crate::classify::KernelKind;
use crate::error::{ExportError, ExportResult};
use crate::tensor::Tensor;

/// Orden de almacenamiento destino
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Oihw,
    Cimhw,
    Oik,
    Cmk,
    Oi,
    C,
    GammaBetaMeanVar,
}

impl Layout {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Oihw => "OIHW",
            Self::Cimhw => "CIMHW",
            Self::Oik => "OIK",
            Self::Cmk => "CMK",
            Self::Oi => "OI",
            Self::C => "C",
            Self::GammaBetaMeanVar => "gamma,beta,mean,var",
        }
    }
}

impl std::fmt::Display for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Resultado de transcodificar: valores planos + metadatos para el header
#[derive(Debug, Clone, PartialEq)]
pub struct Transcoded {
    pub values: Vec<f32>,
    pub layout: Layout,
    /// Dimensiones de origen, en el orden en que se documentan
    pub dims: Vec<(&'static str, usize)>,
}

/// Permuta los ejes de un tensor row-major y lo aplana.
///
/// `axes[i]` es el eje de origen que pasa a ocupar la posición `i`.
pub fn permute(shape: &[usize], data: &[f32], axes: &[usize]) -> Vec<f32> {
    let rank = shape.len();
    debug_assert_eq!(axes.len(), rank);
    debug_assert_eq!(data.len(), shape.iter().product::<usize>());

    // Strides de origen (row-major)
    let mut strides = vec![1usize; rank];
    for i in (0..rank.saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }

    let out_shape: Vec<usize> = axes.iter().map(|&a| shape[a]).collect();
    let out_strides: Vec<usize> = axes.iter().map(|&a| strides[a]).collect();

    let mut out = Vec::with_capacity(data.len());
    let mut idx = vec![0usize; rank];
    let mut offset = 0usize;

    for _ in 0..data.len() {
        out.push(data[offset]);

        // Odómetro sobre el índice de salida; el último eje gira más rápido
        for d in (0..rank).rev() {
            idx[d] += 1;
            offset += out_strides[d];
            if idx[d] < out_shape[d] {
                break;
            }
            offset -= out_strides[d] * out_shape[d];
            idx[d] = 0;
        }
    }

    out
}

/// Transcodifica el kernel `tensor` (posición `index` en la lista) según `kind`
pub fn transcode(index: usize, tensor: &Tensor, kind: KernelKind) -> ExportResult<Transcoded> {
    let shape = tensor.shape();
    let data = tensor.data();

    let mismatch = || ExportError::TagMismatch {
        index,
        shape: shape.to_vec(),
        tag: kind.name(),
    };

    let transcoded = match (kind, shape) {
        (KernelKind::Conv2D, &[kh, kw, cin, cout]) => Transcoded {
            values: permute(shape, data, &[3, 2, 0, 1]),
            layout: Layout::Oihw,
            dims: vec![("Kh", kh), ("Kw", kw), ("Cin", cin), ("Cout", cout)],
        },
        (KernelKind::Depthwise2D, &[kh, kw, cin, m]) => Transcoded {
            values: permute(shape, data, &[2, 3, 0, 1]),
            layout: Layout::Cimhw,
            dims: vec![("Kh", kh), ("Kw", kw), ("Cin", cin), ("M", m), ("Cout", cin * m)],
        },
        (KernelKind::Conv1D, &[k, cin, cout]) => Transcoded {
            values: permute(shape, data, &[2, 1, 0]),
            layout: Layout::Oik,
            dims: vec![("K", k), ("Cin", cin), ("Cout", cout)],
        },
        (KernelKind::Depthwise1D, &[k, cin, m]) => Transcoded {
            values: permute(shape, data, &[1, 2, 0]),
            layout: Layout::Cmk,
            dims: vec![("K", k), ("Cin", cin), ("M", m), ("Cout", cin * m)],
        },
        (KernelKind::Dense, &[din, dout]) => Transcoded {
            values: permute(shape, data, &[1, 0]),
            layout: Layout::Oi,
            dims: vec![("Din", din), ("Dout", dout)],
        },
        _ => return Err(mismatch()),
    };

    Ok(transcoded)
}

/// Bias: identidad
pub fn vector(index: usize, tensor: &Tensor) -> ExportResult<Transcoded> {
    let len = tensor.vector_len().ok_or_else(|| ExportError::TagMismatch {
        index,
        shape: tensor.shape().to_vec(),
        tag: "bias",
    })?;

    Ok(Transcoded {
        values: tensor.data().to_vec(),
        layout: Layout::C,
        dims: vec![("C", len)],
    })
}

/// Empaqueta gamma, beta, mean, var (en ese orden) en un solo array de 4*C
pub fn pack_batchnorm(start: usize, params: [&Tensor; 4]) -> ExportResult<Transcoded> {
    let lengths: Vec<usize> = params.iter().map(|t| t.numel()).collect();
    if params.iter().any(|t| !t.is_vector()) || lengths.iter().any(|&n| n != lengths[0]) {
        return Err(ExportError::BatchNormLength { start, lengths });
    }

    let values: Vec<f32> = params.iter().flat_map(|t| t.data().iter().copied()).collect();

    Ok(Transcoded {
        values,
        layout: Layout::GammaBetaMeanVar,
        dims: vec![("C", lengths[0])],
    })
}
