// src/classify/heuristic.rs
// ============================================================================
// HEURISTIC CLASSIFIER - Clasifica por rank, shape y adyacencia
// ============================================================================
//
// Los pesos guardados son una lista SIN tipos, así que solo tenemos:
//   - rank del tensor
//   - tamaños de sus ejes
//   - longitud de los rank-1 que vienen justo detrás
//
// Nunca se mira más allá del bloque inmediatamente siguiente al kernel.
//
// Ambigüedad conocida: 4 bias independientes de igual longitud detrás de un
// kernel son indistinguibles de un bloque batchnorm. Se toma batchnorm.
//
// ============================================================================

use log::debug;

use super::traits::Classifier;
use super::types::{KernelKind, Plan, Step, Trailing};
use crate::error::{ExportError, ExportResult};

/// Longitud si el shape es rank-1
fn vector_len(shape: &[usize]) -> Option<usize> {
    match shape {
        [n] => Some(*n),
        _ => None,
    }
}

/// `count` tensores a partir de `start`, todos rank-1 y de la misma longitud
fn same_length_vectors(shapes: &[&[usize]], start: usize, count: usize) -> bool {
    let Some(block) = shapes.get(start..start + count) else {
        return false;
    };
    let Some(first) = block.first().and_then(|s| vector_len(s)) else {
        return false;
    };
    block.iter().all(|s| vector_len(s) == Some(first))
}

/// Depthwise2D exige multiplier 1; cualquier otro valor aborta el export
pub fn check_depth_multiplier(index: usize, shape: &[usize]) -> ExportResult<()> {
    let multiplier = shape.last().copied().unwrap_or(0);
    if multiplier != 1 {
        return Err(ExportError::DepthMultiplier {
            index,
            shape: shape.to_vec(),
            multiplier,
        });
    }
    Ok(())
}

/// Decide el tipo de kernel de `shapes[k]`.
/// Devuelve None si el rank no corresponde a un kernel (0, 1 o > 4).
pub fn classify_kernel(shapes: &[&[usize]], k: usize) -> ExportResult<Option<KernelKind>> {
    let kind = match shapes[k] {
        &[kh, kw, cin, last] => {
            let kind = if kh == 1 && kw == 1 {
                // 1x1 nunca es depthwise
                KernelKind::Conv2D
            } else if last == 1 && cin >= 2 {
                KernelKind::Depthwise2D
            } else {
                KernelKind::Conv2D
            };
            if kind == KernelKind::Depthwise2D {
                check_depth_multiplier(k, shapes[k])?;
            }
            kind
        }
        &[_, cin, cout] => {
            let next_len = shapes.get(k + 1).and_then(|s| vector_len(s));
            if next_len == Some(cout) {
                KernelKind::Conv1D
            } else if next_len == Some(cin * cout) {
                KernelKind::Depthwise1D
            } else if cout <= 4 && cin >= 2 {
                KernelKind::Depthwise1D
            } else {
                KernelKind::Conv1D
            }
        }
        &[_, _] => KernelKind::Dense,
        _ => return Ok(None),
    };

    debug!("tensor #{} {:?} -> {}", k, shapes[k], kind);
    Ok(Some(kind))
}

/// Clasifica el bloque bias/batchnorm que sigue al kernel en `k`
pub fn classify_trailing(shapes: &[&[usize]], k: usize) -> Trailing {
    let next = k + 1;

    if same_length_vectors(shapes, next, 5) {
        Trailing::BiasBatchNorm { bias: next }
    } else if same_length_vectors(shapes, next, 4) {
        Trailing::BatchNorm { start: next }
    } else if shapes.get(next).and_then(|s| vector_len(s)).is_some() {
        Trailing::Bias { index: next }
    } else {
        Trailing::None
    }
}

/// Clasificador por defecto cuando no hay tags explícitos
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicClassifier;

impl Classifier for HeuristicClassifier {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn plan(&self, shapes: &[&[usize]]) -> ExportResult<Plan> {
        let mut plan = Plan::new();
        let mut k = 0;

        while k < shapes.len() {
            let step = match classify_kernel(shapes, k)? {
                Some(kind) => {
                    let trailing = classify_trailing(shapes, k);
                    debug!("tensor #{} trailing block: {:?}", k, trailing);
                    Step::Kernel {
                        index: k,
                        kind,
                        trailing,
                    }
                }
                None if shapes[k].len() == 1 => Step::StandaloneBias { index: k },
                None => Step::Skip {
                    index: k,
                    shape: shapes[k].to_vec(),
                },
            };

            k += step.consumed();
            plan.push(step);
        }

        Ok(plan)
    }
}
