// src/classify/tagged.rs
// ============================================================================
// TAGGED CLASSIFIER - El llamador dice qué es cada tensor
// ============================================================================
//
// Con tags no hay heurística: el tag decide el tipo y el shape solo se valida.
// Reglas:
//   kernel → [bias] → [batchnorm x4]   (ambos opcionales, en ese orden)
//   bias suelto           → StandaloneBias
//   batchnorm x4 suelto   → StandaloneBatchNorm
//   rank 0 / rank > 4     → Skip (igual que en la heurística), también
//                           en posición de bias/batchnorm: corta el bloque
//
// ============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};

use super::heuristic::check_depth_multiplier;
use super::traits::Classifier;
use super::types::{Plan, Step, TagFile, TensorTag, Trailing};
use crate::error::{ExportError, ExportResult};

/// Lee `{ "kinds": [...] }`
pub fn load_tags(path: impl AsRef<Path>) -> Result<Vec<TensorTag>> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file: TagFile = serde_json::from_str(&data)
        .with_context(|| format!("Invalid tag file {}", path.display()))?;
    Ok(file.kinds)
}

/// Rank 1..=4: lo que el exportador sabe emitir
fn supported(shape: &[usize]) -> bool {
    !shape.is_empty() && shape.len() <= 4
}

#[derive(Debug, Clone)]
pub struct TaggedClassifier {
    tags: Vec<TensorTag>,
}

impl TaggedClassifier {
    pub fn new(tags: Vec<TensorTag>) -> Self {
        Self { tags }
    }

    /// Lee un archivo de tags JSON
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(load_tags(path)?))
    }

    pub fn tags(&self) -> &[TensorTag] {
        &self.tags
    }

    fn tag_at(&self, k: usize) -> Option<TensorTag> {
        self.tags.get(k).copied()
    }

    /// Valida que `shapes[k]` sea rank-1 para un tag bias/batchnorm
    fn expect_vector(shapes: &[&[usize]], k: usize, tag: TensorTag) -> ExportResult<usize> {
        match shapes[k] {
            &[n] => Ok(n),
            other => Err(ExportError::TagMismatch {
                index: k,
                shape: other.to_vec(),
                tag: tag.name(),
            }),
        }
    }

    /// Cuatro tags batchnorm consecutivos desde `start`, ninguno con rank no soportado
    fn is_batchnorm_block(&self, shapes: &[&[usize]], start: usize) -> bool {
        (start..start + 4).all(|i| {
            self.tag_at(i) == Some(TensorTag::Batchnorm) && shapes.get(i).is_some_and(|s| supported(s))
        })
    }

    /// Valida el bloque gamma/beta/mean/var: rank-1 y misma longitud
    fn check_batchnorm(shapes: &[&[usize]], start: usize) -> ExportResult<()> {
        let lengths = (start..start + 4)
            .map(|i| Self::expect_vector(shapes, i, TensorTag::Batchnorm))
            .collect::<ExportResult<Vec<usize>>>()?;
        if lengths.iter().any(|&n| n != lengths[0]) {
            return Err(ExportError::BatchNormLength { start, lengths });
        }
        Ok(())
    }

    fn trailing(&self, shapes: &[&[usize]], k: usize) -> ExportResult<Trailing> {
        let next = k + 1;

        // Un tensor con rank no soportado corta el bloque: el bucle principal lo salta
        if self.tag_at(next) == Some(TensorTag::Bias) && supported(shapes[next]) {
            Self::expect_vector(shapes, next, TensorTag::Bias)?;
            if self.is_batchnorm_block(shapes, next + 1) {
                Self::check_batchnorm(shapes, next + 1)?;
                return Ok(Trailing::BiasBatchNorm { bias: next });
            }
            return Ok(Trailing::Bias { index: next });
        }

        if self.is_batchnorm_block(shapes, next) {
            Self::check_batchnorm(shapes, next)?;
            return Ok(Trailing::BatchNorm { start: next });
        }

        Ok(Trailing::None)
    }
}

impl Classifier for TaggedClassifier {
    fn name(&self) -> &str {
        "tagged"
    }

    fn plan(&self, shapes: &[&[usize]]) -> ExportResult<Plan> {
        if self.tags.len() != shapes.len() {
            return Err(ExportError::TagCount {
                tags: self.tags.len(),
                tensors: shapes.len(),
            });
        }

        let mut plan = Plan::new();
        let mut k = 0;

        while k < shapes.len() {
            let shape = shapes[k];
            let tag = self.tags[k];

            let step = if shape.is_empty() || shape.len() > 4 {
                warn!("tensor #{} tagged '{}' has unsupported shape {:?}", k, tag.name(), shape);
                Step::Skip {
                    index: k,
                    shape: shape.to_vec(),
                }
            } else if let Some(kind) = tag.kernel_kind() {
                if shape.len() != kind.rank() {
                    return Err(ExportError::TagMismatch {
                        index: k,
                        shape: shape.to_vec(),
                        tag: tag.name(),
                    });
                }
                if tag == TensorTag::Depthwise2d {
                    check_depth_multiplier(k, shape)?;
                }
                Step::Kernel {
                    index: k,
                    kind,
                    trailing: self.trailing(shapes, k)?,
                }
            } else if tag == TensorTag::Bias {
                Self::expect_vector(shapes, k, tag)?;
                Step::StandaloneBias { index: k }
            } else if self.is_batchnorm_block(shapes, k) {
                Self::check_batchnorm(shapes, k)?;
                Step::StandaloneBatchNorm { start: k }
            } else {
                // batchnorm incompleto (menos de 4 tags seguidos)
                return Err(ExportError::TagMismatch {
                    index: k,
                    shape: shape.to_vec(),
                    tag: tag.name(),
                });
            };

            debug!("tensor #{} [{}] -> {:?}", k, tag.name(), step);
            k += step.consumed();
            plan.push(step);
        }

        Ok(plan)
    }
}
