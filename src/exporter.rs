// src/exporter.rs
// ============================================================================
// EXPORTER - Orquestador del pase único de exportación
// ============================================================================
//
// El exporter es TONTO:
// - NO decide tipos (lo hace el Classifier)
// - NO conoce layouts (lo hace layout::transcode)
// - Solo planifica, transcodifica y emite, en orden
//
// El plan completo se calcula ANTES de tocar el disco: un error fatal
// (depthwise con multiplier != 1) aborta sin escribir ningún artefacto.
//
// ============================================================================

use std::path::Path;

use log::{info, warn};
use serde::Serialize;
use serde_json::json;

use crate::classify::{Classifier, HeuristicClassifier, Plan, Step};
use crate::config::ExportConfig;
use crate::emit::{ArtifactKind, Artifact, Counters, Emitter};
use crate::error::{ExportError, ExportResult};
use crate::layout::{self, Transcoded};
use crate::tensor::{NamedTensor, Tensor};

/// Nombre del manifest opcional en el directorio de salida
pub const MANIFEST_FILE: &str = "manifest.json";

/// Cualquier cosa que aporte un tensor (con o sin nombre de origen)
pub trait TensorSource {
    fn tensor(&self) -> &Tensor;

    fn name(&self) -> Option<&str> {
        None
    }
}

impl TensorSource for Tensor {
    fn tensor(&self) -> &Tensor {
        self
    }
}

impl TensorSource for NamedTensor {
    fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// Tensor saltado por shape no soportado (rank 0 o > 4)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTensor {
    pub index: usize,
    pub shape: Vec<usize>,
}

/// Resultado del export
#[derive(Debug, Default)]
pub struct ExportReport {
    pub counters: Counters,
    pub skipped: Vec<SkippedTensor>,
    pub artifacts: Vec<Artifact>,
}

impl ExportReport {
    pub fn weights(&self) -> usize {
        self.counters.weights
    }

    pub fn biases(&self) -> usize {
        self.counters.biases
    }

    pub fn batchnorms(&self) -> usize {
        self.counters.batchnorms
    }

    pub fn total_artifacts(&self) -> usize {
        self.artifacts.len()
    }

    pub fn artifact(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.name == name)
    }
}

/// Clasifica la lista completa
pub fn plan<T: TensorSource>(tensors: &[T], classifier: &dyn Classifier) -> ExportResult<Plan> {
    let shapes: Vec<&[usize]> = tensors.iter().map(|t| t.tensor().shape()).collect();
    classifier.plan(&shapes)
}

/// Estado de un pase de exportación en curso
pub struct Exporter {
    emitter: Emitter,
    classifier_name: String,
    report: ExportReport,
}

impl Exporter {
    /// Prepara el directorio de salida
    pub fn create(dir: impl AsRef<Path>, config: ExportConfig, classifier: &dyn Classifier) -> ExportResult<Self> {
        Ok(Self {
            emitter: Emitter::create(dir, config)?,
            classifier_name: classifier.name().to_string(),
            report: ExportReport::default(),
        })
    }

    fn emit(
        &mut self,
        kind: ArtifactKind,
        tag: &'static str,
        transcoded: Transcoded,
        sources: Vec<usize>,
    ) -> ExportResult<()> {
        let artifact = self.emitter.emit(kind, tag, &transcoded, sources)?;
        self.report.artifacts.push(artifact);
        Ok(())
    }

    fn emit_batchnorm<T: TensorSource>(&mut self, tensors: &[T], start: usize) -> ExportResult<()> {
        let params = [
            tensors[start].tensor(),
            tensors[start + 1].tensor(),
            tensors[start + 2].tensor(),
            tensors[start + 3].tensor(),
        ];
        let packed = layout::pack_batchnorm(start, params)?;
        self.emit(ArtifactKind::BatchNorm, "batchnorm", packed, (start..start + 4).collect())
    }

    fn emit_bias<T: TensorSource>(&mut self, tensors: &[T], index: usize) -> ExportResult<()> {
        let bias = layout::vector(index, tensors[index].tensor())?;
        self.emit(ArtifactKind::Bias, "bias", bias, vec![index])
    }

    /// Ejecuta un paso del plan: kernel → bias → batchnorm
    pub fn run_step<T: TensorSource>(&mut self, tensors: &[T], step: &Step) -> ExportResult<()> {
        match step {
            Step::Kernel { index, kind, trailing } => {
                let weights = layout::transcode(*index, tensors[*index].tensor(), *kind)?;
                self.emit(ArtifactKind::Weight, kind.name(), weights, vec![*index])?;

                if let Some(bias) = trailing.bias_index() {
                    self.emit_bias(tensors, bias)?;
                }
                if let Some(start) = trailing.batchnorm_start() {
                    self.emit_batchnorm(tensors, start)?;
                }
            }
            Step::StandaloneBias { index } => self.emit_bias(tensors, *index)?,
            Step::StandaloneBatchNorm { start } => self.emit_batchnorm(tensors, *start)?,
            Step::Skip { index, shape } => {
                warn!("Skipping unsupported tensor #{} with shape {:?}", index, shape);
                self.report.skipped.push(SkippedTensor {
                    index: *index,
                    shape: shape.clone(),
                });
            }
        }
        Ok(())
    }

    /// Cierra el pase; escribe manifest.json si está activado
    pub fn finish<T: TensorSource>(mut self, tensors: &[T]) -> ExportResult<ExportReport> {
        self.report.counters = self.emitter.counters();

        let config = self.emitter.config();
        if config.write_manifest {
            let manifest = build_manifest(&self.report, tensors, &self.classifier_name, config);
            let path = self.emitter.dir().join(MANIFEST_FILE);
            let bytes = serde_json::to_vec_pretty(&manifest)
                .map_err(|e| ExportError::io(&path, e.into()))?;
            std::fs::write(&path, bytes).map_err(|e| ExportError::io(&path, e))?;
        }

        info!(
            "export done: {} weights, {} biases, {} batchnorm, {} skipped",
            self.report.weights(),
            self.report.biases(),
            self.report.batchnorms(),
            self.report.skipped.len()
        );

        Ok(self.report)
    }
}

/// Manifest determinista (sin timestamps ni rutas absolutas)
fn build_manifest<T: TensorSource>(
    report: &ExportReport,
    tensors: &[T],
    classifier: &str,
    config: &ExportConfig,
) -> serde_json::Value {
    let source = |i: usize| {
        json!({
            "index": i,
            "name": tensors.get(i).and_then(|t| t.name()),
            "shape": tensors.get(i).map(|t| t.tensor().shape()),
        })
    };

    let artifacts: Vec<serde_json::Value> = report
        .artifacts
        .iter()
        .map(|a| {
            let dims: serde_json::Map<String, serde_json::Value> =
                a.dims.iter().map(|(k, v)| (k.to_string(), json!(v))).collect();
            json!({
                "name": a.name,
                "kind": a.kind,
                "tag": a.tag,
                "layout": a.layout,
                "dims": dims,
                "len": a.len,
                "sources": a.sources.iter().map(|&i| source(i)).collect::<Vec<_>>(),
                "xxh3": format!("{:016x}", a.checksum),
            })
        })
        .collect();

    json!({
        "format": "noodle",
        "generator": concat!("noodle-export ", env!("CARGO_PKG_VERSION")),
        "classifier": classifier,
        "precision": config.precision,
        "counts": {
            "weights": report.weights(),
            "biases": report.biases(),
            "batchnorms": report.batchnorms(),
            "skipped": report.skipped.len(),
        },
        "artifacts": artifacts,
        "skipped": report.skipped.iter().map(|s| source(s.index)).collect::<Vec<_>>(),
    })
}

/// Export completo con una estrategia y configuración dadas
pub fn export_with<T: TensorSource>(
    tensors: &[T],
    classifier: &dyn Classifier,
    dir: impl AsRef<Path>,
    config: &ExportConfig,
) -> ExportResult<ExportReport> {
    // Primero el plan: si falla no se toca el disco
    let plan = plan(tensors, classifier)?;
    info!("{} tensors -> {} steps ({} classifier)", tensors.len(), plan.len(), classifier.name());

    let mut exporter = Exporter::create(dir, config.clone(), classifier)?;
    for step in &plan {
        exporter.run_step(tensors, step)?;
    }
    exporter.finish(tensors)
}

/// Export con heurística y configuración por defecto
pub fn export<T: TensorSource>(tensors: &[T], dir: impl AsRef<Path>) -> ExportResult<ExportReport> {
    export_with(tensors, &HeuristicClassifier, dir, &ExportConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skipped_tensors_do_not_abort() {
        let tmp = tempfile::tempdir().unwrap();
        let tensors = vec![
            Tensor::new(vec![], vec![3.0]).unwrap(),
            Tensor::iota(&[4, 2]).unwrap(),
            Tensor::iota(&[1, 1, 1, 1, 2]).unwrap(),
        ];
        let report = export(&tensors, tmp.path()).unwrap();
        assert_eq!(report.weights(), 1);
        assert_eq!(
            report.skipped,
            vec![
                SkippedTensor { index: 0, shape: vec![] },
                SkippedTensor { index: 2, shape: vec![1, 1, 1, 1, 2] },
            ]
        );
    }

    #[test]
    fn test_manifest_lists_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let tensors = vec![
            NamedTensor::new("dense/kernel", Tensor::iota(&[3, 2]).unwrap()),
            NamedTensor::new("dense/bias", Tensor::vector(vec![0.5, -0.5]).unwrap()),
        ];
        let config = ExportConfig {
            write_manifest: true,
            ..ExportConfig::default()
        };
        export_with(&tensors, &HeuristicClassifier, tmp.path(), &config).unwrap();

        let raw = std::fs::read_to_string(tmp.path().join(MANIFEST_FILE)).unwrap();
        let manifest: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(manifest["classifier"], "heuristic");
        assert_eq!(manifest["counts"]["weights"], 1);
        assert_eq!(manifest["counts"]["biases"], 1);
        assert_eq!(manifest["artifacts"][0]["name"], "w01");
        assert_eq!(manifest["artifacts"][0]["kind"], "weight");
        assert_eq!(manifest["artifacts"][0]["dims"]["Din"], 3);
        assert_eq!(manifest["artifacts"][1]["sources"][0]["name"], "dense/bias");
    }
}
