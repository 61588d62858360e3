// src/lib.rs
// ============================================================================
// NOODLE-EXPORT - Pesos de modelos entrenados → arrays planos .txt / .h
// ============================================================================

pub mod classify;
pub mod config;
pub mod emit;
pub mod error;
pub mod exporter;
pub mod layout;
pub mod safetensor;
pub mod tensor;
pub mod verify;

// Re-exports principales
pub use classify::{create_classifier, Classifier, HeuristicClassifier, KernelKind, Step, TaggedClassifier, TensorTag, Trailing};
pub use config::ExportConfig;
pub use emit::{artifact_name, Artifact, ArtifactKind, Counters};
pub use error::{ExportError, ExportResult, TensorError};
pub use exporter::{export, export_with, ExportReport, Exporter, TensorSource};
pub use layout::{transcode, Layout, Transcoded};
pub use tensor::{NamedTensor, Tensor};
pub use verify::{verify_dir, VerifyReport};
