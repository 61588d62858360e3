// src/classify/mod.rs
// ============================================================================
// CLASSIFY - Decide qué es cada tensor de la lista plana
// ============================================================================

pub mod heuristic;
pub mod tagged;
pub mod traits;
pub mod types;

pub use heuristic::{check_depth_multiplier, classify_kernel, classify_trailing, HeuristicClassifier};
pub use tagged::{load_tags, TaggedClassifier};
pub use traits::Classifier;
pub use types::{KernelKind, Plan, Step, TagFile, TensorTag, Trailing};

/// Crea el clasificador: tags explícitos si los hay, heurística si no
pub fn create_classifier(tags: Option<Vec<TensorTag>>) -> Box<dyn Classifier> {
    match tags {
        Some(tags) => Box::new(TaggedClassifier::new(tags)),
        None => Box::new(HeuristicClassifier),
    }
}
