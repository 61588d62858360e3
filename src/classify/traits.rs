// src/classify/traits.rs
// ============================================================================
// CLASSIFIER TRAIT - Interfaz común heurística / tags explícitos
// ============================================================================

use super::types::Plan;
use crate::error::ExportResult;

/// Trait para estrategias de clasificación.
///
/// El clasificador es PURO:
/// - Solo ve shapes (nunca valores)
/// - NO escribe nada, solo produce el plan
/// - Cada tensor de entrada queda cubierto por exactamente un paso
pub trait Classifier {
    /// Nombre de la estrategia ("heuristic", "tagged")
    fn name(&self) -> &str;

    /// Recorre la lista en orden y produce el plan de exportación.
    /// Falla solo con errores fatales de configuración.
    fn plan(&self, shapes: &[&[usize]]) -> ExportResult<Plan>;
}
