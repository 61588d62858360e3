// src/config.rs
// ============================================================================
// CONFIG - Opciones del export (JSON opcional + flags del CLI)
// ============================================================================

use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

/// Dígitos tras el punto en notación científica (`1.234500e+00`)
pub const DEFAULT_PRECISION: usize = 6;

/// Valores por línea en el array del `.h`
pub const DEFAULT_VALUES_PER_LINE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub precision: usize,
    pub values_per_line: usize,
    /// Escribe también `NAME.meta.txt` (kind/layout/dims, key=value)
    pub write_meta: bool,
    /// Escribe `manifest.json` con todos los artefactos
    pub write_manifest: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            values_per_line: DEFAULT_VALUES_PER_LINE,
            write_meta: false,
            write_manifest: false,
        }
    }
}

impl ExportConfig {
    /// Lee un JSON; los campos ausentes toman el valor por defecto
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = serde_json::from_str(&data)
            .with_context(|| format!("Invalid config JSON in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.values_per_line > 0, "values_per_line must be at least 1");
        ensure!(
            self.precision <= 16,
            "precision {} is out of range (0..=16)",
            self.precision
        );
        Ok(())
    }
}
