// src/emit/mod.rs
// ============================================================================
// EMIT - Escribe los pares NAME.txt / NAME.h en el directorio de salida
// ============================================================================
//
// Nombres: w01.. (kernels), b01.. (bias), bn01.. (batchnorm empaquetado).
// Cada prefijo tiene su propio contador, empezando en 1, sin huecos.
// Los archivos existentes se sobrescriben sin aviso.
//
// ============================================================================

pub mod format;

use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;
use xxhash_rust::xxh3::xxh3_64;

use crate::config::ExportConfig;
use crate::error::{ExportError, ExportResult};
use crate::layout::Transcoded;

pub use format::{format_sci, render_header, render_meta, render_txt, ArtifactMeta};

/// Tipo de artefacto → prefijo del nombre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Weight,
    Bias,
    BatchNorm,
}

impl ArtifactKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Weight => "w",
            Self::Bias => "b",
            Self::BatchNorm => "bn",
        }
    }

    /// Mismo nombre que en el manifest
    pub fn name(&self) -> &'static str {
        match self {
            Self::Weight => "weight",
            Self::Bias => "bias",
            Self::BatchNorm => "batchnorm",
        }
    }

    /// Inverso de `prefix`
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "w" => Some(Self::Weight),
            "b" => Some(Self::Bias),
            "bn" => Some(Self::BatchNorm),
            _ => None,
        }
    }
}

/// `w` + 7 → `w07`
pub fn artifact_name(kind: ArtifactKind, index: usize) -> String {
    format!("{}{:02}", kind.prefix(), index)
}

/// Contadores independientes por prefijo (último índice emitido)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub weights: usize,
    pub biases: usize,
    pub batchnorms: usize,
}

impl Counters {
    /// Incrementa y devuelve el índice a usar
    pub fn next(&mut self, kind: ArtifactKind) -> usize {
        let slot = match kind {
            ArtifactKind::Weight => &mut self.weights,
            ArtifactKind::Bias => &mut self.biases,
            ArtifactKind::BatchNorm => &mut self.batchnorms,
        };
        *slot += 1;
        *slot
    }

    pub fn get(&self, kind: ArtifactKind) -> usize {
        match kind {
            ArtifactKind::Weight => self.weights,
            ArtifactKind::Bias => self.biases,
            ArtifactKind::BatchNorm => self.batchnorms,
        }
    }
}

/// Un artefacto ya escrito
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub name: String,
    pub kind: ArtifactKind,
    /// conv2d, dense, bias, batchnorm...
    pub tag: &'static str,
    pub layout: &'static str,
    pub dims: Vec<(&'static str, usize)>,
    pub len: usize,
    /// Índices de los tensores de entrada que lo forman
    pub sources: Vec<usize>,
    pub txt_path: PathBuf,
    pub h_path: PathBuf,
    /// XXH3-64 del contenido del .txt
    pub checksum: u64,
}

/// Escritor de artefactos; lleva el estado de contadores del pase
pub struct Emitter {
    dir: PathBuf,
    config: ExportConfig,
    counters: Counters,
}

impl Emitter {
    /// Crea el directorio de salida (con padres) si no existe
    pub fn create(dir: impl AsRef<Path>, config: ExportConfig) -> ExportResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| ExportError::io(&dir, e))?;

        Ok(Self {
            dir,
            config,
            counters: Counters::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    fn write(&self, path: &Path, contents: &str) -> ExportResult<()> {
        std::fs::write(path, contents).map_err(|e| ExportError::io(path, e))
    }

    /// Escribe NAME.txt y NAME.h (y NAME.meta.txt si está activado)
    pub fn emit(
        &mut self,
        kind: ArtifactKind,
        tag: &'static str,
        transcoded: &Transcoded,
        sources: Vec<usize>,
    ) -> ExportResult<Artifact> {
        let index = self.counters.next(kind);
        let name = artifact_name(kind, index);

        let meta = ArtifactMeta {
            kind: tag,
            layout: transcoded.layout.name(),
            dims: transcoded.dims.clone(),
        };

        let precision = self.config.precision;
        let txt = render_txt(&transcoded.values, precision);
        let header = render_header(
            &name,
            Some(&meta),
            &transcoded.values,
            precision,
            self.config.values_per_line,
        );

        let txt_path = self.dir.join(format!("{}.txt", name));
        let h_path = self.dir.join(format!("{}.h", name));
        self.write(&txt_path, &txt)?;
        self.write(&h_path, &header)?;

        if self.config.write_meta {
            let meta_path = self.dir.join(format!("{}.meta.txt", name));
            self.write(&meta_path, &render_meta(&meta))?;
        }

        info!(
            "{} ({}, {}, {} values) <- tensor {:?}",
            name,
            tag,
            meta.layout,
            transcoded.values.len(),
            sources
        );

        Ok(Artifact {
            name,
            kind,
            tag,
            layout: meta.layout,
            dims: meta.dims,
            len: transcoded.values.len(),
            sources,
            txt_path,
            h_path,
            checksum: xxh3_64(txt.as_bytes()),
        })
    }
}
