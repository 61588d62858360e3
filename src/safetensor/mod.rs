// src/safetensor/mod.rs
// ============================================================================
// SAFETENSOR READER - Lee la lista ordenada de tensores del modelo
// ============================================================================
//
// El header JSON de safetensors es un mapa SIN orden, pero el exporter
// necesita el orden de definición del modelo. Se recupera así:
//   1. __metadata__["order"] = JSON array con los nombres, si existe
//   2. si no, orden del offset de datos (los writers escriben en orden)
//
// ============================================================================

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};

use crate::tensor::{NamedTensor, Tensor};

/// Clave de __metadata__ con el orden explícito de tensores
pub const ORDER_KEY: &str = "order";

/// Información de un tensor en el archivo safetensor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorInfo {
    pub dtype: String,
    pub shape: Vec<usize>,
    pub data_offsets: [usize; 2],
}

/// Header del archivo safetensor
#[derive(Debug, Deserialize)]
pub struct SafetensorHeader {
    #[serde(flatten)]
    pub tensors: HashMap<String, TensorInfo>,
    #[serde(rename = "__metadata__")]
    pub metadata: Option<HashMap<String, String>>,
}

/// Archivo safetensor abierto
pub struct SafetensorFile {
    pub path: PathBuf,
    pub header: SafetensorHeader,
    pub header_size: usize,
    mmap: Mmap,
}

impl SafetensorFile {
    /// Abre un archivo safetensor
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .with_context(|| format!("Cannot open {}", path.display()))?;

        // Tamaño del header: primeros 8 bytes, u64 little-endian
        let mut reader = BufReader::new(&file);
        let header_size = reader
            .read_u64::<LittleEndian>()
            .with_context(|| format!("{} is too small for a safetensors header", path.display()))?;
        let header_size = usize::try_from(header_size)
            .with_context(|| format!("{} declares an oversized safetensors header", path.display()))?;

        // El tamaño declarado viene del archivo: validar antes de reservar
        let file_len = file
            .metadata()
            .with_context(|| format!("Cannot stat {}", path.display()))?
            .len();
        if header_size as u64 > file_len.saturating_sub(8) {
            bail!(
                "{} declares a {} byte safetensors header but the file is only {} bytes",
                path.display(),
                header_size,
                file_len
            );
        }

        let mut header_bytes = vec![0u8; header_size];
        reader
            .read_exact(&mut header_bytes)
            .with_context(|| format!("Truncated safetensors header in {}", path.display()))?;

        let header: SafetensorHeader = serde_json::from_slice(&header_bytes)
            .with_context(|| "Invalid safetensor header JSON")?;

        // Memory map el archivo
        let mmap = unsafe { Mmap::map(&file)? };

        Ok(Self {
            path,
            header,
            header_size: 8 + header_size,
            mmap,
        })
    }

    pub fn len(&self) -> usize {
        self.header.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.header.tensors.is_empty()
    }

    /// Obtiene información de un tensor
    pub fn tensor_info(&self, name: &str) -> Option<&TensorInfo> {
        self.header.tensors.get(name)
    }

    /// Nombres en orden de definición del modelo
    pub fn ordered_names(&self) -> Result<Vec<String>> {
        let explicit = self
            .header
            .metadata
            .as_ref()
            .and_then(|m| m.get(ORDER_KEY));

        if let Some(raw) = explicit {
            let names: Vec<String> = serde_json::from_str(raw)
                .with_context(|| format!("__metadata__.{} is not a JSON array of names", ORDER_KEY))?;
            for name in &names {
                if !self.header.tensors.contains_key(name) {
                    bail!("__metadata__.{} names unknown tensor '{}'", ORDER_KEY, name);
                }
            }
            if names.len() != self.header.tensors.len() {
                bail!(
                    "__metadata__.{} lists {} tensors, file has {}",
                    ORDER_KEY,
                    names.len(),
                    self.header.tensors.len()
                );
            }
            return Ok(names);
        }

        let mut entries: Vec<(&String, &TensorInfo)> = self.header.tensors.iter().collect();
        // Empate de offset (tensores vacíos) → por nombre, para ser deterministas
        entries.sort_by(|a, b| a.1.data_offsets[0].cmp(&b.1.data_offsets[0]).then(a.0.cmp(b.0)));
        Ok(entries.into_iter().map(|(name, _)| name.clone()).collect())
    }

    /// Lee un tensor como bytes raw
    pub fn read_raw(&self, name: &str) -> Result<&[u8]> {
        let info = self.header.tensors.get(name)
            .ok_or_else(|| anyhow!("Tensor '{}' not found", name))?;

        let start = self.header_size + info.data_offsets[0];
        let end = self.header_size + info.data_offsets[1];
        if start > end || end > self.mmap.len() {
            bail!(
                "Tensor '{}' has offsets {:?} outside {}",
                name,
                info.data_offsets,
                self.path.display()
            );
        }

        Ok(&self.mmap[start..end])
    }

    /// Lee un tensor como f32 (convierte desde dtype original)
    pub fn read_f32(&self, name: &str) -> Result<Vec<f32>> {
        let info = self.tensor_info(name)
            .ok_or_else(|| anyhow!("Tensor '{}' not found", name))?;
        let data = self.read_raw(name)?;

        let width = match info.dtype.as_str() {
            "F32" => 4,
            "F16" | "BF16" => 2,
            "F64" => 8,
            dtype => bail!("Tensor '{}' has unsupported dtype {}", name, dtype),
        };
        if data.len() % width != 0 {
            bail!("Tensor '{}' byte length {} is not a multiple of {}", name, data.len(), width);
        }

        let values = match info.dtype.as_str() {
            "F32" => {
                let mut out = vec![0f32; data.len() / 4];
                LittleEndian::read_f32_into(data, &mut out);
                out
            }
            "F16" => data
                .chunks_exact(2)
                .map(|b| half::f16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
            "BF16" => data
                .chunks_exact(2)
                .map(|b| half::bf16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
            _ => data
                .chunks_exact(8)
                .map(|b| LittleEndian::read_f64(b) as f32)
                .collect(),
        };

        Ok(values)
    }

    /// Lee un tensor completo
    pub fn read_tensor(&self, name: &str) -> Result<Tensor> {
        let info = self.tensor_info(name)
            .ok_or_else(|| anyhow!("Tensor '{}' not found", name))?;
        let data = self.read_f32(name)?;
        Tensor::new(info.shape.clone(), data)
            .with_context(|| format!("Tensor '{}' in {}", name, self.path.display()))
    }

    /// Todos los tensores en orden de definición
    pub fn read_ordered(&self) -> Result<Vec<NamedTensor>> {
        self.ordered_names()?
            .into_iter()
            .map(|name| {
                let tensor = self.read_tensor(&name)?;
                Ok(NamedTensor::new(name, tensor))
            })
            .collect()
    }
}

/// Atajo: abre y lee todo en orden
pub fn load_ordered(path: impl AsRef<Path>) -> Result<Vec<NamedTensor>> {
    SafetensorFile::open(path)?.read_ordered()
}

/// Escribe tensores F32 en un safetensors, guardando el orden en __metadata__
pub fn write_f32(path: impl AsRef<Path>, tensors: &[NamedTensor]) -> Result<()> {
    let path = path.as_ref();

    let mut header = serde_json::Map::new();
    let order: Vec<&str> = tensors.iter().map(|t| t.name.as_str()).collect();
    let mut metadata = serde_json::Map::new();
    metadata.insert(
        ORDER_KEY.to_string(),
        serde_json::Value::String(serde_json::to_string(&order)?),
    );
    header.insert("__metadata__".to_string(), serde_json::Value::Object(metadata));

    let mut offset = 0usize;
    for t in tensors {
        let size = t.tensor.numel() * 4;
        let info = TensorInfo {
            dtype: "F32".to_string(),
            shape: t.tensor.shape().to_vec(),
            data_offsets: [offset, offset + size],
        };
        header.insert(t.name.clone(), serde_json::to_value(info)?);
        offset += size;
    }

    let header_bytes = serde_json::to_vec(&serde_json::Value::Object(header))?;

    let file = File::create(path)
        .with_context(|| format!("Cannot create {}", path.display()))?;
    let mut file = BufWriter::new(file);
    file.write_u64::<LittleEndian>(header_bytes.len() as u64)?;
    file.write_all(&header_bytes)?;
    for t in tensors {
        for &v in t.tensor.data() {
            file.write_f32::<LittleEndian>(v)?;
        }
    }
    file.flush()?;

    Ok(())
}
