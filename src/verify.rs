// src/verify.rs
// ============================================================================
// VERIFY - Valida un directorio de salida Noodle
// ============================================================================
//
// Comprueba:
//   1. Cada NAME.txt tiene su NAME.h (y viceversa)
//   2. El identificador del array en el .h == NAME
//   3. Mismo número de valores (y mismos valores) en .txt y .h
//   4. Índices por prefijo 1..N sin huecos
//   5. Si hay manifest.json, checksums XXH3 de cada .txt y aviso por cada
//      par en disco que el manifest no lista (restos de un pase anterior)
//
// ============================================================================

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use xxhash_rust::xxh3::xxh3_64;

use crate::emit::ArtifactKind;
use crate::exporter::MANIFEST_FILE;

/// Resultado de validación
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub artifacts: Vec<ArtifactInfo>,
}

impl VerifyReport {
    fn error(&mut self, msg: String) {
        self.valid = false;
        self.errors.push(msg);
    }

    pub fn count(&self, kind: ArtifactKind) -> usize {
        self.artifacts.iter().filter(|a| a.kind == kind).count()
    }
}

/// Información extraída de un par .txt/.h
#[derive(Debug, Clone)]
pub struct ArtifactInfo {
    pub name: String,
    pub kind: ArtifactKind,
    pub index: usize,
    pub values: usize,
    /// Líneas `// ...` del header
    pub comments: Vec<String>,
}

#[derive(Debug, Default)]
struct Pair {
    txt: bool,
    h: bool,
}

/// Parsea un valor del .txt (formato printf, admite nan/inf)
fn parse_txt_value(token: &str) -> Option<f32> {
    token.trim().parse::<f32>().ok()
}

/// Parsea un literal C del .h
fn parse_c_literal(token: &str) -> Option<f32> {
    match token.trim() {
        "NAN" => Some(f32::NAN),
        "INFINITY" => Some(f32::INFINITY),
        "-INFINITY" => Some(f32::NEG_INFINITY),
        t => t.strip_suffix('f').and_then(|v| v.parse::<f32>().ok()),
    }
}

/// Igualdad bit a bit salvo NaN (cualquier NaN == NaN)
fn same_value(a: f32, b: f32) -> bool {
    (a.is_nan() && b.is_nan()) || a.to_bits() == b.to_bits()
}

/// Valida el directorio `dir`
pub fn verify_dir(dir: impl AsRef<Path>) -> Result<VerifyReport> {
    let dir = dir.as_ref();
    let mut report = VerifyReport {
        valid: true,
        ..VerifyReport::default()
    };

    let name_re = Regex::new(r"^(bn|w|b)(\d{2,})\.(txt|h)$")?;
    let decl_re = Regex::new(r"(?s)static\s+const\s+float\s+(\w+)\s*\[\s*\]\s*=\s*\{(.*?)\}\s*;")?;

    // 1. Inventario de archivos
    let mut pairs: BTreeMap<String, Pair> = BTreeMap::new();
    let mut indices: BTreeMap<&'static str, BTreeSet<usize>> = BTreeMap::new();

    let mut entries: Vec<String> = std::fs::read_dir(dir)
        .with_context(|| format!("Cannot read {}", dir.display()))?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    entries.sort();

    for file_name in &entries {
        let Some(caps) = name_re.captures(file_name) else {
            if file_name != MANIFEST_FILE && !file_name.ends_with(".meta.txt") {
                report.warnings.push(format!("Unexpected file: {}", file_name));
            }
            continue;
        };

        let stem = format!("{}{}", &caps[1], &caps[2]);
        let pair = pairs.entry(stem).or_default();
        match &caps[3] {
            "txt" => pair.txt = true,
            _ => pair.h = true,
        }
    }

    // 2-3. Contenido de cada par
    for (stem, pair) in &pairs {
        if !pair.txt || !pair.h {
            let missing = if pair.txt { "h" } else { "txt" };
            report.error(format!("{}: missing {}.{}", stem, stem, missing));
            continue;
        }

        let digits_at = stem.find(|c: char| c.is_ascii_digit()).unwrap_or(stem.len());
        let (prefix, digits) = stem.split_at(digits_at);
        let Some(kind) = ArtifactKind::from_prefix(prefix) else {
            continue;
        };
        let index: usize = digits.parse().unwrap_or(0);
        indices.entry(kind.prefix()).or_default().insert(index);

        let txt_path = dir.join(format!("{}.txt", stem));
        let txt = std::fs::read_to_string(&txt_path)
            .with_context(|| format!("Cannot read {}", txt_path.display()))?;
        let mut txt_values = Vec::new();
        for (line_no, line) in txt.lines().enumerate() {
            match parse_txt_value(line) {
                Some(v) => txt_values.push(v),
                None => report.error(format!(
                    "{}.txt:{}: invalid value '{}'",
                    stem,
                    line_no + 1,
                    line
                )),
            }
        }

        let h_path = dir.join(format!("{}.h", stem));
        let header = std::fs::read_to_string(&h_path)
            .with_context(|| format!("Cannot read {}", h_path.display()))?;

        if !header.trim_start().starts_with("#pragma once") {
            report.warnings.push(format!("{}.h: missing #pragma once guard", stem));
        }

        let comments: Vec<String> = header
            .lines()
            .filter(|l| l.starts_with("//"))
            .map(|l| l.to_string())
            .collect();

        let Some(decl) = decl_re.captures(&header) else {
            report.error(format!("{}.h: no static const float array declaration", stem));
            continue;
        };

        if &decl[1] != stem.as_str() {
            report.error(format!("{}.h: array is named '{}'", stem, &decl[1]));
        }

        let mut h_values = Vec::new();
        for token in decl[2].split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match parse_c_literal(token) {
                Some(v) => h_values.push(v),
                None => report.error(format!("{}.h: invalid literal '{}'", stem, token)),
            }
        }

        if h_values.len() != txt_values.len() {
            report.error(format!(
                "{}: {} values in .txt but {} in .h",
                stem,
                txt_values.len(),
                h_values.len()
            ));
        } else if let Some(pos) = txt_values
            .iter()
            .zip(&h_values)
            .position(|(a, b)| !same_value(*a, *b))
        {
            report.error(format!(
                "{}: value #{} differs ({} in .txt, {} in .h)",
                stem, pos, txt_values[pos], h_values[pos]
            ));
        }

        report.artifacts.push(ArtifactInfo {
            name: stem.clone(),
            kind,
            index,
            values: txt_values.len(),
            comments,
        });
    }

    // 4. Índices contiguos
    for (prefix, set) in &indices {
        for (expected, &actual) in (1..).zip(set.iter()) {
            if expected != actual {
                report.error(format!(
                    "{}: index gap, expected {}{:02} but found {}{:02}",
                    prefix, prefix, expected, prefix, actual
                ));
                break;
            }
        }
    }

    // 5. Manifest
    let manifest_path = dir.join(MANIFEST_FILE);
    if manifest_path.exists() {
        check_manifest(dir, &manifest_path, &mut report)?;
    }

    report.artifacts.sort_by(|a, b| (a.kind.prefix(), a.index).cmp(&(b.kind.prefix(), b.index)));
    Ok(report)
}

fn check_manifest(dir: &Path, manifest_path: &Path, report: &mut VerifyReport) -> Result<()> {
    let raw = std::fs::read_to_string(manifest_path)
        .with_context(|| format!("Cannot read {}", manifest_path.display()))?;
    let manifest: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid JSON in {}", manifest_path.display()))?;

    let Some(artifacts) = manifest.get("artifacts").and_then(|v| v.as_array()) else {
        report.error(format!("{}: no artifacts array", MANIFEST_FILE));
        return Ok(());
    };

    let mut listed = BTreeSet::new();
    for entry in artifacts {
        let name = entry.get("name").and_then(|v| v.as_str()).unwrap_or("?");
        listed.insert(name.to_string());
        let expected = entry.get("xxh3").and_then(|v| v.as_str()).unwrap_or("");

        let txt_path = dir.join(format!("{}.txt", name));
        let Ok(bytes) = std::fs::read(&txt_path) else {
            report.error(format!("{}: listed artifact {} not found", MANIFEST_FILE, name));
            continue;
        };

        let actual = format!("{:016x}", xxh3_64(&bytes));
        if actual != expected {
            report.error(format!(
                "{}.txt: checksum {} does not match manifest {}",
                name, actual, expected
            ));
        }
    }

    for artifact in &report.artifacts {
        if !listed.contains(&artifact.name) {
            report.warnings.push(format!(
                "{}: not listed in {} (left over from a previous export?)",
                artifact.name, MANIFEST_FILE
            ));
        }
    }

    Ok(())
}
