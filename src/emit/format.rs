// src/emit/format.rs
// ============================================================================
// FORMAT - Render de .txt / .h / .meta.txt (puro, sin I/O)
// ============================================================================
//
// .txt:
//   1.234500e+00
//   -3.000000e-05
//
// .h:
//   #pragma once
//
//   // kind=conv2d, layout=OIHW
//   // dims: Kh=3, Kw=3, Cin=4, Cout=8
//   static const float w01[] = {
//     1.000000e+00f, 2.000000e+00f, ...,
//     ...
//   };
//
// ============================================================================

use std::fmt::Write as _;

/// Metadatos que acompañan a un artefacto
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMeta {
    pub kind: &'static str,
    pub layout: &'static str,
    pub dims: Vec<(&'static str, usize)>,
}

/// Notación científica compatible con `printf("%.*e")`:
/// mantisa con `precision` decimales, exponente con signo y al menos 2 dígitos.
pub fn format_sci(value: f32, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        let inf = if value > 0.0 { "inf" } else { "-inf" };
        return inf.to_string();
    }

    // f64 para redondear igual que printf (el float se promociona a double)
    let raw = format!("{:.*e}", precision, value as f64);
    let (mantissa, exponent) = raw.split_once('e').unwrap_or((raw.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };

    format!("{}e{}{:02}", mantissa, sign, exponent.unsigned_abs())
}

/// Literal C de un valor; los no finitos usan macros de <math.h>
fn c_literal(value: f32, precision: usize) -> String {
    if value.is_nan() {
        "NAN".to_string()
    } else if value == f32::INFINITY {
        "INFINITY".to_string()
    } else if value == f32::NEG_INFINITY {
        "-INFINITY".to_string()
    } else {
        format!("{}f", format_sci(value, precision))
    }
}

/// Un valor por línea, sin cabecera
pub fn render_txt(values: &[f32], precision: usize) -> String {
    let mut out = String::with_capacity(values.len() * (precision + 8));
    for &v in values {
        out.push_str(&format_sci(v, precision));
        out.push('\n');
    }
    out
}

/// Líneas de comentario del header
pub fn meta_comment_lines(meta: &ArtifactMeta) -> Vec<String> {
    let mut lines = vec![format!("// kind={}, layout={}", meta.kind, meta.layout)];
    if !meta.dims.is_empty() {
        let dims: Vec<String> = meta.dims.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        lines.push(format!("// dims: {}", dims.join(", ")));
    }
    lines
}

/// Declaración `static const float NAME[] = { ... };`
pub fn render_header(
    name: &str,
    meta: Option<&ArtifactMeta>,
    values: &[f32],
    precision: usize,
    per_line: usize,
) -> String {
    let per_line = per_line.max(1);
    let mut out = String::new();

    out.push_str("#pragma once\n");
    if values.iter().any(|v| !v.is_finite()) {
        out.push_str("#include <math.h>\n");
    }
    out.push('\n');

    if let Some(meta) = meta {
        for line in meta_comment_lines(meta) {
            out.push_str(&line);
            out.push('\n');
        }
    }

    let _ = writeln!(out, "static const float {}[] = {{", name);

    let rows: Vec<String> = values
        .chunks(per_line)
        .map(|chunk| {
            let literals: Vec<String> = chunk.iter().map(|&v| c_literal(v, precision)).collect();
            format!("  {}", literals.join(", "))
        })
        .collect();
    out.push_str(&rows.join(",\n"));

    out.push_str("\n};\n");
    out
}

/// Sidecar `key=value` (kind, layout, dims)
pub fn render_meta(meta: &ArtifactMeta) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "kind={}", meta.kind);
    let _ = writeln!(out, "layout={}", meta.layout);
    for (k, v) in &meta.dims {
        let _ = writeln!(out, "{}={}", k, v);
    }
    out
}
