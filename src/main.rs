// src/main.rs
// ============================================================================
// NOODLE-EXPORT CLI
// ============================================================================
//
// Uso simple (heurística):
//   noodle-export ./model.safetensors -o ./weights
//
// Con tags explícitos por tensor:
//   noodle-export ./model.safetensors -o ./weights --tags kinds.json
//
// ============================================================================

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use noodle_export::{
    classify::{create_classifier, load_tags},
    config::ExportConfig,
    exporter::{self, Exporter},
    safetensor,
};

#[derive(Parser, Debug)]
#[command(name = "noodle-export")]
#[command(about = "Export trained model tensors to Noodle .txt/.h weight files")]
#[command(version)]
struct Args {
    /// Input model (.safetensors, tensors in model-definition order)
    #[arg(value_name = "MODEL")]
    model: PathBuf,

    /// Output directory (created if missing)
    #[arg(short, long, required = true)]
    output: PathBuf,

    /// JSON file with explicit per-tensor kinds: {"kinds": ["conv2d", "bias", ...]}
    #[arg(long)]
    tags: Option<PathBuf>,

    /// JSON export config (precision, values_per_line, write_meta, write_manifest)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Digits after the decimal point in scientific notation
    #[arg(short, long)]
    precision: Option<usize>,

    /// Also write NAME.meta.txt sidecars
    #[arg(long)]
    meta: bool,

    /// Also write manifest.json
    #[arg(long)]
    manifest: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let start = Instant::now();

    // Config: archivo → flags
    let mut config = match &args.config {
        Some(path) => ExportConfig::from_file(path)?,
        None => ExportConfig::default(),
    };
    if let Some(precision) = args.precision {
        config.precision = precision;
    }
    config.write_meta |= args.meta;
    config.write_manifest |= args.manifest;
    config.validate()?;

    println!("═══════════════════════════════════════════════════════════════");
    println!("  NOODLE EXPORT v{}", env!("CARGO_PKG_VERSION"));
    println!("═══════════════════════════════════════════════════════════════");
    println!("  Model:      {}", args.model.display());
    println!("  Output:     {}", args.output.display());
    println!("  Classifier: {}", if args.tags.is_some() { "tagged" } else { "heuristic" });
    println!("  Precision:  {}", config.precision);
    println!("═══════════════════════════════════════════════════════════════");

    // ══════════════════════════════════════════════════════════════════════
    // CARGAR TENSORES
    // ══════════════════════════════════════════════════════════════════════

    let tensors = safetensor::load_ordered(&args.model)
        .with_context(|| format!("Failed to load {}", args.model.display()))?;
    println!("\n[LOAD] {} tensors", tensors.len());

    let tags = args.tags.as_ref().map(load_tags).transpose()?;
    let classifier = create_classifier(tags);

    // ══════════════════════════════════════════════════════════════════════
    // PLAN (antes de escribir nada)
    // ══════════════════════════════════════════════════════════════════════

    let plan = exporter::plan(&tensors, classifier.as_ref())?;
    println!("[PLAN] {} steps", plan.len());

    // ══════════════════════════════════════════════════════════════════════
    // EMIT
    // ══════════════════════════════════════════════════════════════════════

    let mut exporter = Exporter::create(&args.output, config, classifier.as_ref())?;

    let progress = ProgressBar::new(plan.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("  [{bar:40}] {pos}/{len} {msg}")?.progress_chars("=> "),
    );
    for step in &plan {
        exporter.run_step(&tensors, step)?;
        progress.inc(1);
    }
    progress.finish_and_clear();

    let report = exporter.finish(&tensors)?;

    // ══════════════════════════════════════════════════════════════════════
    // SUMMARY
    // ══════════════════════════════════════════════════════════════════════

    println!("\n═══════════════════════════════════════════════════════════════");
    println!("  EXPORT COMPLETE");
    println!("═══════════════════════════════════════════════════════════════");
    println!("  Time:       {:.2}s", start.elapsed().as_secs_f64());
    println!("  Weights:    {}", report.weights());
    println!("  Biases:     {}", report.biases());
    println!("  BatchNorm:  {}", report.batchnorms());
    println!("  Skipped:    {}", report.skipped.len());
    for skipped in &report.skipped {
        let name = tensors
            .get(skipped.index)
            .map(|t| t.name.as_str())
            .unwrap_or("?");
        println!("    #{} {} {:?}", skipped.index, name, skipped.shape);
    }
    println!("  Output:     {}", args.output.display());
    println!("═══════════════════════════════════════════════════════════════");

    Ok(())
}
