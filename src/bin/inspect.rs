// src/bin/inspect.rs
// ============================================================================
// NOODLE INSPECTOR - Inspecciona y valida un directorio de pesos exportados
// ============================================================================
//
// Uso: noodle-inspect ./weights [--comments] [--strict]
//
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use noodle_export::emit::ArtifactKind;
use noodle_export::verify::verify_dir;

#[derive(Parser)]
#[command(name = "noodle-inspect")]
#[command(about = "Inspect and verify a Noodle weight directory")]
struct Args {
    /// Directory written by noodle-export
    dir: PathBuf,

    /// Show header metadata comments
    #[arg(long)]
    comments: bool,

    /// Treat warnings as errors
    #[arg(long)]
    strict: bool,
}

fn run(args: &Args) -> Result<bool> {
    let report = verify_dir(&args.dir)?;

    println!("═══════════════════════════════════════════════════════════════");
    println!("  NOODLE INSPECT: {}", args.dir.display());
    println!("═══════════════════════════════════════════════════════════════");
    println!("  {:<8} {:<10} {:>10}", "NAME", "KIND", "VALUES");
    println!("  ─────────────────────────────────");

    for artifact in &report.artifacts {
        println!(
            "  {:<8} {:<10} {:>10}",
            artifact.name,
            artifact.kind.name(),
            artifact.values
        );
        if args.comments {
            for line in &artifact.comments {
                println!("           {}", line);
            }
        }
    }

    println!("  ─────────────────────────────────");
    println!(
        "  weights: {}  biases: {}  batchnorm: {}",
        report.count(ArtifactKind::Weight),
        report.count(ArtifactKind::Bias),
        report.count(ArtifactKind::BatchNorm)
    );

    for warning in &report.warnings {
        println!("  ⚠ {}", warning);
    }
    for error in &report.errors {
        println!("  ✗ {}", error);
    }

    let ok = report.valid && !(args.strict && !report.warnings.is_empty());
    println!("═══════════════════════════════════════════════════════════════");
    println!("  {}", if ok { "✓ VALID" } else { "✗ INVALID" });
    println!("═══════════════════════════════════════════════════════════════");

    Ok(ok)
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    if run(&args)? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
