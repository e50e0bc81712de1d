//! Likeness command-line driver
//!
//! Argument parsing and the generation run behind the `likeness` binary.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

use anyhow::Context;
use clap::Parser;
use likeness_codegen::catalog::load_path;
use likeness_codegen::{
    open_output, Catalog, ClasslibConfig, CompileCache, GenerateReport, Generator, OutputFormat,
    SeedSet,
};
use std::path::PathBuf;

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "likeness")]
#[command(about = "Generate reflection-free dispatch code from a type catalog", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Type catalog: JSON file, directory of JSON files, or zip archive
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// Output directory or archive
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,

    /// Output format (jar or folder); inferred from the output path when absent
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// Class library archive (repeatable)
    #[arg(long = "classlib-jar", value_name = "PATH")]
    pub classlib_jars: Vec<PathBuf>,

    /// Class library directory (repeatable)
    #[arg(long = "classlib-dir", value_name = "PATH")]
    pub classlib_dirs: Vec<PathBuf>,

    /// Runtime home carrying lib/catalog.json (repeatable)
    #[arg(long = "classlib-jre", value_name = "PATH")]
    pub classlib_jres: Vec<PathBuf>,

    /// Include the embedded class library alongside the configured ones
    #[arg(long)]
    pub embedded_classlib: bool,

    /// Additional seeds (TOML)
    #[arg(long, value_name = "FILE")]
    pub seeds: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Class library configuration from the `--classlib-*` options
    pub fn classlib(&self) -> ClasslibConfig {
        ClasslibConfig {
            jars: self.classlib_jars.clone(),
            dirs: self.classlib_dirs.clone(),
            runtime_homes: self.classlib_jres.clone(),
            embedded: self.embedded_classlib,
        }
    }

    /// Explicit format, or the one the output path implies
    pub fn output_format(&self) -> OutputFormat {
        self.format
            .unwrap_or_else(|| OutputFormat::infer(&self.output))
    }
}

/// Load, generate and write; returns the run summary
pub fn run(cli: &Cli) -> anyhow::Result<GenerateReport> {
    let library = cli
        .classlib()
        .resolve()
        .context("Invalid class library configuration")?;
    let input = load_path(&cli.input)
        .with_context(|| format!("Failed to load type catalog {}", cli.input.display()))?;
    let catalog = Catalog::builder()
        .with_input(input)
        .with_library(library)
        .build();

    let mut seeds = SeedSet::from_catalog(&catalog);
    if let Some(path) = &cli.seeds {
        let extra = SeedSet::load_toml(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        seeds.merge(extra);
    }
    if seeds.is_empty() {
        log::warn!("No seeds found in {}", cli.input.display());
    }

    let generated = Generator::new(&catalog).generate(&seeds, &mut CompileCache::new())?;

    let format = cli.output_format();
    let target = open_output(&cli.output, format)
        .with_context(|| format!("Failed to open output {}", cli.output.display()))?;
    generated
        .write_to(target)
        .with_context(|| format!("Failed to write output {}", cli.output.display()))?;
    log::info!("Wrote {:?} output to {}", format, cli.output.display());

    Ok(generated.report)
}

/// Print the run summary
pub fn print_report(report: &GenerateReport) {
    println!(
        "Generated {} types ({} reflective, {} proxy targets)",
        report.generated.len(),
        report.reflective_types,
        report.proxy_types
    );
    if !report.unresolved.is_empty() {
        println!("  Unresolved: {}", report.unresolved.join(", "));
    }
    for skipped in &report.skipped {
        println!("  Skipped {}: {}", skipped.type_name, skipped.reason);
    }
}
