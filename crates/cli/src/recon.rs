//! `parcel-recon run` / `parcel-recon validate`.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use tracing::info;

use parcel_recon::load::{load_input, load_keywords};
use parcel_recon::{Lexicon, PipelineConfig, ReconError, ReconResult};

use crate::exit_codes::{
    recon_exit_code, EXIT_RECON_INVALID_CONFIG, EXIT_RECON_REVIEW_PENDING, EXIT_RECON_RUNTIME,
};
use crate::export::{write_outputs, RunDocument};
use crate::CliError;

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Reconcile the feeds named in a pipeline config
    #[command(after_help = "\
Examples:
  parcel-recon run pipeline.toml
  parcel-recon run pipeline.toml --output out/
  parcel-recon run pipeline.toml --json --strict")]
    Run {
        /// Path to the pipeline .toml config file
        config: PathBuf,

        /// Print the run report as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Directory for sales.csv, properties.csv, manual_review.csv and report.json
        #[arg(long, default_value = "out")]
        output: PathBuf,

        /// Exit 62 when records are left for manual review
        #[arg(long)]
        strict: bool,

        /// Log every matching decision (same as RUST_LOG=debug)
        #[arg(long, short = 'v')]
        verbose: bool,
    },

    /// Check a pipeline config without reading any input
    #[command(after_help = "\
Examples:
  parcel-recon validate pipeline.toml")]
    Validate {
        /// Path to the pipeline .toml config file
        config: PathBuf,
    },
}

impl ReconCommands {
    pub fn verbose(&self) -> bool {
        matches!(self, Self::Run { verbose: true, .. })
    }
}

pub fn cmd_recon(cmd: ReconCommands) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run {
            config,
            json,
            output,
            strict,
            verbose: _,
        } => cmd_recon_run(&config, json, &output, strict),
        ReconCommands::Validate { config } => cmd_recon_validate(&config),
    }
}

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

fn engine_err(err: ReconError) -> CliError {
    recon_err(recon_exit_code(&err), err.to_string())
}

fn read_config(config_path: &Path) -> Result<PipelineConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot read config: {e}")))?;
    PipelineConfig::from_toml(&config_str).map_err(engine_err)
}

fn base_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

/// Load every input the config names and run the pipeline.
fn run_config(config_path: &Path) -> Result<ReconResult, CliError> {
    let config = read_config(config_path)?;
    let base = base_dir(config_path);

    let inputs = config.inputs.as_ref().ok_or_else(|| {
        recon_err(EXIT_RECON_INVALID_CONFIG, "config has no [inputs] section")
            .with_hint("name the registry, register and parcels CSV files under [inputs]")
    })?;

    let keywords = load_keywords(&config, base).map_err(engine_err)?;
    let lexicon = Lexicon::compile(&keywords).map_err(engine_err)?;
    let input = load_input(inputs, base, &lexicon).map_err(engine_err)?;
    info!(
        registry = input.registry.len(),
        register = input.register.len(),
        parcels = input.parcels.len(),
        brokerage = input.brokerage.len(),
        listings = input.listings.len(),
        "inputs loaded"
    );

    parcel_recon::run_with_lexicon(&config, &lexicon, &input).map_err(engine_err)
}

fn cmd_recon_run(config_path: &Path, json: bool, output: &Path, strict: bool) -> Result<(), CliError> {
    let result = run_config(config_path)?;

    let written = write_outputs(output, &result).map_err(|e| recon_err(EXIT_RECON_RUNTIME, e))?;
    for path in &written {
        eprintln!("wrote {}", path.display());
    }

    if json {
        let json_str = serde_json::to_string_pretty(&RunDocument::of(&result))
            .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    // Human summary to stderr
    let s = &result.summary;
    eprintln!(
        "'{}': {} registry + {} brokerage sales in, {} + {} out, {} cross-feed duplicates, {} for review",
        result.meta.config_name,
        s.registry_in,
        s.brokerage_in,
        s.registry_sales,
        s.brokerage_sales,
        s.duplicates_removed,
        s.manual_review,
    );
    if s.listings_in > 0 {
        eprintln!("listings: {} checked, {} flagged", s.listings_in, s.listings_flagged);
    }

    if strict && s.manual_review > 0 {
        return Err(recon_err(
            EXIT_RECON_REVIEW_PENDING,
            format!("{} record(s) need manual review", s.manual_review),
        )
        .with_hint(format!("see {}", output.join(crate::export::REVIEW_FILE).display())));
    }
    Ok(())
}

fn cmd_recon_validate(config_path: &Path) -> Result<(), CliError> {
    let config = read_config(config_path)?;
    let keywords = load_keywords(&config, base_dir(config_path)).map_err(engine_err)?;
    Lexicon::compile(&keywords).map_err(engine_err)?;

    eprintln!(
        "valid: pipeline '{}' (trust {}, keywords v{}{})",
        config.name,
        config.trust,
        keywords.version,
        if config.inputs.is_some() { "" } else { ", no inputs" },
    );
    Ok(())
}
