//! muonshield CLI

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod run;

#[derive(Parser)]
#[command(name = "muonshield")]
#[command(about = "muonshield - parallel muon transport through a magnetic shield")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

/// Apparatus and per-muon options shared by `run` and `sweep`.
#[derive(Args, Debug, Clone)]
pub(crate) struct ApparatusArgs {
    /// Base run configuration (JSON, optionally gzip). Flags override its fields.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Parameter source: a preset name (baseline, warm) or a file with one value per line.
    #[arg(long)]
    pub params: Option<String>,

    /// Worker count (clamped to the number of muons; 0 = all cores). Defaults to all cores.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Global seed for the engine, the transport and input shuffling.
    #[arg(long)]
    pub seed: Option<u32>,

    /// Injection distance: start every muon at z = -Z.
    #[arg(long)]
    pub z: Option<f64>,

    /// Axial position of the sensitive film.
    #[arg(long, conflicts_with = "no_sens_plane")]
    pub sens_plane: Option<f64>,

    /// No sensitive film: collect full tracks.
    #[arg(long)]
    pub no_sens_plane: bool,

    /// Use the cached field map (computed once if missing or stale).
    #[arg(long)]
    pub real_fields: bool,

    /// Field-map cache file.
    #[arg(long, default_value = "data/outputs/fields.json.gz")]
    pub field_file: PathBuf,

    /// Delete the field-map cache before running.
    #[arg(long, requires = "real_fields")]
    pub refresh_field_map: bool,

    /// Leave the cavern out of the geometry.
    #[arg(long)]
    pub remove_cavern: bool,

    /// Normal-conducting magnets only. Uses the warm preset unless --params or a
    /// --config file with a `params` field supplies the parameters.
    #[arg(long)]
    pub warm: bool,

    /// Emit an all-zero row for muons without a valid hit.
    #[arg(long)]
    pub return_nan: bool,

    /// Back-track mode: accept tracks whose endpoint lies on the film.
    #[arg(long)]
    pub back_track: bool,

    /// Transverse beam-smearing radius (cm).
    #[arg(long)]
    pub smear_radius: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate one muon file
    Run {
        /// Muon population (JSON array of 7- or 8-column rows, optionally gzip)
        #[arg(short, long)]
        input: PathBuf,

        /// Simulate only the first N muons (0 = all)
        #[arg(short, long, default_value = "0")]
        n: usize,

        /// Shuffle the input before selecting muons
        #[arg(long)]
        shuffle_input: bool,

        /// Keep at most this many records in the output (0 = no cap)
        #[arg(long)]
        cap: Option<usize>,

        /// Save the aggregate as gzip JSON
        #[arg(long)]
        save_output: Option<PathBuf>,

        /// Output file for the run summary (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        apparatus: ApparatusArgs,
    },

    /// Simulate every muon file of a directory and report survival per file
    Sweep {
        /// Directory of muon files (.json / .json.gz)
        #[arg(long)]
        dir: PathBuf,

        /// Directory for per-file hit datasets (muons_data_<n>.json.gz)
        #[arg(long)]
        outputs: Option<PathBuf>,

        /// Output file for the sweep summary (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        apparatus: ApparatusArgs,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { input, n, shuffle_input, cap, save_output, output, apparatus } => {
            run::cmd_run(
                &input,
                n,
                shuffle_input,
                cap,
                save_output.as_ref(),
                output.as_ref(),
                &apparatus,
            )
        }
        Commands::Sweep { dir, outputs, output, apparatus } => {
            run::cmd_sweep(&dir, outputs.as_ref(), output.as_ref(), &apparatus)
        }
        Commands::Version => {
            println!("muonshield {}", ms_core::VERSION);
            Ok(())
        }
    }
}

pub(crate) fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
