use anyhow::{Context, Result};
use ms_core::{MagnetVariant, SensitiveFilm};
use ms_sim::{BallisticEngine, ReferenceBuilder, RunConfig, persist, presets};
use std::path::{Path, PathBuf};

use crate::{ApparatusArgs, write_json};

fn load_params(source: &str) -> Result<Vec<f64>> {
    if let Some(p) = presets::preset(source) {
        return Ok(p.to_vec());
    }
    let path = Path::new(source);
    if !path.exists() {
        anyhow::bail!(
            "--params {source:?} is neither a preset ({}) nor an existing file",
            presets::preset_names().join(", ")
        );
    }
    persist::read_parameters(path).with_context(|| format!("reading parameters from {source}"))
}

/// Base configuration (file or defaults) with command-line overrides applied.
fn run_config(args: &ApparatusArgs) -> Result<RunConfig> {
    let (mut config, config_params) = match &args.config {
        Some(path) => {
            let raw: serde_json::Value = persist::read_json(path)
                .with_context(|| format!("reading run config {}", path.display()))?;
            let has_params = raw.get("params").is_some();
            let config: RunConfig = serde_json::from_value(raw)
                .with_context(|| format!("parsing run config {}", path.display()))?;
            (config, has_params)
        }
        None => (RunConfig::default(), false),
    };
    let opts = &mut config.options;

    if args.warm {
        opts.magnet = MagnetVariant::NormalConducting;
        if !config_params {
            config.params = presets::WARM.to_vec();
        }
    }
    if let Some(source) = &args.params {
        config.params = load_params(source)?;
    }
    if let Some(w) = args.workers {
        config.workers = w;
    }
    if let Some(s) = args.seed {
        opts.seed = Some(s);
    }
    if let Some(z) = args.z {
        opts.input_dist = Some(z);
    }
    if args.no_sens_plane {
        opts.sensitive_film = None;
    } else if let Some(pos) = args.sens_plane {
        let film = opts.sensitive_film.unwrap_or_default();
        opts.sensitive_film = Some(SensitiveFilm { position: pos, ..film });
    }
    if args.real_fields {
        opts.use_field_maps = true;
        opts.field_map_path = Some(args.field_file.clone());
    }
    if args.remove_cavern {
        opts.add_cavern = false;
    }
    if args.return_nan {
        opts.return_nan = true;
    }
    if args.back_track {
        opts.back_track = true;
    }
    if let Some(r) = args.smear_radius {
        opts.smear_radius_cm = r;
    }
    Ok(config)
}

fn refresh_field_map(args: &ApparatusArgs) -> Result<()> {
    if args.refresh_field_map && args.field_file.exists() {
        std::fs::remove_file(&args.field_file)
            .with_context(|| format!("removing {}", args.field_file.display()))?;
        tracing::info!(path = %args.field_file.display(), "field map cache removed");
    }
    Ok(())
}

pub(crate) fn cmd_run(
    input: &Path,
    n: usize,
    shuffle_input: bool,
    cap: Option<usize>,
    save_output: Option<&PathBuf>,
    output: Option<&PathBuf>,
    args: &ApparatusArgs,
) -> Result<()> {
    let mut config = run_config(args)?;
    if let Some(c) = cap {
        config.output_cap = (c > 0).then_some(c);
    }
    refresh_field_map(args)?;

    let mut batch = persist::load_muon_batch(input)
        .with_context(|| format!("loading muons from {}", input.display()))?;
    if shuffle_input {
        persist::shuffle_batch(&mut batch, config.options.seed.map(u64::from));
    }
    persist::select_muons(&mut batch, n);
    tracing::info!(n_muons = batch.len(), weighted = batch.layout().is_weighted(), "input loaded");

    let summary = ms_sim::simulate_batch(&BallisticEngine, &ReferenceBuilder, &batch, &config)?;
    let result = &summary.result;

    if let Some(path) = save_output {
        persist::write_json(path, result)
            .with_context(|| format!("saving output to {}", path.display()))?;
    }

    let output_json = serde_json::json!({
        "engine": summary.engine,
        "n_input": batch.len(),
        "n_workers": summary.n_workers,
        "total_mass": result.total_mass,
        "n_records": result.n_records,
        "truncated": result.truncated,
        "survival": result.survival,
        "field_map": summary.field_map,
        "field_map_s": summary.field_map_s,
        "simulation_s": summary.simulation_s,
        "hits": result.rows(),
    });

    write_json(output, output_json)
}

pub(crate) fn cmd_sweep(
    dir: &Path,
    outputs: Option<&PathBuf>,
    output: Option<&PathBuf>,
    args: &ApparatusArgs,
) -> Result<()> {
    let config = run_config(args)?;
    refresh_field_map(args)?;

    let summary = ms_sim::sweep_directory(
        &BallisticEngine,
        &ReferenceBuilder,
        dir,
        &config,
        outputs.map(PathBuf::as_path),
    )?;
    tracing::info!(
        n_files = summary.files.len(),
        survival_rate = summary.survival_rate,
        "sweep complete"
    );

    write_json(output, serde_json::to_value(&summary)?)
}
