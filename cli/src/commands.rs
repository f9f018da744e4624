pub mod config;
pub mod run;
pub mod stage;

use anyhow::{Context, Result};
use tracing::info;
use urbanform::{Config, Inputs, Pipeline, Stage, Store, StoreFormat};

use crate::cli::{ConfigArgs, PipelineArgs};

/// Configuration file (or defaults) with the command line overrides applied.
pub fn load_config(args: &ConfigArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(epsg) = args.input_epsg { config.preprocess.input_epsg = epsg }
    if let Some(size) = args.cell_size { config.grid.cell_size = size }
    if !args.ks.is_empty() { config.clustering.ks = args.ks.clone() }
    if let Some(seed) = args.seed { config.clustering.seed = seed }
    if let Some(k) = args.model_k { config.model.k = k }
    if let Some(threshold) = args.threshold { config.road_access.threshold = threshold }

    config.validate()?;
    Ok(config)
}

/// Pipeline over the on-disk store named by `args`.
pub fn open_pipeline(args: &PipelineArgs) -> Result<Pipeline> {
    let config = load_config(&args.config)?;
    let format = match &args.format {
        Some(format) => format.parse::<StoreFormat>()?,
        None => StoreFormat::default(),
    };
    let force = args.force.iter()
        .map(|name| name.parse::<Stage>())
        .collect::<Result<Vec<_>>>()?;

    let store = Store::disk(&args.store, format)
        .with_context(|| format!("[cli] Failed to open store at {}", args.store.display()))?;
    info!(store = %args.store.display(), ?format, "opened store");

    let inputs = Inputs {
        roi: args.roi.clone(),
        buildings: args.buildings.clone(),
        roads: args.roads.clone(),
        grid: args.grid.clone(),
    };
    Ok(Pipeline::new(store, config, inputs).force(&force))
}
