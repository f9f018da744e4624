use anyhow::{bail, Result};
use tracing::info;

use crate::commands::open_pipeline;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::RunArgs) -> Result<()> {
    if args.road_access && args.pipeline.roads.is_none() {
        bail!("[run] --road-access needs --roads");
    }
    let mut pipeline = open_pipeline(&args.pipeline)?;

    let informality = pipeline.run()?;
    info!(cells = informality.table.height(), "morphological informality");

    if args.road_access {
        let access = pipeline.road_access()?;
        info!(cells = access.table.height(), "road access deprivation");
    }

    println!("{}", args.pipeline.store.display());
    Ok(())
}
