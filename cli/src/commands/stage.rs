use anyhow::Result;
use tracing::info;
use urbanform::Stage;

use crate::commands::open_pipeline;

pub fn run(_cli: &crate::cli::Cli, stage: Stage, args: &crate::cli::PipelineArgs) -> Result<()> {
    let mut pipeline = open_pipeline(args)?;
    pipeline.run_stage(stage)?;
    info!(%stage, store = %args.store.display(), "stage complete");
    Ok(())
}
