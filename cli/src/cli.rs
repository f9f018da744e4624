use std::path::PathBuf;

use urbanform::Stage;

/// Morphological informality and road access indicators from building footprints
#[derive(clap::Parser, Debug)]
#[command(name = "urbanform", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run the informality stages end to end
    Run(RunArgs),

    /// Print the effective configuration as JSON
    Config(ConfigArgs),

    /// Clean buildings and roads, and link buildings to their nearest street
    Preprocess(PipelineArgs),

    /// Build the morphological tessellation
    Tessellate(PipelineArgs),

    /// Generate urban blocks
    Blocks(PipelineArgs),

    /// Compute the morphometric characters
    Morphometrics(PipelineArgs),

    /// Summarise morphometrics per grid cell
    Aggregate(PipelineArgs),

    /// Cluster the grid cells
    Cluster(PipelineArgs),

    /// Classify grid cells by morphological informality
    Classify(PipelineArgs),

    /// Road access deprivation per grid cell
    RoadAccess(PipelineArgs),
}

impl Commands {
    /// The stage a single-stage subcommand runs.
    pub fn stage(&self) -> Option<(Stage, &PipelineArgs)> {
        match self {
            Commands::Run(_) | Commands::Config(_) => None,
            Commands::Preprocess(args) => Some((Stage::Preprocess, args)),
            Commands::Tessellate(args) => Some((Stage::Tessellate, args)),
            Commands::Blocks(args) => Some((Stage::Blocks, args)),
            Commands::Morphometrics(args) => Some((Stage::Morphometrics, args)),
            Commands::Aggregate(args) => Some((Stage::Aggregate, args)),
            Commands::Cluster(args) => Some((Stage::Cluster, args)),
            Commands::Classify(args) => Some((Stage::Classify, args)),
            Commands::RoadAccess(args) => Some((Stage::RoadAccess, args)),
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct PipelineArgs {
    /// Stage store directory, created if missing
    #[arg(short, long, default_value = "urbanform-store", value_hint = clap::ValueHint::DirPath)]
    pub store: PathBuf,

    /// Stage file format: parquet or geojson
    #[arg(long)]
    pub format: Option<String>,

    /// Region of interest (GeoJSON or shapefile)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub roi: Option<PathBuf>,

    /// Building footprints (GeoJSON or shapefile)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub buildings: Option<PathBuf>,

    /// Road network (GeoJSON or shapefile)
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub roads: Option<PathBuf>,

    /// Existing analysis grid; a regular grid is generated otherwise
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub grid: Option<PathBuf>,

    /// Recompute these stages and everything after them, even if cached (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub force: Vec<String>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Also compute road access deprivation (needs --roads)
    #[arg(long)]
    pub road_access: bool,
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// JSON configuration file
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// EPSG code of the input files
    #[arg(long)]
    pub input_epsg: Option<u32>,

    /// Grid cell size in metres
    #[arg(long)]
    pub cell_size: Option<f64>,

    /// Cluster counts to try (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub ks: Vec<usize>,

    /// Clustering seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Cluster count used by the informality model
    #[arg(long)]
    pub model_k: Option<usize>,

    /// Mean buildings in between at or above which road access counts as poor
    #[arg(long)]
    pub threshold: Option<f64>,
}
