use anyhow::Result;

use crate::commands::load_config;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::ConfigArgs) -> Result<()> {
    let config = load_config(args)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
