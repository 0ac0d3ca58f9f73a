//! Create or print the config file

use anyhow::{bail, Result};
use colored::Colorize;

use super::AppContext;
use crate::config::CliConfig;

pub fn init(ctx: &AppContext, force: bool) -> Result<()> {
    let path = &ctx.config_path;
    if path.exists() && !force {
        bail!("{} already exists. Use --force to overwrite.", path.display());
    }

    let config = CliConfig {
        created_at: Some(chrono::Utc::now().to_rfc3339()),
        ..CliConfig::default()
    };
    config.save(path)?;

    println!("{}", "Config written".green());
    println!("  {}", path.display());
    println!();
    println!(
        "{}",
        "Set networks.<name>.gateway_address (and signer, to send transactions) before redeeming."
            .dimmed()
    );
    Ok(())
}

pub fn show(ctx: &AppContext) -> Result<()> {
    if !ctx.config_path.exists() {
        println!(
            "{}",
            format!("{} not found; showing defaults", ctx.config_path.display()).yellow()
        );
    }
    println!("{}", serde_json::to_string_pretty(&ctx.config)?);
    Ok(())
}
