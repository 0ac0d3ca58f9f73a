//! Show configuration and network info

use anyhow::Result;
use colored::Colorize;

use super::AppContext;

pub fn run(ctx: &AppContext) -> Result<()> {
    let config = &ctx.config;

    println!();
    println!("{}", "Voucher Configuration".yellow().bold());
    println!();

    println!("{}:", "Config File".cyan());
    if ctx.config_path.exists() {
        println!("  {}", ctx.config_path.display());
    } else {
        println!("  {} {}", ctx.config_path.display(), "(not created, using defaults)".dimmed());
        println!("  Run 'voucher config init' to create it");
    }
    println!();

    println!("{}:", "Issuance".cyan());
    println!("  Base URL:     {}", config.base_url);
    println!("  Codec:        {}", config.codec);
    println!("  IPFS gateway: {}", config.ipfs_gateway);
    println!();

    let active = ctx.network(None);
    println!("{}:", "Networks".cyan());
    for (name, network) in &config.networks {
        let marker = if *name == active { "*".green().bold() } else { " ".normal() };
        println!("{} {}", marker, name.bold());
        println!("    RPC:     {}", network.rpc_url);
        match &network.gateway_address {
            Some(gateway) => println!("    Gateway: {}", gateway),
            None => println!("    Gateway: {}", "NOT CONFIGURED".red()),
        }
        match &network.signer {
            Some(signer) => println!("    Wallet:  {}", signer),
            None => println!("    Wallet:  {}", "read-only".dimmed()),
        }
    }
    println!();

    Ok(())
}
