//! Lock value in the gateway and mint a voucher token

use anyhow::{bail, Context, Result};
use colored::Colorize;
use voucher::ledger::LedgerGateway;

use super::AppContext;

pub async fn run(ctx: &AppContext, amount: u128, metadata_uri: &str) -> Result<()> {
    if amount == 0 {
        bail!("Deposit amount must be positive");
    }

    let network = ctx.network(None);
    let gateway = ctx.gateway(&network)?;
    let Some(signer) = gateway.config().signer else {
        bail!("No wallet connected. Pass --wallet <ADDRESS> or set networks.{}.signer", network);
    };

    println!("{}", "Depositing...".cyan());
    println!("  From:     {}", signer);
    println!("  Amount:   {}", amount);
    println!("  Metadata: {}", metadata_uri);

    let receipt = gateway
        .deposit(amount, metadata_uri)
        .await
        .context("Deposit failed")?;

    println!();
    println!("{}", "Deposit confirmed".green().bold());
    println!("  Transaction: {}", receipt.tx_hash);
    if let Some(block) = receipt.block_number {
        println!("  Block:       {}", block);
    }
    println!();
    println!("Run 'voucher tokens {}' to see the new token.", signer);
    Ok(())
}
