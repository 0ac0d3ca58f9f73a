//! Show what a voucher link carries

use anyhow::Result;
use colored::Colorize;
use voucher::{RedemptionMode, VoucherSecret};

use super::read_secret;

pub fn run(link: &str, check: bool) -> Result<()> {
    match RedemptionMode::from_link(link) {
        RedemptionMode::Ephemeral(voucher) => {
            println!("{}", "Voucher link".green().bold());
            println!("  Network: {}", voucher.network);
            println!("  Address: {}", voucher.address);
            println!("  Codec:   {}", voucher.encrypted_key.mode());

            if check {
                println!();
                let secret = read_secret(None, "Scan or type the voucher secret: ")?;
                let secret = VoucherSecret::parse(&secret)?;
                match voucher.unlock(&secret) {
                    Ok(_) => println!("{}", "Secret unlocks this voucher".green()),
                    Err(e) => println!("{} {}", "Secret rejected:".red(), e),
                }
            }
        }
        RedemptionMode::Wallet { network } => {
            println!("{}", "No voucher parameters: wallet mode".yellow().bold());
            println!("  Network: {}", network.as_deref().unwrap_or("(default)"));
            println!("  Tokens owned by your wallet are redeemed directly.");
        }
    }
    Ok(())
}
