//! Redeem or claim a voucher token into the connected wallet

use anyhow::{bail, Context, Result};
use colored::Colorize;
use voucher::ledger::{LedgerGateway, TxReceipt};
use voucher::{ActionKind, JsonRpcGateway, RedemptionMode, RedemptionSession, VoucherLink};

use super::{read_secret, AppContext};

const SECRET_PROMPT: &str = "Scan or type the voucher secret: ";

pub async fn run_redeem(
    ctx: &AppContext,
    link: &str,
    token_id: u64,
    secret: Option<String>,
    direct: bool,
) -> Result<()> {
    let mode = RedemptionMode::from_link(link);

    match mode {
        RedemptionMode::Ephemeral(voucher) if !direct => {
            run_session(ctx, voucher, token_id, ActionKind::Redeem, secret).await
        }
        other => {
            let network = ctx.network(other.network());
            let gateway = connected_gateway(ctx, &network)?;

            println!("{}", "Redeeming from your wallet...".cyan());
            let receipt = gateway
                .redeem(token_id)
                .await
                .with_context(|| format!("Redemption of token {} failed", token_id))?;
            print_receipt(ActionKind::Redeem, token_id, &receipt);
            Ok(())
        }
    }
}

pub async fn run_claim(ctx: &AppContext, link: &str, token_id: u64, secret: Option<String>) -> Result<()> {
    match RedemptionMode::from_link(link) {
        RedemptionMode::Ephemeral(voucher) => {
            run_session(ctx, voucher, token_id, ActionKind::Claim, secret).await
        }
        RedemptionMode::Wallet { .. } => bail!(
            "Claiming needs a voucher link carrying 'address' and 'pk'.\n\
             Tokens already in your wallet need no claim."
        ),
    }
}

async fn run_session(
    ctx: &AppContext,
    voucher: VoucherLink,
    token_id: u64,
    action: ActionKind,
    secret: Option<String>,
) -> Result<()> {
    let network = ctx.network(Some(&voucher.network));
    let gateway = connected_gateway(ctx, &network)?;

    println!("{}", format!("Preparing {}...", action).cyan());
    println!("  Voucher: {}", voucher.address);
    println!("  Token:   #{}", token_id);
    println!("  Network: {}", network);
    println!();

    let mut session = RedemptionSession::new(voucher);
    session.initiate(token_id, action)?;

    let secret = read_secret(secret, SECRET_PROMPT)?;
    let authorization = session
        .on_scan(&secret)
        .context("The secret does not unlock this voucher")?;
    drop(secret);

    println!("{}", "Voucher unlocked".green());
    println!("  Signer:    {}", authorization.signer);
    println!("  Signature: {}", authorization.signature.to_hex().dimmed());
    println!();
    println!("Submitting through {}...", gateway.name());

    let receipt = session
        .submit(&gateway)
        .await
        .with_context(|| format!("The gateway refused to {} token {}", action, token_id))?;
    print_receipt(action, token_id, &receipt);
    Ok(())
}

/// A gateway that can send writes
fn connected_gateway(ctx: &AppContext, network: &str) -> Result<JsonRpcGateway> {
    let gateway = ctx.gateway(network)?;
    if gateway.config().signer.is_none() {
        bail!(
            "No wallet connected. Pass --wallet <ADDRESS> or set networks.{}.signer in {}",
            network,
            ctx.config_path.display()
        );
    }
    Ok(gateway)
}

fn print_receipt(action: ActionKind, token_id: u64, receipt: &TxReceipt) {
    println!();
    match action {
        ActionKind::Redeem => println!("{}", format!("Token #{} redeemed", token_id).green().bold()),
        ActionKind::Claim => println!("{}", format!("Token #{} claimed", token_id).green().bold()),
    }
    println!("  Transaction: {}", receipt.tx_hash);
    if let Some(block) = receipt.block_number {
        println!("  Block:       {}", block);
    }
}
