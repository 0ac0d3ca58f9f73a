//! Voucher CLI - issue and redeem ephemeral-key vouchers

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod logging;

use commands::*;
use logging::LogFormat;

#[derive(Parser)]
#[command(name = "voucher")]
#[command(version)]
#[command(about = "Issue and redeem bearer vouchers backed by ephemeral keys")]
#[command(long_about = r#"
A voucher is a ledger token owned by a throwaway key. The key travels
encrypted inside a link; the secret that decrypts it travels as a QR code.
Anyone holding both can redeem or claim the token into their own wallet.

Quick Start:
  1. voucher config init                    Write ~/.voucher/config.json
  2. voucher generate --count 10            Issue vouchers into a ZIP
  3. voucher tokens <ADDRESS|LINK>          See what a voucher holds
  4. voucher redeem <LINK> --token-id <ID>  Redeem into your wallet
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.voucher/config.json)
    #[arg(long, global = true, env = "VOUCHER_CONFIG")]
    config: Option<PathBuf>,

    /// Network slug (default: from config)
    #[arg(long, global = true, env = "VOUCHER_NETWORK")]
    network: Option<String>,

    /// JSON-RPC endpoint, overriding the network's
    #[arg(long, global = true, env = "VOUCHER_RPC_URL")]
    rpc_url: Option<String>,

    /// Voucher gateway contract address
    #[arg(long, global = true, env = "VOUCHER_GATEWAY")]
    gateway: Option<String>,

    /// Node-managed account that sends transactions
    #[arg(long, global = true, env = "VOUCHER_WALLET")]
    wallet: Option<String>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a batch of vouchers into a ZIP archive
    Generate {
        /// Number of vouchers
        #[arg(short, long, default_value = "1", allow_negative_numbers = true)]
        count: i64,

        /// Base URL of generated links (default: from config)
        #[arg(long)]
        base_url: Option<String>,

        /// Output archive
        #[arg(short, long, default_value = "vouchers.zip")]
        out: PathBuf,

        /// Protect keys with Argon2id / AES-256-GCM instead of the legacy codec
        #[arg(long)]
        hardened: bool,

        /// Overwrite an existing archive
        #[arg(short, long)]
        force: bool,
    },

    /// Show what a voucher link carries
    Inspect {
        /// Voucher link or query string
        link: String,

        /// Prompt for the secret and check it unlocks the voucher
        #[arg(long)]
        check: bool,
    },

    /// List the tokens held by an address or voucher link
    Tokens {
        /// Address, voucher link or query string
        target: String,
    },

    /// Redeem a token's face value into your wallet
    Redeem {
        /// Voucher link; a link without voucher parameters redeems directly
        link: String,

        /// Token to redeem
        #[arg(short, long)]
        token_id: u64,

        /// Voucher secret (prompted when omitted)
        #[arg(short, long)]
        secret: Option<String>,

        /// Redeem a token your wallet owns, ignoring voucher parameters
        #[arg(long)]
        direct: bool,
    },

    /// Claim the token itself into your wallet
    Claim {
        /// Voucher link
        link: String,

        /// Token to claim
        #[arg(short, long)]
        token_id: u64,

        /// Voucher secret (prompted when omitted)
        #[arg(short, long)]
        secret: Option<String>,
    },

    /// Lock value in the gateway and mint a voucher token to your wallet
    Deposit {
        /// Face value, in the ledger's smallest unit
        #[arg(short, long)]
        amount: u128,

        /// Token metadata URI
        #[arg(short, long)]
        metadata_uri: String,
    },

    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show configuration and network info
    Info,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Print the effective config
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    let ctx = AppContext::load(
        cli.config,
        cli.network,
        config::LedgerOverrides {
            rpc_url: cli.rpc_url,
            gateway: cli.gateway,
            wallet: cli.wallet,
        },
    )?;

    match cli.command {
        Commands::Generate {
            count,
            base_url,
            out,
            hardened,
            force,
        } => {
            generate::run(
                &ctx,
                generate::GenerateOptions {
                    count,
                    base_url,
                    out,
                    hardened,
                    force,
                },
            )?;
        }
        Commands::Inspect { link, check } => {
            inspect::run(&link, check)?;
        }
        Commands::Tokens { target } => {
            tokens::run(&ctx, &target).await?;
        }
        Commands::Redeem {
            link,
            token_id,
            secret,
            direct,
        } => {
            redeem::run_redeem(&ctx, &link, token_id, secret, direct).await?;
        }
        Commands::Claim {
            link,
            token_id,
            secret,
        } => {
            redeem::run_claim(&ctx, &link, token_id, secret).await?;
        }
        Commands::Deposit {
            amount,
            metadata_uri,
        } => {
            deposit::run(&ctx, amount, &metadata_uri).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => config_cmd::init(&ctx, force)?,
            ConfigAction::Show => config_cmd::show(&ctx)?,
        },
        Commands::Info => {
            info::run(&ctx)?;
        }
    }

    Ok(())
}
