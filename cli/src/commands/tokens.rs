//! List the tokens held by an address or voucher link

use anyhow::{Context, Result};
use colored::Colorize;
use voucher::portfolio::{self, TokenView};
use voucher::{Address, RedemptionMode};

use super::AppContext;

/// Resolve the owner to list and the network a link names
fn resolve_target(target: &str) -> Result<(Address, Option<String>)> {
    if let Ok(address) = target.parse::<Address>() {
        return Ok((address, None));
    }
    match RedemptionMode::from_link(target) {
        RedemptionMode::Ephemeral(link) => Ok((link.address, Some(link.network))),
        RedemptionMode::Wallet { .. } => {
            anyhow::bail!("'{}' is neither an address nor a voucher link", target)
        }
    }
}

pub async fn run(ctx: &AppContext, target: &str) -> Result<()> {
    let (owner, link_network) = resolve_target(target)?;
    let network = ctx.network(link_network.as_deref());
    let gateway = ctx.gateway(&network)?;
    let resolver = ctx.metadata_resolver();

    println!("{}", format!("Tokens held by {} on {}", owner, network).cyan());
    println!();

    let tokens = portfolio::load_tokens(&gateway, &resolver, &owner)
        .await
        .context("Failed to load tokens")?;

    if tokens.is_empty() {
        println!("{}", "No tokens.".yellow());
        return Ok(());
    }

    for token in &tokens {
        print_token(token, &resolver);
    }
    println!();
    println!("{} token(s)", tokens.len());
    Ok(())
}

fn print_token(token: &TokenView, resolver: &voucher::metadata::MetadataResolver) {
    let name = token
        .metadata
        .name
        .clone()
        .unwrap_or_else(|| format!("Token #{}", token.token_id));

    println!("{} {}", format!("#{}", token.token_id).green().bold(), name.bold());
    println!("  Face value:  {}", token.face_value);
    if let Some(description) = &token.metadata.description {
        println!("  Description: {}", description);
    }
    if let Some(image) = &token.metadata.image {
        println!("  Image:       {}", resolver.resolve_uri(image));
    }
    if let Some(back) = &token.metadata.image_back {
        println!("  Image back:  {}", resolver.resolve_uri(back));
    }
    println!("  URI:         {}", token.uri.dimmed());
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";

    #[test]
    fn test_target_address() {
        let (owner, network) = resolve_target(ADDRESS).unwrap();
        assert_eq!(owner.to_checksum(), ADDRESS);
        assert!(network.is_none());
    }

    #[test]
    fn test_target_link() {
        let link = format!(
            "http://x/?network=sepolia&address={}&pk={}",
            ADDRESS,
            "00".repeat(32)
        );
        let (owner, network) = resolve_target(&link).unwrap();
        assert_eq!(owner.to_checksum(), ADDRESS);
        assert_eq!(network.as_deref(), Some("sepolia"));
    }

    #[test]
    fn test_target_garbage() {
        assert!(resolve_target("http://x/?network=sepolia").is_err());
    }
}
