//! CLI subcommands and the state they share

pub mod config_cmd;
pub mod deposit;
pub mod generate;
pub mod info;
pub mod inspect;
pub mod redeem;
pub mod tokens;

use std::path::PathBuf;

use anyhow::{Context, Result};
use voucher::metadata::MetadataResolver;
use voucher::JsonRpcGateway;
use zeroize::Zeroizing;

use crate::config::{self, CliConfig, LedgerOverrides};

/// Loaded configuration plus command-line overrides
pub struct AppContext {
    pub config_path: PathBuf,
    pub config: CliConfig,
    network_override: Option<String>,
    overrides: LedgerOverrides,
}

impl AppContext {
    pub fn load(
        config_path: Option<PathBuf>,
        network: Option<String>,
        overrides: LedgerOverrides,
    ) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => config::default_config_path()?,
        };
        let config = CliConfig::load(&config_path)?;
        Ok(Self {
            config_path,
            config,
            network_override: network,
            overrides,
        })
    }

    /// `--network`, else the network a link names, else the config default
    pub fn network(&self, from_link: Option<&str>) -> String {
        self.network_override
            .as_deref()
            .or(from_link)
            .unwrap_or(&self.config.default_network)
            .to_string()
    }

    pub fn gateway(&self, network: &str) -> Result<JsonRpcGateway> {
        let rpc = config::rpc_config(&self.config, network, &self.overrides)?;
        tracing::debug!(network, rpc_url = %rpc.rpc_url, gateway = %rpc.gateway_address, "ledger connection");
        Ok(JsonRpcGateway::new(rpc))
    }

    pub fn metadata_resolver(&self) -> MetadataResolver {
        MetadataResolver::new(self.config.ipfs_gateway.clone())
    }
}

/// Read a secret with hidden input unless it was passed as a flag
pub fn read_secret(given: Option<String>, prompt: &str) -> Result<Zeroizing<String>> {
    match given {
        Some(secret) => Ok(Zeroizing::new(secret)),
        None => rpassword::prompt_password(prompt)
            .map(Zeroizing::new)
            .context("Failed to read voucher secret"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn context(network: Option<&str>) -> AppContext {
        let dir = tempdir().expect("Should create temp dir");
        AppContext::load(
            Some(dir.path().join("config.json")),
            network.map(str::to_string),
            LedgerOverrides::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_network_precedence() {
        let ctx = context(None);
        assert_eq!(ctx.network(None), "localhost");
        assert_eq!(ctx.network(Some("sepolia")), "sepolia");

        let ctx = context(Some("polygon"));
        assert_eq!(ctx.network(Some("sepolia")), "polygon");
    }

    #[test]
    fn test_given_secret_skips_prompt() {
        let secret = read_secret(Some("abcdEFGH".into()), "unused").unwrap();
        assert_eq!(secret.as_str(), "abcdEFGH");
    }
}
