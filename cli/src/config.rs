//! Configuration for the voucher CLI
//!
//! Stored as JSON at `~/.voucher/config.json`. Every field has a default,
//! so a missing file or a partial one is fine.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use voucher::ledger::RpcConfig;
use voucher::metadata::DEFAULT_IPFS_GATEWAY;
use voucher::{Address, CodecMode};

/// Default directory for CLI state
const VOUCHER_DIR: &str = ".voucher";
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_NETWORK: &str = "localhost";

fn default_confirmation_timeout_secs() -> u64 {
    120
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

/// One ledger the CLI can talk to
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Fallback JSON-RPC endpoint for this network
    pub rpc_url: String,
    /// Deployed voucher gateway contract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_address: Option<String>,
    /// Node-managed account that sends writes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<String>,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl NetworkConfig {
    fn with_rpc(rpc_url: &str) -> Self {
        Self {
            rpc_url: rpc_url.to_string(),
            gateway_address: None,
            signer: None,
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// CLI configuration file
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct CliConfig {
    /// Base of generated voucher links
    pub base_url: String,
    /// HTTP gateway for `ipfs://` metadata URIs
    pub ipfs_gateway: String,
    pub default_network: String,
    /// Codec for newly generated vouchers
    pub codec: CodecMode,
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Creation timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        let mut networks = BTreeMap::new();
        networks.insert("localhost".to_string(), NetworkConfig::with_rpc("http://127.0.0.1:8545"));
        networks.insert("sepolia".to_string(), NetworkConfig::with_rpc("https://rpc.sepolia.org"));
        networks.insert("polygon".to_string(), NetworkConfig::with_rpc("https://polygon-rpc.com"));

        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            ipfs_gateway: DEFAULT_IPFS_GATEWAY.to_string(),
            default_network: DEFAULT_NETWORK.to_string(),
            codec: CodecMode::Legacy,
            networks,
            created_at: None,
        }
    }
}

/// Get the CLI state directory
pub fn voucher_dir() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("Could not find home directory")?
        .join(VOUCHER_DIR))
}

/// Get the default config file path
pub fn default_config_path() -> Result<PathBuf> {
    Ok(voucher_dir()?.join(CONFIG_FILE))
}

impl CliConfig {
    /// Load the config, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Save the config to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }
        let json = serde_json::to_string_pretty(self)?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::write(path, &json)?;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, &json)?;
        }

        Ok(())
    }

    pub fn network(&self, slug: &str) -> Result<&NetworkConfig> {
        match self.networks.get(slug) {
            Some(network) => Ok(network),
            None => bail!(
                "Unknown network '{}'. Known networks: {}",
                slug,
                self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        }
    }
}

/// Command-line overrides for the ledger connection
#[derive(Debug, Clone, Default)]
pub struct LedgerOverrides {
    pub rpc_url: Option<String>,
    pub gateway: Option<String>,
    pub wallet: Option<String>,
}

/// Build the gateway connection for `network`
///
/// Flags win over the config file. Without a gateway address nothing can be
/// read or written; without a signer the connection is read-only.
pub fn rpc_config(config: &CliConfig, network: &str, overrides: &LedgerOverrides) -> Result<RpcConfig> {
    let network_config = config.network(network).ok();

    let rpc_url = match (&overrides.rpc_url, network_config) {
        (Some(url), _) => url.clone(),
        (None, Some(nc)) => nc.rpc_url.clone(),
        (None, None) => bail!("Unknown network '{}' and no --rpc-url given", network),
    };

    let gateway = overrides
        .gateway
        .clone()
        .or_else(|| network_config.and_then(|nc| nc.gateway_address.clone()))
        .with_context(|| {
            format!(
                "No gateway address for network '{}'. Pass --gateway or set networks.{}.gateway_address",
                network, network
            )
        })?;
    let gateway_address: Address = gateway.parse().context("Invalid gateway address")?;

    let mut rpc = RpcConfig::new(rpc_url, gateway_address);
    if let Some(signer) = overrides
        .wallet
        .clone()
        .or_else(|| network_config.and_then(|nc| nc.signer.clone()))
    {
        rpc = rpc.with_signer(signer.parse().context("Invalid wallet address")?);
    }
    if let Some(nc) = network_config {
        rpc.confirmation_timeout = Duration::from_secs(nc.confirmation_timeout_secs);
        rpc.poll_interval = Duration::from_millis(nc.poll_interval_ms);
    }
    Ok(rpc)
}
