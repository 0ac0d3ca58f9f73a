//! Voucher links
//!
//! `<base>/?network=<slug>&address=<0x-address>&pk=<ciphertext>`
//!
//! The link carries the address and the encrypted private key. The secret
//! that decrypts it travels separately as a QR code.

use std::fmt;

use url::form_urlencoded;

use crate::crypto::{Address, EncryptedPrivateKey, EphemeralKey, VoucherSecret};
use crate::error::{Result, VoucherError};

/// Query parameter names
pub const PARAM_NETWORK: &str = "network";
pub const PARAM_ADDRESS: &str = "address";
pub const PARAM_PK: &str = "pk";

/// The parameters a voucher link carries
#[derive(Clone, PartialEq, Eq)]
pub struct VoucherLink {
    /// Chain slug; advisory, selects a fallback RPC endpoint
    pub network: String,
    /// Address the encrypted key must control
    pub address: Address,
    pub encrypted_key: EncryptedPrivateKey,
}

impl VoucherLink {
    pub fn new(network: impl Into<String>, address: Address, encrypted_key: EncryptedPrivateKey) -> Self {
        Self {
            network: network.into(),
            address,
            encrypted_key,
        }
    }

    /// `?network=..&address=..&pk=..`
    pub fn query_string(&self) -> String {
        let network: String = form_urlencoded::byte_serialize(self.network.as_bytes()).collect();
        format!(
            "?{}={}&{}={}&{}={}",
            PARAM_NETWORK,
            network,
            PARAM_ADDRESS,
            self.address,
            PARAM_PK,
            self.encrypted_key.to_hex()
        )
    }

    /// Full shareable URL under `base_url`
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.query_string())
    }

    /// Parse a full URL or a bare query string
    ///
    /// All three parameters are required. Missing or malformed values fail
    /// with `InvalidVoucherParameter`.
    pub fn parse(input: &str) -> Result<Self> {
        let query = extract_query(input);

        let mut network = None;
        let mut address = None;
        let mut pk = None;
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                PARAM_NETWORK => network = Some(value.into_owned()),
                PARAM_ADDRESS => address = Some(value.into_owned()),
                PARAM_PK => pk = Some(value.into_owned()),
                _ => {}
            }
        }

        let network = network
            .filter(|n| !n.is_empty())
            .ok_or_else(|| missing(PARAM_NETWORK))?;
        let address: Address = address
            .filter(|a| !a.is_empty())
            .ok_or_else(|| missing(PARAM_ADDRESS))?
            .parse()?;
        let encrypted_key: EncryptedPrivateKey = pk
            .filter(|p| !p.is_empty())
            .ok_or_else(|| missing(PARAM_PK))?
            .parse()?;

        Ok(Self {
            network,
            address,
            encrypted_key,
        })
    }

    /// Decrypt the key and check that it controls `address`
    ///
    /// With the legacy codec a wrong secret decrypts to an unrelated key (or
    /// to no valid key at all); both surface as `AddressMismatch`.
    pub fn unlock(&self, secret: &VoucherSecret) -> Result<EphemeralKey> {
        let raw_key = self.encrypted_key.open(secret.as_str())?;
        let key = EphemeralKey::from_bytes(&raw_key).map_err(|_| VoucherError::AddressMismatch {
            expected: self.address.to_checksum(),
            recovered: "<invalid key>".into(),
        })?;

        let recovered = key.address();
        if !recovered.ct_eq(&self.address) {
            return Err(VoucherError::AddressMismatch {
                expected: self.address.to_checksum(),
                recovered: recovered.to_checksum(),
            });
        }
        Ok(key)
    }
}

impl fmt::Debug for VoucherLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoucherLink")
            .field("network", &self.network)
            .field("address", &self.address)
            .field("mode", &self.encrypted_key.mode())
            .finish()
    }
}

fn missing(param: &str) -> VoucherError {
    VoucherError::InvalidVoucherParameter(format!("missing '{}' parameter", param))
}

fn extract_query(input: &str) -> &str {
    let trimmed = input.trim();
    let without_fragment = trimmed.split('#').next().unwrap_or(trimmed);
    match without_fragment.split_once('?') {
        Some((_, query)) => query,
        None => without_fragment,
    }
}

/// How a redemption page should behave for a given link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionMode {
    /// The link carries a complete voucher; redemption goes through the
    /// ephemeral key
    Ephemeral(VoucherLink),
    /// No usable voucher parameters; the connected wallet acts directly
    Wallet { network: Option<String> },
}

impl RedemptionMode {
    /// Never fails: a link without valid voucher parameters falls back to
    /// wallet mode
    pub fn from_link(input: &str) -> Self {
        match VoucherLink::parse(input) {
            Ok(link) => RedemptionMode::Ephemeral(link),
            Err(e) => {
                tracing::debug!(error = %e, "no ephemeral voucher in link, using wallet mode");
                let network = form_urlencoded::parse(extract_query(input).as_bytes())
                    .find(|(k, _)| k == PARAM_NETWORK)
                    .map(|(_, v)| v.into_owned())
                    .filter(|n| !n.is_empty());
                RedemptionMode::Wallet { network }
            }
        }
    }

    pub fn network(&self) -> Option<&str> {
        match self {
            RedemptionMode::Ephemeral(link) => Some(&link.network),
            RedemptionMode::Wallet { network } => network.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::codec;

    const ADDRESS: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";

    fn sample_link() -> VoucherLink {
        let ct = codec::encrypt(&[5u8; 32], "abcdEFGH");
        VoucherLink::new("sepolia", ADDRESS.parse().unwrap(), ct.parse().unwrap())
    }

    #[test]
    fn test_url_layout() {
        let link = sample_link();
        let url = link.to_url("https://vouchers.example.org");
        assert_eq!(
            url,
            format!(
                "https://vouchers.example.org/?network=sepolia&address={}&pk={}",
                ADDRESS,
                link.encrypted_key.to_hex()
            )
        );
    }

    #[test]
    fn test_trailing_slash_in_base() {
        let link = sample_link();
        assert_eq!(link.to_url("https://a.example/"), link.to_url("https://a.example"));
    }

    #[test]
    fn test_parse_full_url_and_bare_query() {
        let link = sample_link();
        assert_eq!(VoucherLink::parse(&link.to_url("https://a.example")).unwrap(), link);
        assert_eq!(VoucherLink::parse(&link.query_string()).unwrap(), link);
    }

    #[test]
    fn test_parse_accepts_lowercase_address_and_reordered_params() {
        let ct = codec::encrypt(&[5u8; 32], "abcdEFGH");
        let query = format!("pk={}&address={}&network=localhost", ct, ADDRESS.to_lowercase());
        let link = VoucherLink::parse(&query).unwrap();
        assert_eq!(link.address, ADDRESS.parse().unwrap());
        assert_eq!(link.network, "localhost");
    }

    #[test]
    fn test_missing_parameters() {
        let ct = codec::encrypt(&[5u8; 32], "abcdEFGH");
        let no_pk = format!("https://a.example/?network=x&address={}", ADDRESS);
        let no_address = format!("https://a.example/?network=x&pk={}", ct);
        let bad_pk = format!("https://a.example/?network=x&address={}&pk=1234", ADDRESS);

        for input in [no_pk, no_address, bad_pk] {
            assert!(matches!(
                VoucherLink::parse(&input),
                Err(VoucherError::InvalidVoucherParameter(_))
            ));
        }
    }

    #[test]
    fn test_unlock_checks_address_binding() {
        let mut pk = [0u8; 32];
        pk[31] = 1;
        let ct = codec::encrypt(&pk, "abcdEFGH");
        let link = VoucherLink::new("localhost", ADDRESS.parse().unwrap(), ct.parse().unwrap());

        let key = link.unlock(&VoucherSecret::parse("abcdEFGH").unwrap()).unwrap();
        assert_eq!(key.address(), link.address);

        assert!(matches!(
            link.unlock(&VoucherSecret::parse("abcdEFGh").unwrap()),
            Err(VoucherError::AddressMismatch { .. })
        ));
    }

    #[test]
    fn test_redemption_mode_fallback() {
        let link = sample_link();
        let mode = RedemptionMode::from_link(&link.to_url("https://a.example"));
        assert_eq!(mode, RedemptionMode::Ephemeral(link));

        let mode = RedemptionMode::from_link("https://a.example/?network=polygon");
        assert_eq!(
            mode,
            RedemptionMode::Wallet {
                network: Some("polygon".into())
            }
        );
        assert_eq!(mode.network(), Some("polygon"));

        assert_eq!(
            RedemptionMode::from_link("https://a.example/"),
            RedemptionMode::Wallet { network: None }
        );
    }
}
