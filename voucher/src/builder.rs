//! Voucher generation
//!
//! One voucher = a fresh ephemeral key pair, a short random secret, the key
//! encrypted under that secret, a link carrying {network, address,
//! ciphertext} and a QR image of the secret. Vouchers in a batch share no
//! state and are generated in parallel.

use std::fmt;

use rayon::prelude::*;
use zeroize::Zeroizing;

use crate::archive;
use crate::crypto::{Address, CodecMode, EncryptedPrivateKey, EphemeralKey, VoucherSecret};
use crate::error::{Result, VoucherError};
use crate::link::VoucherLink;
use crate::qr;

/// The operator's record of a freshly generated voucher
///
/// This is the only place the plaintext private key is retained after
/// encryption. Clone is NOT derived.
pub struct Voucher {
    pub network: String,
    pub address: Address,
    private_key: Zeroizing<[u8; 32]>,
    secret: VoucherSecret,
    pub encrypted_key: EncryptedPrivateKey,
    /// Full shareable URL
    pub link: String,
    /// PNG of the QR-encoded secret
    pub qr_png: Vec<u8>,
}

impl Voucher {
    /// Raw private key
    ///
    /// WARNING: Handle these bytes with extreme care!
    pub fn private_key(&self) -> &[u8; 32] {
        &self.private_key
    }

    /// `0x`-prefixed private key hex, as written to the manifest
    pub fn private_key_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("0x{}", hex::encode(*self.private_key)))
    }

    pub fn secret(&self) -> &VoucherSecret {
        &self.secret
    }

    /// The parameters carried by `link`
    pub fn voucher_link(&self) -> VoucherLink {
        VoucherLink::new(self.network.clone(), self.address, self.encrypted_key.clone())
    }
}

impl fmt::Debug for Voucher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Voucher")
            .field("network", &self.network)
            .field("address", &self.address)
            .field("link", &self.link)
            .finish_non_exhaustive()
    }
}

/// Generates vouchers for one network and link base
#[derive(Debug, Clone)]
pub struct VoucherBuilder {
    network: String,
    base_url: String,
    mode: CodecMode,
}

impl VoucherBuilder {
    pub fn new(network: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            base_url: base_url.into(),
            mode: CodecMode::Legacy,
        }
    }

    /// Select the codec that protects each private key
    pub fn with_mode(mut self, mode: CodecMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> CodecMode {
        self.mode
    }

    /// Generate one voucher
    pub fn generate(&self) -> Result<Voucher> {
        let key = EphemeralKey::generate();
        let secret = VoucherSecret::generate();
        let private_key = key.secret_bytes();

        let encrypted_key = EncryptedPrivateKey::seal(&private_key, secret.as_str(), self.mode)?;
        let address = key.address();

        let link = VoucherLink::new(self.network.clone(), address, encrypted_key.clone())
            .to_url(&self.base_url);
        let qr_png = qr::render_secret_png(&secret)?;

        tracing::debug!(%address, mode = %self.mode, "generated voucher");

        Ok(Voucher {
            network: self.network.clone(),
            address,
            private_key,
            secret,
            encrypted_key,
            link,
            qr_png,
        })
    }

    /// Generate `count` independent vouchers
    ///
    /// Fails with `InvalidCount` when `count <= 0`.
    pub fn generate_batch(&self, count: i64) -> Result<VoucherBatch> {
        if count <= 0 {
            return Err(VoucherError::InvalidCount(count));
        }
        let count = usize::try_from(count).map_err(|_| VoucherError::InvalidCount(count))?;

        let vouchers = (0..count)
            .into_par_iter()
            .map(|_| self.generate())
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(count, network = %self.network, mode = %self.mode, "generated voucher batch");
        Ok(VoucherBatch { vouchers })
    }
}

/// A batch of vouchers in generation order
#[derive(Debug)]
pub struct VoucherBatch {
    pub vouchers: Vec<Voucher>,
}

impl VoucherBatch {
    pub fn len(&self) -> usize {
        self.vouchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vouchers.is_empty()
    }

    /// Bundle the batch into a ZIP: `manifest.csv` plus `<address>.png` each
    pub fn to_archive(&self) -> Result<Vec<u8>> {
        archive::write_archive(&self.vouchers)
    }
}

/// Generate a single legacy-codec voucher
pub fn generate_voucher(network: &str, base_url: &str) -> Result<Voucher> {
    VoucherBuilder::new(network, base_url).generate()
}

/// Generate `count` legacy-codec vouchers
pub fn generate_vouchers(count: i64, network: &str, base_url: &str) -> Result<VoucherBatch> {
    VoucherBuilder::new(network, base_url).generate_batch(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::codec;

    #[test]
    fn test_generated_voucher_is_consistent() {
        let voucher = generate_voucher("localhost", "http://localhost:3000").unwrap();

        let key = EphemeralKey::from_bytes(voucher.private_key()).unwrap();
        assert_eq!(key.address(), voucher.address);

        let ct = voucher.encrypted_key.to_hex();
        assert_eq!(ct.len(), codec::CIPHERTEXT_HEX_LEN);
        assert_eq!(*codec::decrypt(&ct, voucher.secret().as_str()).unwrap(), *voucher.private_key());

        assert!(voucher.link.starts_with("http://localhost:3000/?network=localhost&address="));
        assert!(voucher.link.ends_with(&format!("&pk={}", ct)));
        assert!(!voucher.link.contains(voucher.secret().as_str()));
    }

    #[test]
    fn test_invalid_counts() {
        assert!(matches!(
            generate_vouchers(0, "localhost", "http://x"),
            Err(VoucherError::InvalidCount(0))
        ));
        assert!(matches!(
            generate_vouchers(-3, "localhost", "http://x"),
            Err(VoucherError::InvalidCount(-3))
        ));
    }

    #[test]
    fn test_batch_vouchers_are_independent() {
        let batch = generate_vouchers(4, "localhost", "http://x").unwrap();
        assert_eq!(batch.len(), 4);

        let mut addresses: Vec<_> = batch.vouchers.iter().map(|v| v.address).collect();
        addresses.sort_by_key(|a| *a.as_bytes());
        addresses.dedup();
        assert_eq!(addresses.len(), 4);
    }

    #[test]
    fn test_debug_hides_key_material() {
        let voucher = generate_voucher("localhost", "http://x").unwrap();
        let debug = format!("{:?}", voucher);
        assert!(!debug.contains(&hex::encode(voucher.private_key())));
        assert!(!debug.contains(voucher.secret().as_str()));
    }
}
