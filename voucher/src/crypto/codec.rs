//! Symmetric voucher codec
//!
//! The legacy scheme must stay bit-compatible with every voucher already
//! printed:
//!
//! ```text
//! key        = MD5(secret)                       (16 bytes)
//! ciphertext = AES-128-CTR(key, iv = 0^16) ⊕ pk  (32 bytes, 64 hex chars)
//! ```
//!
//! There is no authentication tag. Decrypting with the wrong secret silently
//! yields 32 garbage bytes; callers detect that through the address binding
//! check. The hardened scheme lives in [`super::hardened`] and is opt-in.

use std::fmt;
use std::str::FromStr;

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use super::hardened::{self, SealedKey};
use crate::error::{Result, VoucherError};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// Length of a legacy ciphertext in hex characters
pub const CIPHERTEXT_HEX_LEN: usize = 64;

const ZERO_IV: [u8; 16] = [0u8; 16];

/// Which codec protects a voucher's private key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecMode {
    /// MD5 / AES-128-CTR, compatible with issued vouchers
    #[default]
    Legacy,
    /// Argon2id / AES-256-GCM
    Hardened,
}

impl fmt::Display for CodecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecMode::Legacy => f.write_str("legacy"),
            CodecMode::Hardened => f.write_str("hardened"),
        }
    }
}

/// Derive the 128-bit codec key: MD5 over the secret's UTF-8 bytes
fn derive_key(secret: &str) -> [u8; 16] {
    let mut key = [0u8; 16];
    key.copy_from_slice(&Md5::digest(secret.as_bytes()));
    key
}

fn apply_keystream(secret: &str, buf: &mut [u8; 32]) {
    let mut key = derive_key(secret);
    let mut cipher = Aes128Ctr::new(&key.into(), &ZERO_IV.into());
    cipher.apply_keystream(buf);
    key.zeroize();
}

/// Encrypt a raw private key under a voucher secret (legacy scheme)
pub fn encrypt(raw_private_key: &[u8; 32], secret: &str) -> String {
    let mut buf = *raw_private_key;
    apply_keystream(secret, &mut buf);
    let encoded = hex::encode(buf);
    buf.zeroize();
    encoded
}

/// Decrypt a legacy ciphertext
///
/// Only malformed input is an error. A wrong secret produces a
/// deterministic but meaningless key.
pub fn decrypt(ciphertext_hex: &str, secret: &str) -> Result<Zeroizing<[u8; 32]>> {
    let bytes = decode_legacy(ciphertext_hex)?;
    Ok(decrypt_bytes(&bytes, secret))
}

fn decrypt_bytes(ciphertext: &[u8; 32], secret: &str) -> Zeroizing<[u8; 32]> {
    let mut buf = Zeroizing::new(*ciphertext);
    apply_keystream(secret, &mut buf);
    buf
}

fn decode_legacy(ciphertext_hex: &str) -> Result<[u8; 32]> {
    if ciphertext_hex.len() != CIPHERTEXT_HEX_LEN {
        return Err(VoucherError::InvalidVoucherParameter(format!(
            "ciphertext must be {} hex characters, got {}",
            CIPHERTEXT_HEX_LEN,
            ciphertext_hex.len()
        )));
    }
    let decoded = hex::decode(ciphertext_hex)
        .map_err(|e| VoucherError::InvalidVoucherParameter(format!("ciphertext is not hex: {}", e)))?;
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&decoded);
    Ok(bytes)
}

// ============================================================================
// Encrypted Private Key
// ============================================================================

/// The `pk` parameter of a voucher link, in either codec
#[derive(Clone, PartialEq, Eq)]
pub enum EncryptedPrivateKey {
    Legacy([u8; 32]),
    Hardened(SealedKey),
}

impl EncryptedPrivateKey {
    /// Encrypt a private key with the requested codec
    pub fn seal(raw_private_key: &[u8; 32], secret: &str, mode: CodecMode) -> Result<Self> {
        match mode {
            CodecMode::Legacy => {
                let mut buf = *raw_private_key;
                apply_keystream(secret, &mut buf);
                Ok(EncryptedPrivateKey::Legacy(buf))
            }
            CodecMode::Hardened => Ok(EncryptedPrivateKey::Hardened(hardened::seal(
                raw_private_key,
                secret,
            )?)),
        }
    }

    /// Recover the raw private key
    ///
    /// Legacy ciphertexts never fail here; hardened ones fail with
    /// `DecryptionFailed` on a wrong secret.
    pub fn open(&self, secret: &str) -> Result<Zeroizing<[u8; 32]>> {
        match self {
            EncryptedPrivateKey::Legacy(bytes) => Ok(decrypt_bytes(bytes, secret)),
            EncryptedPrivateKey::Hardened(sealed) => sealed.open(secret),
        }
    }

    pub fn mode(&self) -> CodecMode {
        match self {
            EncryptedPrivateKey::Legacy(_) => CodecMode::Legacy,
            EncryptedPrivateKey::Hardened(_) => CodecMode::Hardened,
        }
    }

    pub fn to_hex(&self) -> String {
        match self {
            EncryptedPrivateKey::Legacy(bytes) => hex::encode(bytes),
            EncryptedPrivateKey::Hardened(sealed) => hex::encode(sealed.to_bytes()),
        }
    }
}

impl FromStr for EncryptedPrivateKey {
    type Err = VoucherError;

    /// 64 hex chars is a legacy ciphertext; anything else must be a
    /// versioned hardened envelope.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);

        if digits.len() == CIPHERTEXT_HEX_LEN {
            return Ok(EncryptedPrivateKey::Legacy(decode_legacy(digits)?));
        }

        let bytes = hex::decode(digits)
            .map_err(|e| VoucherError::InvalidVoucherParameter(format!("ciphertext is not hex: {}", e)))?;
        Ok(EncryptedPrivateKey::Hardened(SealedKey::from_bytes(&bytes)?))
    }
}

impl fmt::Display for EncryptedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for EncryptedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedPrivateKey({}, {})", self.mode(), self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_is_deterministic() {
        let pk = [0x42u8; 32];
        assert_eq!(encrypt(&pk, "abcdEFGH"), encrypt(&pk, "abcdEFGH"));
    }

    #[test]
    fn test_ciphertext_shape() {
        let ct = encrypt(&[7u8; 32], "Zz09Zz09");
        assert_eq!(ct.len(), CIPHERTEXT_HEX_LEN);
        assert!(ct.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_roundtrip() {
        let pk = [0x11u8; 32];
        let ct = encrypt(&pk, "secret12");
        assert_eq!(*decrypt(&ct, "secret12").unwrap(), pk);
    }

    #[test]
    fn test_wrong_secret_yields_garbage_not_error() {
        let pk = [0x11u8; 32];
        let ct = encrypt(&pk, "secret12");
        let garbage = decrypt(&ct, "secret13").unwrap();
        assert_ne!(*garbage, pk);
        // Same wrong secret, same garbage
        assert_eq!(*garbage, *decrypt(&ct, "secret13").unwrap());
    }

    #[test]
    fn test_decrypt_rejects_malformed_ciphertext() {
        assert!(decrypt("abcd", "secret12").is_err());
        assert!(decrypt(&"zz".repeat(32), "secret12").is_err());
    }

    #[test]
    fn test_encrypted_key_parses_legacy() {
        let ct = encrypt(&[3u8; 32], "abcdEFGH");
        let parsed: EncryptedPrivateKey = ct.parse().unwrap();
        assert_eq!(parsed.mode(), CodecMode::Legacy);
        assert_eq!(parsed.to_hex(), ct);
        assert_eq!(*parsed.open("abcdEFGH").unwrap(), [3u8; 32]);
    }

    #[test]
    fn test_seal_legacy_matches_encrypt() {
        let pk = [9u8; 32];
        let sealed = EncryptedPrivateKey::seal(&pk, "abcdEFGH", CodecMode::Legacy).unwrap();
        assert_eq!(sealed.to_hex(), encrypt(&pk, "abcdEFGH"));
    }
}
