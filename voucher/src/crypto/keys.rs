//! Ephemeral key pairs, ledger addresses and voucher secrets
//!
//! Security:
//! - Private key bytes are zeroized on drop
//! - Secrets are redacted from `Debug` output
//! - Address comparison is constant-time

use std::fmt;
use std::str::FromStr;

use k256::ecdsa::{SigningKey, VerifyingKey};
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use super::keccak256;
use crate::error::{Result, VoucherError};

/// Number of characters in a voucher secret
pub const SECRET_LEN: usize = 8;

// ============================================================================
// Address
// ============================================================================

/// A 20-byte ledger address derived from a secp256k1 public key
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 20]);

impl Address {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// address = keccak256(uncompressed_pubkey[1..])[12..]
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash[12..]);
        Self(bytes)
    }

    /// EIP-55 mixed-case checksum encoding, `0x` prefixed
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 { hash[i / 2] >> 4 } else { hash[i / 2] & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Constant-time equality
    pub fn ct_eq(&self, other: &Address) -> bool {
        bool::from(self.0.ct_eq(&other.0))
    }
}

impl FromStr for Address {
    type Err = VoucherError;

    /// Parses `0x`-prefixed or bare hex, ignoring case.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != 40 {
            return Err(VoucherError::InvalidVoucherParameter(format!(
                "address must be 40 hex characters, got {}",
                digits.len()
            )));
        }

        let decoded = hex::decode(digits).map_err(|e| {
            VoucherError::InvalidVoucherParameter(format!("address is not hex: {}", e))
        })?;

        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

// ============================================================================
// Ephemeral Key
// ============================================================================

/// Single-use secp256k1 key that owns a voucher's on-chain position
///
/// Clone is NOT derived to prevent accidental copies of the private key.
pub struct EphemeralKey {
    signing_key: SigningKey,
    address: Address,
}

impl EphemeralKey {
    /// Generate a fresh key pair from OS entropy
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Rebuild a key pair from raw private key bytes
    ///
    /// Fails for the zero scalar or values not below the curve order.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|_| VoucherError::KeyDerivation("not a valid secp256k1 private key".into()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = Address::from_verifying_key(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Export the raw private key
    ///
    /// WARNING: Handle these bytes with extreme care!
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        let mut field = self.signing_key.to_bytes();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&field);
        field.as_mut_slice().zeroize();
        Zeroizing::new(bytes)
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl fmt::Debug for EphemeralKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKey")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Voucher Secret
// ============================================================================

/// The QR-carried half of a voucher's decryption key
///
/// Eight characters drawn from `[A-Za-z0-9]` (~47.6 bits). The low entropy is
/// an accepted trade-off for physical redeemability.
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct VoucherSecret(String);

impl VoucherSecret {
    pub fn generate() -> Self {
        let secret: String = OsRng
            .sample_iter(&Alphanumeric)
            .take(SECRET_LEN)
            .map(char::from)
            .collect();
        Self(secret)
    }

    /// Accept a secret scanned from a QR code or typed in by hand
    ///
    /// Surrounding whitespace is dropped; anything else is kept verbatim, since
    /// the codec works on arbitrary strings.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VoucherError::InvalidSecret("secret is empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for VoucherSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VoucherSecret(<redacted>)")
    }
}
