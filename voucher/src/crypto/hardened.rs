//! Hardened voucher codec
//!
//! Uses Argon2id for key derivation and AES-256-GCM for encryption. Opt-in:
//! vouchers issued under the legacy codec keep decrypting with it.
//!
//! Envelope layout (hex-encoded into the link's `pk` parameter):
//!
//! ```text
//! version (1) || salt (16) || nonce (12) || ciphertext + tag (48)
//! ```

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use argon2::Argon2;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{Result, VoucherError};

/// Envelope version byte
pub const VERSION: u8 = 1;

/// Argon2id parameters for key derivation
const ARGON2_M_COST: u32 = 19456; // 19 MiB memory
const ARGON2_T_COST: u32 = 2; // 2 iterations
const ARGON2_P_COST: u32 = 1; // 1 lane

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const SEALED_LEN: usize = 32 + 16;

/// Total envelope length in bytes
pub const ENVELOPE_LEN: usize = 1 + SALT_LEN + NONCE_LEN + SEALED_LEN;

/// An authenticated, salted private key envelope
#[derive(Clone, PartialEq, Eq)]
pub struct SealedKey {
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
    ciphertext: [u8; SEALED_LEN],
}

fn derive_key(secret: &str, salt: &[u8; SALT_LEN]) -> Result<Zeroizing<[u8; 32]>> {
    let params = argon2::Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, Some(32))
        .map_err(|e| VoucherError::KeyDerivation(format!("Argon2 params error: {}", e)))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key_bytes = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(secret.as_bytes(), salt, &mut key_bytes[..])
        .map_err(|e| VoucherError::KeyDerivation(format!("Argon2 failed: {}", e)))?;
    Ok(key_bytes)
}

/// Encrypt a raw private key under a voucher secret
pub fn seal(raw_private_key: &[u8; 32], secret: &str) -> Result<SealedKey> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let key_bytes = derive_key(secret, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key_bytes[..])
        .map_err(|e| VoucherError::KeyDerivation(format!("Cipher creation failed: {}", e)))?;

    let sealed = cipher
        .encrypt(&Nonce::from(nonce_bytes), &raw_private_key[..])
        .map_err(|e| VoucherError::KeyDerivation(format!("Encryption failed: {}", e)))?;

    let mut ciphertext = [0u8; SEALED_LEN];
    ciphertext.copy_from_slice(&sealed);

    Ok(SealedKey {
        salt,
        nonce: nonce_bytes,
        ciphertext,
    })
}

impl SealedKey {
    /// Decrypt with a voucher secret; a wrong secret fails authentication
    pub fn open(&self, secret: &str) -> Result<Zeroizing<[u8; 32]>> {
        let key_bytes = derive_key(secret, &self.salt)?;
        let cipher = Aes256Gcm::new_from_slice(&key_bytes[..])
            .map_err(|e| VoucherError::KeyDerivation(format!("Cipher creation failed: {}", e)))?;

        let mut plaintext = cipher
            .decrypt(&Nonce::from(self.nonce), &self.ciphertext[..])
            .map_err(|_| VoucherError::DecryptionFailed)?;

        if plaintext.len() != 32 {
            plaintext.zeroize();
            return Err(VoucherError::DecryptionFailed);
        }

        let mut raw = Zeroizing::new([0u8; 32]);
        raw.copy_from_slice(&plaintext);
        plaintext.zeroize();
        Ok(raw)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENVELOPE_LEN);
        out.push(VERSION);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ENVELOPE_LEN {
            return Err(VoucherError::InvalidVoucherParameter(format!(
                "hardened ciphertext must be {} bytes, got {}",
                ENVELOPE_LEN,
                bytes.len()
            )));
        }
        if bytes[0] != VERSION {
            return Err(VoucherError::InvalidVoucherParameter(format!(
                "unsupported ciphertext version {}",
                bytes[0]
            )));
        }

        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        let mut ciphertext = [0u8; SEALED_LEN];
        salt.copy_from_slice(&bytes[1..1 + SALT_LEN]);
        nonce.copy_from_slice(&bytes[1 + SALT_LEN..1 + SALT_LEN + NONCE_LEN]);
        ciphertext.copy_from_slice(&bytes[1 + SALT_LEN + NONCE_LEN..]);

        Ok(Self {
            salt,
            nonce,
            ciphertext,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip_and_wrong_secret() {
        let pk = [0x42u8; 32];
        let sealed = seal(&pk, "abcdEFGH").unwrap();

        assert_eq!(*sealed.open("abcdEFGH").unwrap(), pk);
        assert!(matches!(
            sealed.open("abcdEFGI"),
            Err(VoucherError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_envelope_bytes_roundtrip() {
        let sealed = seal(&[1u8; 32], "Voucher1").unwrap();
        let bytes = sealed.to_bytes();
        assert_eq!(bytes.len(), ENVELOPE_LEN);
        assert_eq!(bytes[0], VERSION);
        assert!(SealedKey::from_bytes(&bytes).unwrap() == sealed);
    }

    #[test]
    fn test_envelope_rejects_bad_version_and_length() {
        let mut bytes = seal(&[1u8; 32], "Voucher1").unwrap().to_bytes();
        assert!(SealedKey::from_bytes(&bytes[..10]).is_err());
        bytes[0] = 9;
        assert!(SealedKey::from_bytes(&bytes).is_err());
    }
}
