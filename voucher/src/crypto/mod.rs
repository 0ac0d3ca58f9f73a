//! Cryptographic primitives for voucher issuance and redemption
//!
//! - `keys`: ephemeral secp256k1 key pairs, addresses and voucher secrets
//! - `codec`: the legacy MD5 / AES-128-CTR private key codec
//! - `hardened`: the opt-in Argon2id / AES-256-GCM codec
//! - `signing`: domain-separated action messages and EIP-191 signatures

pub mod codec;
pub mod hardened;
pub mod keys;
pub mod signing;

use sha3::{Digest, Keccak256};

pub use codec::{CodecMode, EncryptedPrivateKey};
pub use keys::{Address, EphemeralKey, VoucherSecret, SECRET_LEN};
pub use signing::{ActionKind, ActionSignature};

/// Keccak-256 as used by the ledger for addresses, selectors and message hashes
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}
