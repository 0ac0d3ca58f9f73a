//! Domain-separated action messages and ephemeral-key signatures
//!
//! Message layout (Solidity `abi.encodePacked(string, uint256)`):
//!
//! ```text
//! message      = "Redeem:" || uint256(token_id)     (or "Claim:")
//! message_hash = keccak256(message)
//! digest       = keccak256("\x19Ethereum Signed Message:\n32" || message_hash)
//! signature    = r (32) || s (32) || v (1), v ∈ {27, 28}, low-s
//! ```
//!
//! The ledger recovers the signer from `digest` and compares it with the
//! token owner.

use std::fmt;
use std::str::FromStr;

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use serde::{Deserialize, Serialize};

use super::keccak256;
use super::keys::{Address, EphemeralKey};
use crate::error::{Result, VoucherError};
use crate::TokenId;

/// EIP-191 prefix for a 32-byte payload
const ETH_SIGNED_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Length of an encoded signature
pub const SIGNATURE_LEN: usize = 65;

/// The on-chain action a voucher signature authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Burn the token and pay its face value to the submitter
    Redeem,
    /// Transfer the token itself to the submitter
    Claim,
}

impl ActionKind {
    /// Domain separator prepended to the token id
    pub fn domain_tag(&self) -> &'static [u8] {
        match self {
            ActionKind::Redeem => b"Redeem:",
            ActionKind::Claim => b"Claim:",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Redeem => f.write_str("redeem"),
            ActionKind::Claim => f.write_str("claim"),
        }
    }
}

impl FromStr for ActionKind {
    type Err = VoucherError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "redeem" => Ok(ActionKind::Redeem),
            "claim" => Ok(ActionKind::Claim),
            other => Err(VoucherError::InvalidTransition(format!("unknown action '{}'", other))),
        }
    }
}

/// Encode a token id as a big-endian uint256 word
pub fn token_id_word(token_id: TokenId) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&token_id.to_be_bytes());
    word
}

/// Build the packed action message
pub fn action_message(action: ActionKind, token_id: TokenId) -> Vec<u8> {
    let tag = action.domain_tag();
    let mut message = Vec::with_capacity(tag.len() + 32);
    message.extend_from_slice(tag);
    message.extend_from_slice(&token_id_word(token_id));
    message
}

/// keccak256 of the packed action message
pub fn action_hash(action: ActionKind, token_id: TokenId) -> [u8; 32] {
    keccak256(&action_message(action, token_id))
}

/// Apply the EIP-191 personal-message prefix to a 32-byte hash
pub fn eth_signed_message_hash(message_hash: &[u8; 32]) -> [u8; 32] {
    let mut data = Vec::with_capacity(ETH_SIGNED_PREFIX.len() + 32);
    data.extend_from_slice(ETH_SIGNED_PREFIX);
    data.extend_from_slice(message_hash);
    keccak256(&data)
}

// ============================================================================
// Action Signature
// ============================================================================

/// A 65-byte recoverable signature in ledger order (r, s, v)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ActionSignature([u8; SIGNATURE_LEN]);

impl ActionSignature {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(VoucherError::Signing(format!(
                "signature must be {} bytes, got {}",
                SIGNATURE_LEN,
                bytes.len()
            )));
        }
        let mut out = [0u8; SIGNATURE_LEN];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    pub fn v(&self) -> u8 {
        self.0[64]
    }

    /// `0x`-prefixed hex, as submitted in calldata
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ActionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionSignature({})", self.to_hex())
    }
}

/// Sign a 32-byte message hash with the EIP-191 prefix
pub fn sign_message_hash(key: &EphemeralKey, message_hash: &[u8; 32]) -> Result<ActionSignature> {
    let digest = eth_signed_message_hash(message_hash);
    let (signature, recovery_id) = key
        .signing_key()
        .sign_prehash_recoverable(&digest)
        .map_err(|e| VoucherError::Signing(e.to_string()))?;

    let mut out = [0u8; SIGNATURE_LEN];
    out[..64].copy_from_slice(&signature.to_bytes());
    out[64] = 27 + recovery_id.to_byte();
    Ok(ActionSignature(out))
}

/// Sign an action for a token with an ephemeral key
pub fn sign_action(
    key: &EphemeralKey,
    action: ActionKind,
    token_id: TokenId,
) -> Result<ActionSignature> {
    sign_message_hash(key, &action_hash(action, token_id))
}

/// Recover the address that produced `signature` over `message_hash`
///
/// Mirrors the ledger's `ECDSA.recover(toEthSignedMessageHash(hash), sig)`.
pub fn recover_signer(message_hash: &[u8; 32], signature: &ActionSignature) -> Result<Address> {
    let digest = eth_signed_message_hash(message_hash);

    let v = signature.v();
    let recovery_byte = match v {
        27 | 28 => v - 27,
        0 | 1 => v,
        other => {
            return Err(VoucherError::Signing(format!("invalid recovery byte {}", other)));
        }
    };
    let recovery_id = RecoveryId::from_byte(recovery_byte)
        .ok_or_else(|| VoucherError::Signing("invalid recovery id".into()))?;

    let sig = Signature::from_slice(&signature.as_bytes()[..64])
        .map_err(|e| VoucherError::Signing(e.to_string()))?;

    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|e| VoucherError::Signing(e.to_string()))?;

    Ok(Address::from_verifying_key(&key))
}
