//! Ephemeral-key vouchers
//!
//! A voucher is a bearer claim on a ledger token. The token belongs to a
//! throwaway secp256k1 key; that key is encrypted under a short secret and
//! shipped as a link, while the secret travels separately as a QR code.
//! Whoever holds both can sign a redemption (or claim) that any connected
//! wallet relays to the gateway contract.
//!
//! Issuance: [`builder::VoucherBuilder`] → [`archive`].
//! Redemption: [`link::VoucherLink`] → [`session::RedemptionSession`] →
//! [`ledger::LedgerGateway`].

pub mod archive;
pub mod builder;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod link;
pub mod metadata;
pub mod portfolio;
pub mod qr;
pub mod session;

/// Ledger token identifier
pub type TokenId = u64;

pub use builder::{generate_voucher, generate_vouchers, Voucher, VoucherBatch, VoucherBuilder};
pub use crypto::{ActionKind, ActionSignature, Address, CodecMode, EncryptedPrivateKey, EphemeralKey, VoucherSecret};
pub use error::{Result, VoucherError};
pub use ledger::{InMemoryLedger, JsonRpcGateway, LedgerGateway, RpcConfig, TxReceipt};
pub use link::{RedemptionMode, VoucherLink};
pub use session::{Authorization, RedemptionSession, SessionPhase};


#[cfg(test)]
mod test_vectors;
