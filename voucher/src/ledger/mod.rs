//! Ledger gateway abstraction
//!
//! The gateway contract owns voucher tokens. Holders redeem them directly,
//! or anyone relays a redemption/claim signed by the owning ephemeral key.
//! Implementations:
//!
//! - [`rpc::JsonRpcGateway`]: a live contract over Ethereum JSON-RPC
//! - [`memory::InMemoryLedger`]: an in-process ledger with the same rules

pub mod abi;
pub mod memory;
pub mod rpc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::crypto::{ActionSignature, Address};
use crate::error::Result;
use crate::TokenId;

pub use memory::InMemoryLedger;
pub use rpc::{JsonRpcGateway, RpcConfig};

/// Proof that a write was included in a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
}

/// Entry points of the voucher gateway contract
///
/// Writes are sent from the gateway's caller (the connected wallet). Every
/// write either lands or fails with `LedgerRejected` (the contract refused
/// it, reason verbatim) or `NetworkUnavailable` (it could not be delivered
/// or confirmed).
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    fn name(&self) -> &str;

    /// Redeem a token the caller owns
    async fn redeem(&self, token_id: TokenId) -> Result<TxReceipt>;

    /// Redeem on behalf of the owner; the face value goes to the caller
    async fn redeem_to(&self, token_id: TokenId, signature: &ActionSignature) -> Result<TxReceipt>;

    /// Take the token itself on behalf of the owner
    async fn claim_nft(&self, token_id: TokenId, signature: &ActionSignature) -> Result<TxReceipt>;

    /// Lock `amount` and mint a token pointing at `metadata_uri`
    async fn deposit(&self, amount: u128, metadata_uri: &str) -> Result<TxReceipt>;

    async fn balance_of(&self, owner: &Address) -> Result<u64>;

    async fn token_of_owner_by_index(&self, owner: &Address, index: u64) -> Result<TokenId>;

    async fn face_value(&self, token_id: TokenId) -> Result<u128>;

    async fn token_uri(&self, token_id: TokenId) -> Result<String>;
}
