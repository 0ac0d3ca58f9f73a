//! In-process voucher gateway
//!
//! Applies the contract's rules against local state: tokens belong to an
//! owner, `redeem` needs the owner as caller, `redeemTo`/`claimNFT` need a
//! signature recovering to the owner over the EIP-191 prefixed action hash,
//! and a redeemed token is gone for good.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{LedgerGateway, TxReceipt};
use crate::crypto::signing::{self, ActionKind};
use crate::crypto::{ActionSignature, Address};
use crate::error::{Result, VoucherError};
use crate::TokenId;

/// A live token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub owner: Address,
    pub face_value: u128,
    pub uri: String,
}

#[derive(Debug, Default)]
struct LedgerState {
    tokens: BTreeMap<TokenId, TokenRecord>,
    redeemed: BTreeSet<TokenId>,
    /// Face value paid out per recipient
    credits: HashMap<Address, u128>,
    next_token_id: TokenId,
    block_number: u64,
    write_calls: usize,
}

impl LedgerState {
    fn receipt(&mut self) -> TxReceipt {
        self.block_number += 1;
        TxReceipt {
            tx_hash: format!("0x{:064x}", self.block_number),
            block_number: Some(self.block_number),
        }
    }

    fn live_token(&self, token_id: TokenId) -> Result<&TokenRecord> {
        if self.redeemed.contains(&token_id) {
            return Err(VoucherError::LedgerRejected(format!(
                "token {} already redeemed",
                token_id
            )));
        }
        self.tokens
            .get(&token_id)
            .ok_or_else(|| VoucherError::LedgerRejected(format!("token {} does not exist", token_id)))
    }

    /// Owner of a token, checked against the signer of an action
    fn authorize(&self, action: ActionKind, token_id: TokenId, signature: &ActionSignature) -> Result<Address> {
        let owner = self.live_token(token_id)?.owner;
        let message_hash = signing::action_hash(action, token_id);
        let signer = signing::recover_signer(&message_hash, signature)
            .map_err(|_| VoucherError::LedgerRejected("invalid signature".into()))?;
        if !signer.ct_eq(&owner) {
            return Err(VoucherError::LedgerRejected("signer is not the token owner".into()));
        }
        Ok(owner)
    }

    fn burn(&mut self, token_id: TokenId, recipient: Address) -> Result<()> {
        let token = self
            .tokens
            .remove(&token_id)
            .ok_or_else(|| VoucherError::LedgerRejected(format!("token {} does not exist", token_id)))?;
        self.redeemed.insert(token_id);
        *self.credits.entry(recipient).or_default() += token.face_value;
        Ok(())
    }
}

/// Gateway contract semantics without a node
///
/// `caller` plays the connected wallet. Without one every write fails with
/// `NetworkUnavailable`, as with an unconnected JSON-RPC gateway.
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    caller: Option<Address>,
}

impl InMemoryLedger {
    /// A read-only ledger
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                next_token_id: 1,
                ..LedgerState::default()
            }),
            caller: None,
        }
    }

    /// A ledger whose writes come from `caller`
    pub fn with_caller(caller: Address) -> Self {
        Self {
            caller: Some(caller),
            ..Self::new()
        }
    }

    pub fn caller(&self) -> Option<Address> {
        self.caller
    }

    /// Mint a token straight to `owner`, as an issuer funding a voucher
    pub fn mint(&self, owner: Address, face_value: u128, uri: impl Into<String>) -> TokenId {
        let mut state = self.state.lock();
        let token_id = state.next_token_id;
        state.next_token_id += 1;
        state.tokens.insert(
            token_id,
            TokenRecord {
                owner,
                face_value,
                uri: uri.into(),
            },
        );
        tracing::debug!(token_id, %owner, face_value, "minted token");
        token_id
    }

    pub fn token(&self, token_id: TokenId) -> Option<TokenRecord> {
        self.state.lock().tokens.get(&token_id).cloned()
    }

    pub fn owner_of(&self, token_id: TokenId) -> Option<Address> {
        self.state.lock().tokens.get(&token_id).map(|t| t.owner)
    }

    /// Total face value paid out to `recipient`
    pub fn credit_of(&self, recipient: &Address) -> u128 {
        self.state.lock().credits.get(recipient).copied().unwrap_or(0)
    }

    /// Number of write calls received, landed or not
    pub fn write_calls(&self) -> usize {
        self.state.lock().write_calls
    }

    fn begin_write(&self, state: &mut LedgerState) -> Result<Address> {
        state.write_calls += 1;
        self.caller
            .ok_or_else(|| VoucherError::NetworkUnavailable("no wallet connected".into()))
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn redeem(&self, token_id: TokenId) -> Result<TxReceipt> {
        let mut state = self.state.lock();
        let caller = self.begin_write(&mut state)?;

        if !state.live_token(token_id)?.owner.ct_eq(&caller) {
            return Err(VoucherError::LedgerRejected("caller is not the token owner".into()));
        }
        state.burn(token_id, caller)?;
        Ok(state.receipt())
    }

    async fn redeem_to(&self, token_id: TokenId, signature: &ActionSignature) -> Result<TxReceipt> {
        let mut state = self.state.lock();
        let caller = self.begin_write(&mut state)?;

        state.authorize(ActionKind::Redeem, token_id, signature)?;
        state.burn(token_id, caller)?;
        Ok(state.receipt())
    }

    async fn claim_nft(&self, token_id: TokenId, signature: &ActionSignature) -> Result<TxReceipt> {
        let mut state = self.state.lock();
        let caller = self.begin_write(&mut state)?;

        state.authorize(ActionKind::Claim, token_id, signature)?;
        if let Some(token) = state.tokens.get_mut(&token_id) {
            token.owner = caller;
        }
        Ok(state.receipt())
    }

    async fn deposit(&self, amount: u128, metadata_uri: &str) -> Result<TxReceipt> {
        let caller = {
            let mut state = self.state.lock();
            let caller = self.begin_write(&mut state)?;
            if amount == 0 {
                return Err(VoucherError::LedgerRejected("deposit amount must be positive".into()));
            }
            caller
        };
        self.mint(caller, amount, metadata_uri);
        Ok(self.state.lock().receipt())
    }

    async fn balance_of(&self, owner: &Address) -> Result<u64> {
        let state = self.state.lock();
        Ok(state.tokens.values().filter(|t| t.owner == *owner).count() as u64)
    }

    async fn token_of_owner_by_index(&self, owner: &Address, index: u64) -> Result<TokenId> {
        let state = self.state.lock();
        let index = usize::try_from(index)
            .map_err(|_| VoucherError::LedgerRejected("owner index out of bounds".into()))?;
        state
            .tokens
            .iter()
            .filter(|(_, t)| t.owner == *owner)
            .nth(index)
            .map(|(id, _)| *id)
            .ok_or_else(|| VoucherError::LedgerRejected("owner index out of bounds".into()))
    }

    async fn face_value(&self, token_id: TokenId) -> Result<u128> {
        Ok(self.state.lock().live_token(token_id)?.face_value)
    }

    async fn token_uri(&self, token_id: TokenId) -> Result<String> {
        Ok(self.state.lock().live_token(token_id)?.uri.clone())
    }
}
