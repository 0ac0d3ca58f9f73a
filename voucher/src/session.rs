//! Redemption session
//!
//! Drives one voucher link through a redemption or claim:
//!
//! ```text
//! Idle ──initiate──▶ AwaitingScan ──on_scan──▶ Decrypting ──▶ Verifying ──▶ Authorizing
//!   ▲                     │                        │              │              │
//!   └──────cancel─────────┘◀─────── failure ───────┴──────────────┘           submit
//!   ▲                                                                            │
//!   └──────────────────────────── Submitted ◀────────────────────────────────────┘
//! ```
//!
//! At most one action is in flight. The decrypted private key lives only
//! between the scan and the signature; the signature itself is discarded
//! once submitted, whatever the outcome.

use std::fmt;

use crate::crypto::signing::{self, ActionKind};
use crate::crypto::{ActionSignature, Address, VoucherSecret};
use crate::error::{Result, VoucherError};
use crate::ledger::{LedgerGateway, TxReceipt};
use crate::link::VoucherLink;
use crate::TokenId;

/// Observable position in the redemption flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    AwaitingScan,
    Decrypting,
    Verifying,
    Authorizing,
    Submitted,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::AwaitingScan => "awaiting-scan",
            SessionPhase::Decrypting => "decrypting",
            SessionPhase::Verifying => "verifying",
            SessionPhase::Authorizing => "authorizing",
            SessionPhase::Submitted => "submitted",
        };
        f.write_str(name)
    }
}

/// The action a session is working on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAction {
    pub token_id: TokenId,
    pub action: ActionKind,
}

/// A signed action ready for the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub token_id: TokenId,
    pub action: ActionKind,
    /// keccak256 of the domain-separated action message
    pub message_hash: [u8; 32],
    pub signature: ActionSignature,
    /// The voucher's ephemeral address
    pub signer: Address,
}

impl Authorization {
    /// Send the matching gateway call
    pub async fn submit(&self, gateway: &dyn LedgerGateway) -> Result<TxReceipt> {
        match self.action {
            ActionKind::Redeem => gateway.redeem_to(self.token_id, &self.signature).await,
            ActionKind::Claim => gateway.claim_nft(self.token_id, &self.signature).await,
        }
    }
}

enum State {
    Idle,
    AwaitingScan(PendingAction),
    Authorizing(Authorization),
    Submitted(PendingAction),
}

/// One redemption flow over one voucher link
pub struct RedemptionSession {
    link: VoucherLink,
    state: State,
}

impl RedemptionSession {
    pub fn new(link: VoucherLink) -> Self {
        Self {
            link,
            state: State::Idle,
        }
    }

    pub fn link(&self) -> &VoucherLink {
        &self.link
    }

    /// Decrypting and Verifying run inside `on_scan` and are never observed
    /// between calls
    pub fn phase(&self) -> SessionPhase {
        match self.state {
            State::Idle => SessionPhase::Idle,
            State::AwaitingScan(_) => SessionPhase::AwaitingScan,
            State::Authorizing(_) => SessionPhase::Authorizing,
            State::Submitted(_) => SessionPhase::Submitted,
        }
    }

    pub fn pending(&self) -> Option<PendingAction> {
        match &self.state {
            State::Idle => None,
            State::AwaitingScan(pending) | State::Submitted(pending) => Some(*pending),
            State::Authorizing(auth) => Some(PendingAction {
                token_id: auth.token_id,
                action: auth.action,
            }),
        }
    }

    pub fn authorization(&self) -> Option<&Authorization> {
        match &self.state {
            State::Authorizing(auth) => Some(auth),
            _ => None,
        }
    }

    /// Start a redemption or claim of `token_id`
    ///
    /// Fails with `SessionBusy` unless the session is idle.
    pub fn initiate(&mut self, token_id: TokenId, action: ActionKind) -> Result<()> {
        if !matches!(self.state, State::Idle) {
            return Err(VoucherError::SessionBusy);
        }
        self.state = State::AwaitingScan(PendingAction { token_id, action });
        tracing::debug!(token_id, %action, phase = %self.phase(), "action initiated");
        Ok(())
    }

    /// Abort a pending action before any key material is touched
    pub fn cancel(&mut self) -> Result<()> {
        match self.state {
            State::AwaitingScan(pending) => {
                self.state = State::Idle;
                tracing::debug!(token_id = pending.token_id, action = %pending.action, "action cancelled");
                Ok(())
            }
            _ => Err(VoucherError::InvalidTransition(format!(
                "cannot cancel while {}",
                self.phase()
            ))),
        }
    }

    /// Consume a scanned secret and sign the pending action
    ///
    /// Decrypts the link's key, checks it controls the link's address and
    /// signs. Any failure returns the session to `Idle`; the scan cannot be
    /// retried without a new `initiate`.
    pub fn on_scan(&mut self, scanned: &str) -> Result<&Authorization> {
        let pending = match std::mem::replace(&mut self.state, State::Idle) {
            State::AwaitingScan(pending) => pending,
            other => {
                self.state = other;
                return Err(VoucherError::InvalidTransition(format!(
                    "no scan expected while {}",
                    self.phase()
                )));
            }
        };

        let authorization = self.authorize(pending, scanned).inspect_err(|e| {
            tracing::warn!(token_id = pending.token_id, action = %pending.action, error = %e, "scan rejected");
        })?;

        self.state = State::Authorizing(authorization);
        self.authorization()
            .ok_or_else(|| VoucherError::InvalidTransition("authorization lost".into()))
    }

    fn authorize(&self, pending: PendingAction, scanned: &str) -> Result<Authorization> {
        let secret = VoucherSecret::parse(scanned)?;

        tracing::debug!(phase = %SessionPhase::Decrypting, mode = %self.link.encrypted_key.mode(), "opening voucher key");
        let key = self.link.unlock(&secret)?;
        tracing::debug!(phase = %SessionPhase::Verifying, address = %key.address(), "address binding holds");

        tracing::debug!(phase = %SessionPhase::Authorizing, "signing action");
        let message_hash = signing::action_hash(pending.action, pending.token_id);
        let signature = signing::sign_message_hash(&key, &message_hash)?;

        Ok(Authorization {
            token_id: pending.token_id,
            action: pending.action,
            message_hash,
            signature,
            signer: key.address(),
        })
    }

    /// Submit the signed action through `gateway`
    ///
    /// The session returns to `Idle` and forgets the signature once the
    /// gateway answers, success or not. If this future is dropped before
    /// then, the session stays `Submitted` until `abandon_submission`.
    pub async fn submit(&mut self, gateway: &dyn LedgerGateway) -> Result<TxReceipt> {
        let authorization = match std::mem::replace(&mut self.state, State::Idle) {
            State::Authorizing(authorization) => authorization,
            other => {
                self.state = other;
                return Err(match self.state {
                    State::Submitted(_) => VoucherError::SessionBusy,
                    _ => VoucherError::InvalidTransition(format!(
                        "nothing to submit while {}",
                        self.phase()
                    )),
                });
            }
        };

        let pending = PendingAction {
            token_id: authorization.token_id,
            action: authorization.action,
        };
        self.state = State::Submitted(pending);
        tracing::info!(
            token_id = pending.token_id,
            action = %pending.action,
            gateway = gateway.name(),
            "submitting signed action"
        );

        let result = authorization.submit(gateway).await;
        drop(authorization);
        self.state = State::Idle;

        match &result {
            Ok(receipt) => tracing::info!(tx_hash = %receipt.tx_hash, "action confirmed"),
            Err(e) => tracing::warn!(error = %e, "action failed"),
        }
        result
    }

    /// Stop waiting on a submission whose future was dropped
    ///
    /// The transaction may still land; the session only stops tracking it.
    pub fn abandon_submission(&mut self) -> Result<()> {
        match self.state {
            State::Submitted(_) => {
                self.state = State::Idle;
                Ok(())
            }
            _ => Err(VoucherError::InvalidTransition(format!(
                "no submission in flight while {}",
                self.phase()
            ))),
        }
    }
}

impl fmt::Debug for RedemptionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedemptionSession")
            .field("link", &self.link)
            .field("phase", &self.phase())
            .field("pending", &self.pending())
            .finish()
    }
}
