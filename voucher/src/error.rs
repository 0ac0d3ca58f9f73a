use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoucherError {
    #[error("Voucher count must be at least 1, got {0}")]
    InvalidCount(i64),

    #[error("Invalid voucher parameter: {0}")]
    InvalidVoucherParameter(String),

    #[error("Invalid voucher secret: {0}")]
    InvalidSecret(String),

    #[error("Address mismatch - voucher declares {expected}, scanned key controls {recovered}")]
    AddressMismatch { expected: String, recovered: String },

    #[error("A redemption is already in progress")]
    SessionBusy,

    #[error("Invalid session transition: {0}")]
    InvalidTransition(String),

    #[error("Decryption failed - wrong secret or corrupted voucher")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Ledger rejected the transaction: {0}")]
    LedgerRejected(String),

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("QR encoding failed: {0}")]
    QrEncoding(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, VoucherError>;
