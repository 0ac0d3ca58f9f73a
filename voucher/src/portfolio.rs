//! Tokens held by an address
//!
//! The list a redemption starts from: every token the owner holds with its
//! face value and display metadata.

use serde::Serialize;

use crate::crypto::Address;
use crate::error::Result;
use crate::ledger::LedgerGateway;
use crate::metadata::{MetadataSource, TokenMetadata};
use crate::TokenId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenView {
    pub token_id: TokenId,
    pub face_value: u128,
    pub uri: String,
    pub metadata: TokenMetadata,
}

/// Enumerate `owner`'s tokens in ledger index order
///
/// Ledger failures abort the walk. Metadata failures only blank the
/// affected token's metadata.
pub async fn load_tokens(
    gateway: &dyn LedgerGateway,
    metadata: &dyn MetadataSource,
    owner: &Address,
) -> Result<Vec<TokenView>> {
    let balance = gateway.balance_of(owner).await?;
    tracing::debug!(%owner, balance, "loading tokens");

    let mut tokens = Vec::new();
    for index in 0..balance {
        let token_id = gateway.token_of_owner_by_index(owner, index).await?;
        let face_value = gateway.face_value(token_id).await?;
        let uri = gateway.token_uri(token_id).await?;
        let token_metadata = metadata.fetch_or_default(&uri).await;

        tokens.push(TokenView {
            token_id,
            face_value,
            uri,
            metadata: token_metadata,
        });
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::metadata::StaticMetadata;
    use serde_json::json;

    #[tokio::test]
    async fn test_lists_owned_tokens_with_metadata() {
        let owner = Address::from_bytes([1; 20]);
        let other = Address::from_bytes([2; 20]);
        let ledger = InMemoryLedger::new();
        let first = ledger.mint(owner, 100, "ipfs://first");
        ledger.mint(other, 5, "ipfs://other");
        let second = ledger.mint(owner, 200, "ipfs://second");

        let source = StaticMetadata::new();
        source.insert("ipfs://first", json!({ "name": "First" }));

        let tokens = load_tokens(&ledger, &source, &owner).await.unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].token_id, first);
        assert_eq!(tokens[0].face_value, 100);
        assert_eq!(tokens[0].metadata.name.as_deref(), Some("First"));
        assert_eq!(tokens[1].token_id, second);
        assert_eq!(tokens[1].metadata, TokenMetadata::default());
    }

    #[tokio::test]
    async fn test_empty_portfolio() {
        let ledger = InMemoryLedger::new();
        let source = StaticMetadata::new();
        let tokens = load_tokens(&ledger, &source, &Address::from_bytes([9; 20]))
            .await
            .unwrap();
        assert!(tokens.is_empty());
    }
}
