//! Voucher gateway over Ethereum JSON-RPC
//!
//! Views go through `eth_call`. Writes go through `eth_sendTransaction` from
//! a node-managed account (the connected wallet), then poll
//! `eth_getTransactionReceipt` until the transaction is mined or the
//! confirmation timeout elapses.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::abi::{self, Token};
use super::{LedgerGateway, TxReceipt};
use crate::crypto::{ActionSignature, Address};
use crate::error::{Result, VoucherError};
use crate::TokenId;

pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Configuration for a JSON-RPC gateway
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// JSON-RPC endpoint, e.g. `http://127.0.0.1:8545`
    pub rpc_url: String,
    /// Deployed gateway contract
    pub gateway_address: Address,
    /// Account that sends writes. `None` makes the gateway read-only.
    pub signer: Option<Address>,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
}

impl RpcConfig {
    pub fn new(rpc_url: impl Into<String>, gateway_address: Address) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            gateway_address,
            signer: None,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_signer(mut self, signer: Address) -> Self {
        self.signer = Some(signer);
        self
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    status: Option<String>,
    block_number: Option<String>,
}

/// A live voucher gateway contract
pub struct JsonRpcGateway {
    config: RpcConfig,
    client: Client,
}

impl JsonRpcGateway {
    pub fn new(config: RpcConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Send a JSON-RPC request
    ///
    /// Transport failures map to `NetworkUnavailable`; an error object from
    /// the node maps to `LedgerRejected` with its message verbatim. Callers
    /// that cannot treat a node error as a refusal remap it.
    async fn rpc_call<T: serde::de::DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp: JsonRpcResponse = self
            .client
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoucherError::NetworkUnavailable(format!("{}: {}", method, e)))?
            .json()
            .await
            .map_err(|e| VoucherError::NetworkUnavailable(format!("{} response: {}", method, e)))?;

        if let Some(err) = resp.error {
            tracing::debug!(method, code = err.code, message = %err.message, "rpc error");
            return Err(VoucherError::LedgerRejected(err.message));
        }

        serde_json::from_value(resp.result.unwrap_or(Value::Null))
            .map_err(|e| VoucherError::Serialization(format!("{} result: {}", method, e)))
    }

    async fn call(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        let result: String = self
            .rpc_call(
                "eth_call",
                json!([
                    {
                        "to": self.config.gateway_address.to_checksum(),
                        "data": format!("0x{}", hex::encode(data)),
                    },
                    "latest"
                ]),
            )
            .await?;
        decode_hex_data(&result)
    }

    async fn send_transaction(&self, data: Vec<u8>) -> Result<TxReceipt> {
        let from = self.config.signer.ok_or_else(|| {
            VoucherError::NetworkUnavailable("no wallet connected; writes need a signer account".into())
        })?;

        let tx = json!({
            "from": from.to_checksum(),
            "to": self.config.gateway_address.to_checksum(),
            "data": format!("0x{}", hex::encode(data)),
        });

        let tx_hash: String = self.rpc_call("eth_sendTransaction", json!([tx])).await?;
        tracing::info!(%tx_hash, "transaction submitted");

        self.wait_for_receipt(&tx_hash).await
    }

    /// Poll until the transaction is mined
    ///
    /// Once the transaction is sent only a reverted receipt counts as a
    /// rejection. Node errors while polling leave the outcome unknown and
    /// surface as `NetworkUnavailable` carrying the hash.
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt> {
        let poll = async {
            loop {
                let receipt: Option<RpcReceipt> = self
                    .rpc_call("eth_getTransactionReceipt", json!([tx_hash]))
                    .await
                    .map_err(|e| match e {
                        VoucherError::LedgerRejected(message) => VoucherError::NetworkUnavailable(format!(
                            "receipt for {} unavailable, transaction may still land: {}",
                            tx_hash, message
                        )),
                        other => other,
                    })?;
                if let Some(receipt) = receipt {
                    return Ok::<_, VoucherError>(receipt);
                }
                tokio::time::sleep(self.config.poll_interval).await;
            }
        };

        let receipt = tokio::time::timeout(self.config.confirmation_timeout, poll)
            .await
            .map_err(|_| {
                VoucherError::NetworkUnavailable(format!(
                    "no receipt for {} after {}s",
                    tx_hash,
                    self.config.confirmation_timeout.as_secs()
                ))
            })??;

        let block_number = receipt.block_number.as_deref().map(parse_quantity).transpose()?;
        let block_number = block_number.and_then(|b| u64::try_from(b).ok());

        if receipt.status.as_deref() == Some("0x0") {
            tracing::warn!(%tx_hash, ?block_number, "transaction reverted");
            return Err(VoucherError::LedgerRejected(format!("transaction {} reverted", tx_hash)));
        }

        tracing::info!(%tx_hash, ?block_number, "transaction confirmed");
        Ok(TxReceipt {
            tx_hash: tx_hash.to_string(),
            block_number,
        })
    }
}

fn decode_hex_data(data: &str) -> Result<Vec<u8>> {
    hex::decode(data.trim_start_matches("0x"))
        .map_err(|e| VoucherError::Serialization(format!("invalid hex data: {}", e)))
}

/// Parse a `0x`-prefixed JSON-RPC quantity
fn parse_quantity(value: &str) -> Result<u128> {
    u128::from_str_radix(value.trim_start_matches("0x"), 16)
        .map_err(|e| VoucherError::Serialization(format!("invalid quantity '{}': {}", value, e)))
}

fn to_token_id(value: u128) -> Result<TokenId> {
    TokenId::try_from(value)
        .map_err(|_| VoucherError::Serialization(format!("token id {} out of range", value)))
}

#[async_trait]
impl LedgerGateway for JsonRpcGateway {
    fn name(&self) -> &str {
        "json-rpc"
    }

    async fn redeem(&self, token_id: TokenId) -> Result<TxReceipt> {
        let data = abi::encode_call("redeem(uint256)", &[Token::Uint(token_id.into())]);
        self.send_transaction(data).await
    }

    async fn redeem_to(&self, token_id: TokenId, signature: &ActionSignature) -> Result<TxReceipt> {
        let data = abi::encode_call(
            "redeemTo(uint256,bytes)",
            &[Token::Uint(token_id.into()), Token::Bytes(signature.as_bytes())],
        );
        self.send_transaction(data).await
    }

    async fn claim_nft(&self, token_id: TokenId, signature: &ActionSignature) -> Result<TxReceipt> {
        let data = abi::encode_call(
            "claimNFT(uint256,bytes)",
            &[Token::Uint(token_id.into()), Token::Bytes(signature.as_bytes())],
        );
        self.send_transaction(data).await
    }

    async fn deposit(&self, amount: u128, metadata_uri: &str) -> Result<TxReceipt> {
        let data = abi::encode_call(
            "deposit(uint256,string)",
            &[Token::Uint(amount), Token::String(metadata_uri)],
        );
        self.send_transaction(data).await
    }

    async fn balance_of(&self, owner: &Address) -> Result<u64> {
        let data = abi::encode_call("balanceOf(address)", &[Token::Address(owner)]);
        let balance = abi::decode_uint(&self.call(data).await?)?;
        u64::try_from(balance).map_err(|_| VoucherError::Serialization(format!("balance {} out of range", balance)))
    }

    async fn token_of_owner_by_index(&self, owner: &Address, index: u64) -> Result<TokenId> {
        let data = abi::encode_call(
            "tokenOfOwnerByIndex(address,uint256)",
            &[Token::Address(owner), Token::Uint(index.into())],
        );
        to_token_id(abi::decode_uint(&self.call(data).await?)?)
    }

    async fn face_value(&self, token_id: TokenId) -> Result<u128> {
        let data = abi::encode_call("faceValue(uint256)", &[Token::Uint(token_id.into())]);
        abi::decode_uint(&self.call(data).await?)
    }

    async fn token_uri(&self, token_id: TokenId) -> Result<String> {
        let data = abi::encode_call("tokenURI(uint256)", &[Token::Uint(token_id.into())]);
        abi::decode_string(&self.call(data).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const TX_HASH: &str = "0xabc";

    /// Serve JSON-RPC on a local port; `handler` maps a method name to the
    /// `result` or `error` part of the response
    async fn mock_node<F>(handler: F) -> String
    where
        F: Fn(&str) -> Value + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handler = Arc::new(handler);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = handler.clone();
                tokio::spawn(async move { serve(stream, handler.as_ref()).await });
            }
        });
        url
    }

    async fn serve(mut stream: TcpStream, handler: &(dyn Fn(&str) -> Value + Send + Sync)) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let body = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let len = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                break buf[end + 4..end + 4 + len].to_vec();
            }
        };

        let request: Value = serde_json::from_slice(&body).unwrap();
        let mut reply = handler(request["method"].as_str().unwrap_or_default());
        reply["jsonrpc"] = json!("2.0");
        reply["id"] = request["id"].clone();
        let reply = reply.to_string();

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            reply.len(),
            reply
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        let _ = stream.shutdown().await;
    }

    fn live_gateway(url: String) -> JsonRpcGateway {
        let mut config = RpcConfig::new(url, Address::from_bytes([0x11; 20]))
            .with_signer(Address::from_bytes([0x22; 20]));
        config.confirmation_timeout = Duration::from_millis(300);
        config.poll_interval = Duration::from_millis(10);
        JsonRpcGateway::new(config)
    }

    fn sent_then(receipt: Value) -> impl Fn(&str) -> Value + Send + Sync + 'static {
        move |method: &str| match method {
            "eth_sendTransaction" => json!({ "result": TX_HASH }),
            "eth_getTransactionReceipt" => receipt.clone(),
            other => panic!("unexpected method {}", other),
        }
    }

    fn gateway(signer: Option<Address>) -> JsonRpcGateway {
        let mut config = RpcConfig::new(
            "http://127.0.0.1:9",
            Address::from_bytes([0x11; 20]),
        );
        config.signer = signer;
        config.confirmation_timeout = Duration::from_millis(200);
        JsonRpcGateway::new(config)
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x1b4").unwrap(), 436);
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_decode_hex_data() {
        assert_eq!(decode_hex_data("0x0102").unwrap(), vec![1, 2]);
        assert!(decode_hex_data("0x0").is_err());
    }

    #[test]
    fn test_config_defaults_read_only() {
        let config = RpcConfig::new("http://localhost:8545", Address::from_bytes([1; 20]));
        assert!(config.signer.is_none());
        assert_eq!(config.confirmation_timeout, DEFAULT_CONFIRMATION_TIMEOUT);

        let config = config.with_signer(Address::from_bytes([2; 20]));
        assert_eq!(config.signer, Some(Address::from_bytes([2; 20])));
    }

    #[tokio::test]
    async fn test_writes_without_signer_fail_fast() {
        let gateway = gateway(None);
        let result = gateway.redeem(1).await;
        assert!(matches!(result, Err(VoucherError::NetworkUnavailable(_))));
    }

    #[tokio::test]
    async fn test_mined_receipt_reports_block() {
        let url = mock_node(sent_then(json!({
            "result": { "status": "0x1", "blockNumber": "0x10" }
        })))
        .await;

        let receipt = live_gateway(url).redeem(1).await.unwrap();
        assert_eq!(receipt.tx_hash, TX_HASH);
        assert_eq!(receipt.block_number, Some(16));
    }

    #[tokio::test]
    async fn test_reverted_receipt_is_rejected() {
        let url = mock_node(sent_then(json!({
            "result": { "status": "0x0", "blockNumber": "0x5" }
        })))
        .await;

        let result = live_gateway(url).redeem(1).await;
        assert!(matches!(result, Err(VoucherError::LedgerRejected(m)) if m.contains(TX_HASH)));
    }

    #[tokio::test]
    async fn test_send_error_is_rejected_verbatim() {
        let url = mock_node(|_| json!({
            "error": { "code": 3, "message": "execution reverted: already redeemed" }
        }))
        .await;

        let result = live_gateway(url).redeem(1).await;
        assert!(matches!(
            result,
            Err(VoucherError::LedgerRejected(m)) if m == "execution reverted: already redeemed"
        ));
    }

    #[tokio::test]
    async fn test_node_error_while_polling_is_not_a_rejection() {
        let url = mock_node(sent_then(json!({
            "error": { "code": -32000, "message": "header not found" }
        })))
        .await;

        match live_gateway(url).redeem(1).await {
            Err(VoucherError::NetworkUnavailable(m)) => {
                assert!(m.contains(TX_HASH));
                assert!(m.contains("header not found"));
            }
            other => panic!("expected NetworkUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_receipt_times_out() {
        let url = mock_node(sent_then(json!({ "result": null }))).await;

        let result = live_gateway(url).claim_nft(3, &ActionSignature::from_slice(&[0u8; 65]).unwrap()).await;
        assert!(matches!(result, Err(VoucherError::NetworkUnavailable(m)) if m.contains(TX_HASH)));
    }

    #[tokio::test]
    async fn test_views_decode_call_results() {
        let balance = format!("0x{}", hex::encode(abi::uint_word(3)));
        let uri = format!(
            "0x{}",
            hex::encode(&abi::encode_call("f(string)", &[Token::String("ipfs://bafy/1.json")])[4..])
        );

        let url = mock_node(move |method| {
            assert_eq!(method, "eth_call");
            json!({ "result": balance })
        })
        .await;
        let owner = Address::from_bytes([3; 20]);
        assert_eq!(live_gateway(url).balance_of(&owner).await.unwrap(), 3);

        let url = mock_node(move |_| json!({ "result": uri })).await;
        assert_eq!(live_gateway(url).token_uri(1).await.unwrap(), "ipfs://bafy/1.json");
    }

    #[tokio::test]
    async fn test_unreachable_node_is_network_unavailable() {
        let gateway = gateway(Some(Address::from_bytes([2; 20])));
        let result = gateway.balance_of(&Address::from_bytes([3; 20])).await;
        assert!(matches!(result, Err(VoucherError::NetworkUnavailable(_))));
    }
}
