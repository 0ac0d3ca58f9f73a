//! Minimal Solidity ABI encoding for the gateway's entry points
//!
//! Covers exactly what the gateway consumes: `uint256`, `address`, `bytes`
//! and `string` arguments, `uint256` and `string` return values.

use crate::crypto::{keccak256, Address};
use crate::error::{Result, VoucherError};

const WORD: usize = 32;

/// A call argument
#[derive(Debug, Clone, Copy)]
pub enum Token<'a> {
    Uint(u128),
    Address(&'a Address),
    Bytes(&'a [u8]),
    String(&'a str),
}

/// First four bytes of keccak256 of the canonical signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn uint_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

pub fn address_word(address: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD) * WORD
}

/// Encode `selector(signature) || head || tail`
pub fn encode_call(signature: &str, args: &[Token<'_>]) -> Vec<u8> {
    let head_len = args.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for arg in args {
        let data: &[u8] = match arg {
            Token::Uint(value) => {
                head.extend_from_slice(&uint_word(*value));
                continue;
            }
            Token::Address(address) => {
                head.extend_from_slice(&address_word(address));
                continue;
            }
            Token::Bytes(bytes) => bytes,
            Token::String(s) => s.as_bytes(),
        };
        // dynamic: offset in the head, length-prefixed padded data in the tail
        head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
        tail.extend_from_slice(&uint_word(data.len() as u128));
        tail.extend_from_slice(data);
        tail.resize(tail.len() + padded_len(data.len()) - data.len(), 0);
    }

    let mut out = Vec::with_capacity(4 + head.len() + tail.len());
    out.extend_from_slice(&selector(signature));
    out.extend_from_slice(&head);
    out.extend_from_slice(&tail);
    out
}

fn word_at(data: &[u8], offset: usize) -> Result<&[u8]> {
    offset
        .checked_add(WORD)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| VoucherError::Serialization(format!("return data too short at offset {}", offset)))
}

fn word_to_u128(word: &[u8]) -> Result<u128> {
    if word[..16].iter().any(|&b| b != 0) {
        return Err(VoucherError::Serialization("uint256 value exceeds 128 bits".into()));
    }
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(bytes))
}

fn word_to_usize(word: &[u8]) -> Result<usize> {
    usize::try_from(word_to_u128(word)?)
        .map_err(|_| VoucherError::Serialization("offset does not fit in memory".into()))
}

/// Decode a single `uint256` return value
pub fn decode_uint(data: &[u8]) -> Result<u128> {
    word_to_u128(word_at(data, 0)?)
}

/// Decode a single `string` return value
pub fn decode_string(data: &[u8]) -> Result<String> {
    let offset = word_to_usize(word_at(data, 0)?)?;
    let len = word_to_usize(word_at(data, offset)?)?;
    let truncated = || VoucherError::Serialization("string return data truncated".into());
    let start = offset.checked_add(WORD).ok_or_else(truncated)?;
    let end = start.checked_add(len).ok_or_else(truncated)?;
    let bytes = data.get(start..end).ok_or_else(truncated)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| VoucherError::Serialization(format!("string is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selectors() {
        assert_eq!(selector("balanceOf(address)"), [0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(selector("tokenURI(uint256)"), [0xc8, 0x7b, 0x56, 0xdd]);
        assert_eq!(selector("tokenOfOwnerByIndex(address,uint256)"), [0x2f, 0x74, 0x5c, 0x59]);
    }

    #[test]
    fn test_static_args() {
        let address: Address = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf".parse().unwrap();
        let data = encode_call(
            "tokenOfOwnerByIndex(address,uint256)",
            &[Token::Address(&address), Token::Uint(3)],
        );
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[4 + 12..4 + 32], address.as_bytes());
        assert_eq!(data[4 + 63], 3);
    }

    #[test]
    fn test_dynamic_bytes_layout() {
        let sig = [0xabu8; 65];
        let data = encode_call("redeemTo(uint256,bytes)", &[Token::Uint(5), Token::Bytes(&sig)]);
        let body = &data[4..];

        assert_eq!(decode_uint(&body[0..]).unwrap(), 5);
        // offset of the bytes payload
        assert_eq!(decode_uint(&body[32..]).unwrap(), 64);
        // length
        assert_eq!(decode_uint(&body[64..]).unwrap(), 65);
        assert_eq!(&body[96..96 + 65], &sig[..]);
        // padded to a whole number of words
        assert_eq!(body.len(), 96 + 96);
    }

    #[test]
    fn test_string_roundtrip_through_return_encoding() {
        let encoded = encode_call("f(string)", &[Token::String("ipfs://bafy/meta.json")]);
        assert_eq!(decode_string(&encoded[4..]).unwrap(), "ipfs://bafy/meta.json");
    }

    #[test]
    fn test_decode_rejects_short_and_oversized() {
        assert!(decode_uint(&[0u8; 10]).is_err());
        assert!(decode_uint(&[0xffu8; 32]).is_err());
        assert!(decode_string(&uint_word(32)).is_err());
    }

    #[test]
    fn test_decode_string_rejects_huge_offset_and_length() {
        let huge = (u64::MAX - 8) as u128;

        // offset word pointing past the end of the address space
        assert!(matches!(
            decode_string(&uint_word(huge)),
            Err(VoucherError::Serialization(_))
        ));

        // valid offset, length that wraps when added to the start
        let mut data = uint_word(32).to_vec();
        data.extend_from_slice(&uint_word(huge));
        data.extend_from_slice(&[b'a'; 32]);
        assert!(matches!(decode_string(&data), Err(VoucherError::Serialization(_))));
    }
}
