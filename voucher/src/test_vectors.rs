//! Known-answer vectors
//!
//! The legacy codec vectors pin bit-compatibility with vouchers that are
//! already printed and in circulation. Keccak, selector and checksum vectors
//! are the ledger's published values.

#[cfg(test)]
mod voucher_test_vectors {
    use crate::crypto::codec;
    use crate::crypto::signing::{self, ActionKind};
    use crate::crypto::{keccak256, Address, EphemeralKey};
    use crate::ledger::abi;
    use md5::{Digest, Md5};

    fn sequential_key() -> [u8; 32] {
        let mut pk = [0u8; 32];
        for (i, byte) in pk.iter_mut().enumerate() {
            *byte = i as u8 + 1;
        }
        pk
    }

    fn key_one() -> [u8; 32] {
        let mut pk = [0u8; 32];
        pk[31] = 1;
        pk
    }

    // ==================== Legacy Codec ====================

    #[test]
    fn test_vector_md5_key_derivation() {
        assert_eq!(
            hex::encode(Md5::digest(b"abcdEFGH")),
            "81d51825cd0fc93993d9008fb9345ac3"
        );
    }

    /// Vector 1: sequential key bytes 0x01..0x20 under "abcdEFGH"
    #[test]
    fn test_vector_1_sequential_key() {
        let ct = codec::encrypt(&sequential_key(), "abcdEFGH");
        assert_eq!(
            ct,
            "0c105cc48a3c38c58bae33e214e6abd89afbad22bb66d51e888cb6da18c58cf3"
        );
        assert_eq!(*codec::decrypt(&ct, "abcdEFGH").unwrap(), sequential_key());
    }

    /// Vector 2: private key 1 under "Voucher1"
    #[test]
    fn test_vector_2_key_one() {
        let ct = codec::encrypt(&key_one(), "Voucher1");
        assert_eq!(
            ct,
            "5350904e796b20f3859868ff22d572c05edfef6f60b84b9255ca0f3c81d7adf6"
        );
    }

    /// Decrypting a circulating ciphertext recovers the key and its address
    #[test]
    fn test_vector_2_decrypts_to_known_address() {
        let pk = codec::decrypt(
            "5350904e796b20f3859868ff22d572c05edfef6f60b84b9255ca0f3c81d7adf6",
            "Voucher1",
        )
        .unwrap();
        let key = EphemeralKey::from_bytes(&pk).unwrap();
        assert_eq!(
            key.address().to_checksum(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }

    // ==================== Hashing & Addresses ====================

    #[test]
    fn test_vector_keccak_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    /// EIP-55 reference addresses
    #[test]
    fn test_vector_eip55_checksums() {
        for expected in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            let address: Address = expected.to_lowercase().parse().unwrap();
            assert_eq!(address.to_checksum(), expected);
        }
    }

    // ==================== Gateway ABI ====================

    #[test]
    fn test_vector_gateway_selectors() {
        let cases = [
            ("redeem(uint256)", "db006a75"),
            ("redeemTo(uint256,bytes)", "8a2089d3"),
            ("claimNFT(uint256,bytes)", "1a267c42"),
            ("deposit(uint256,string)", "f1215d25"),
            ("balanceOf(address)", "70a08231"),
            ("tokenOfOwnerByIndex(address,uint256)", "2f745c59"),
            ("faceValue(uint256)", "fe8dbd8e"),
            ("tokenURI(uint256)", "c87b56dd"),
        ];
        for (signature, expected) in cases {
            assert_eq!(hex::encode(abi::selector(signature)), expected, "{}", signature);
        }
    }

    // ==================== Action Messages ====================

    #[test]
    fn test_vector_action_hashes() {
        assert_eq!(
            hex::encode(signing::action_hash(ActionKind::Redeem, 1)),
            "12979c9628d8c14e2867c67b0a2f97a92a78dc86159e0f3db7e5a694cdc24c73"
        );
        assert_eq!(
            hex::encode(signing::action_hash(ActionKind::Claim, 1)),
            "09b25c3c6848e17e22493f7175f3fad69b525b5345fa28331a31abb33e20ee9e"
        );
    }

    #[test]
    fn test_vector_eth_signed_digest() {
        let hash = signing::action_hash(ActionKind::Redeem, 1);
        assert_eq!(
            hex::encode(signing::eth_signed_message_hash(&hash)),
            "d84d7cfb58556244ba61f9ea89a3e28cbb5656489926c25e8741ebf6fc799b89"
        );
    }

    /// RFC 6979 signatures are deterministic and recover to the signer
    #[test]
    fn test_vector_signature_recovers_key_one() {
        let key = EphemeralKey::from_bytes(&key_one()).unwrap();
        let first = signing::sign_action(&key, ActionKind::Redeem, 1).unwrap();
        let second = signing::sign_action(&key, ActionKind::Redeem, 1).unwrap();
        assert_eq!(first, second);
        assert!(first.v() == 27 || first.v() == 28);

        let hash = signing::action_hash(ActionKind::Redeem, 1);
        assert_eq!(
            signing::recover_signer(&hash, &first).unwrap().to_checksum(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
        );
    }
}
