//! Chunked PKCS#1 v1.5 encryption for payloads longer than one RSA block
//!
//! Layout:
//! ```text
//! plaintext:  [k-11][k-11][k-11]...[<= k-11]
//! ciphertext: [ k  ][ k  ][ k  ]...[  k    ]      k = modulus length in bytes
//! ```
//!
//! Each chunk is encrypted independently and the outputs are concatenated in
//! order, so the ciphertext length is always a multiple of `k`. Empty input
//! yields empty output.

use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use crate::error::CryptoError;
use crate::PKCS1_OVERHEAD;

/// Largest plaintext chunk one encrypted block can carry.
pub fn plaintext_block_size(key: &RsaPublicKey) -> usize {
    key.size().saturating_sub(PKCS1_OVERHEAD)
}

/// Ciphertext length produced for `plaintext_len` bytes under a
/// `modulus_bytes`-byte key.
pub fn ciphertext_len(plaintext_len: usize, modulus_bytes: usize) -> usize {
    let block = modulus_bytes.saturating_sub(PKCS1_OVERHEAD);
    if block == 0 {
        return 0;
    }
    plaintext_len.div_ceil(block) * modulus_bytes
}

/// Encrypt `plaintext` chunk by chunk under `key`.
///
/// Any failing chunk aborts the whole operation; no partial ciphertext is
/// returned.
pub fn encrypt_chunked(plaintext: &[u8], key: &RsaPublicKey) -> Result<Vec<u8>, CryptoError> {
    let block = plaintext_block_size(key);
    if block == 0 {
        return Err(CryptoError::Encryption {
            index: 0,
            reason: format!("{}-byte modulus leaves no room for data", key.size()),
        });
    }

    let mut rng = rand::thread_rng();
    let mut out = Vec::with_capacity(ciphertext_len(plaintext.len(), key.size()));

    for (index, chunk) in plaintext.chunks(block).enumerate() {
        let encrypted = key
            .encrypt(&mut rng, Pkcs1v15Encrypt, chunk)
            .map_err(|e| CryptoError::Encryption {
                index,
                reason: e.to_string(),
            })?;
        out.extend_from_slice(&encrypted);
    }

    tracing::debug!(
        plaintext_bytes = plaintext.len(),
        ciphertext_bytes = out.len(),
        block,
        "chunked encryption complete"
    );
    Ok(out)
}

/// Decrypt a ciphertext produced by [`encrypt_chunked`].
///
/// The input is split into modulus-sized blocks; a length that is not a
/// multiple of the block size is rejected before any block is touched.
pub fn decrypt_chunked(ciphertext: &[u8], key: &RsaPrivateKey) -> Result<Vec<u8>, CryptoError> {
    let block = key.size();
    if block == 0 || ciphertext.len() % block != 0 {
        return Err(CryptoError::Misaligned {
            len: ciphertext.len(),
            block,
        });
    }

    let mut out = Vec::with_capacity(ciphertext.len());
    for (index, encrypted) in ciphertext.chunks_exact(block).enumerate() {
        let clear = key
            .decrypt(Pkcs1v15Encrypt, encrypted)
            .map_err(|e| CryptoError::Decryption {
                index,
                reason: e.to_string(),
            })?;
        out.extend_from_slice(&clear);
    }

    tracing::debug!(
        ciphertext_bytes = ciphertext.len(),
        plaintext_bytes = out.len(),
        "chunked decryption complete"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_keys;
    use proptest::prelude::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let pair = test_keys::receiver();
        let plaintext = b"hello, chunked world!";

        let encrypted = encrypt_chunked(plaintext, pair.public_key()).unwrap();
        let decrypted = decrypt_chunked(&encrypted, pair.private_key()).unwrap();

        assert_eq!(&decrypted, plaintext);
    }

    #[test]
    fn test_empty_input() {
        let pair = test_keys::receiver();

        let encrypted = encrypt_chunked(b"", pair.public_key()).unwrap();
        assert!(encrypted.is_empty());

        let decrypted = decrypt_chunked(&encrypted, pair.private_key()).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_hello_is_one_block() {
        let pair = test_keys::receiver();
        let encrypted = encrypt_chunked(b"hello", pair.public_key()).unwrap();
        assert_eq!(encrypted.len(), 128);
        assert_eq!(ciphertext_len(5, 128), 128);
    }

    #[test]
    fn test_block_boundaries() {
        let pair = test_keys::receiver();
        assert_eq!(plaintext_block_size(pair.public_key()), 117);

        // exactly one full chunk, one byte over, two full chunks
        for (len, blocks) in [(117usize, 1usize), (118, 2), (234, 2), (235, 3)] {
            let data = vec![0x5Au8; len];
            let encrypted = encrypt_chunked(&data, pair.public_key()).unwrap();
            assert_eq!(encrypted.len(), blocks * 128, "len {len}");
            assert_eq!(decrypt_chunked(&encrypted, pair.private_key()).unwrap(), data);
        }
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let encrypted = encrypt_chunked(b"secret data", test_keys::receiver().public_key()).unwrap();
        let result = decrypt_chunked(&encrypted, test_keys::sender().private_key());
        assert!(result.is_err());
    }

    #[test]
    fn test_decrypt_misaligned() {
        let pair = test_keys::receiver();
        let mut encrypted = encrypt_chunked(b"secret data", pair.public_key()).unwrap();
        encrypted.push(0);

        let result = decrypt_chunked(&encrypted, pair.private_key());
        assert!(matches!(
            result,
            Err(CryptoError::Misaligned { len: 129, block: 128 })
        ));
    }

    #[test]
    fn test_failure_in_later_block_aborts() {
        let pair = test_keys::receiver();
        let data = vec![1u8; 300];
        let mut encrypted = encrypt_chunked(&data, pair.public_key()).unwrap();
        // replace the last block with one from a different key
        let foreign = encrypt_chunked(b"x", test_keys::sender().public_key()).unwrap();
        let start = encrypted.len() - 128;
        encrypted[start..].copy_from_slice(&foreign);

        match decrypt_chunked(&encrypted, pair.private_key()) {
            Err(CryptoError::Decryption { index, .. }) => assert_eq!(index, 2),
            other => panic!("expected decryption failure, got {other:?}"),
        }
    }

    #[test]
    fn test_ciphertext_len_formula() {
        assert_eq!(ciphertext_len(0, 128), 0);
        assert_eq!(ciphertext_len(1, 128), 128);
        assert_eq!(ciphertext_len(117, 128), 128);
        assert_eq!(ciphertext_len(118, 128), 256);
        assert_eq!(ciphertext_len(500, 256), 2 * 256);
        assert_eq!(ciphertext_len(10, 11), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn roundtrip_any_length(data in proptest::collection::vec(any::<u8>(), 0..=400)) {
            let pair = test_keys::receiver();
            let encrypted = encrypt_chunked(&data, pair.public_key()).unwrap();
            prop_assert_eq!(encrypted.len() % pair.modulus_bytes(), 0);
            prop_assert_eq!(encrypted.len(), ciphertext_len(data.len(), pair.modulus_bytes()));

            let decrypted = decrypt_chunked(&encrypted, pair.private_key()).unwrap();
            prop_assert_eq!(decrypted, data);
        }
    }
}
