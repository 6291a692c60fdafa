//! At-rest sealing of IdP tokens inside session records.

use anyhow::Result;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};

/// Seal a token using the given key, bound to its session id (AAD).
/// Returns `nonce (12 bytes) || ciphertext`.
///
/// # Errors
/// Returns an error if encryption fails.
pub fn seal_token(key: &[u8; 32], token: &[u8], session_id: &str) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    let mut nonce_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let aad = construct_aad(session_id);
    let payload = Payload {
        msg: token,
        aad: &aad,
    };

    let ciphertext = cipher
        .encrypt(nonce, payload)
        .map_err(|e| anyhow::anyhow!("Encryption failure: {e}"))?;

    let mut result = Vec::with_capacity(nonce_bytes.len() + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Open a sealed token. Expects `data` to be `nonce (12 bytes) || ciphertext`.
///
/// # Errors
/// Returns an error if decryption fails, the session id doesn't match the
/// AAD, or the ciphertext is too short.
pub fn open_token(key: &[u8; 32], data: &[u8], session_id: &str) -> Result<Vec<u8>> {
    if data.len() < 12 {
        return Err(anyhow::anyhow!("Invalid ciphertext length"));
    }

    let (nonce_bytes, ciphertext) = data.split_at(12);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    let aad = construct_aad(session_id);
    let payload = Payload {
        msg: ciphertext,
        aad: &aad,
    };

    let plaintext = cipher
        .decrypt(nonce, payload)
        .map_err(|e| anyhow::anyhow!("Decryption failure: {e}"))?;

    Ok(plaintext)
}

fn construct_aad(session_id: &str) -> Vec<u8> {
    // AAD = "idp-token:v1|session_id"
    format!("idp-token:v1|{session_id}").into_bytes()
}
