use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use rand::RngCore;
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

fn derive_key(secret: &str) -> Key<Aes256Gcm> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    let out = hasher.finalize();
    let mut k = [0u8; 32];
    k.copy_from_slice(&out);
    *Key::<Aes256Gcm>::from_slice(&k)
}

fn fresh_nonce() -> [u8; NONCE_LEN] {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    nonce_bytes
}

pub fn encrypt_string(secret: &str, plaintext: &str) -> anyhow::Result<String> {
    let cipher = Aes256Gcm::new(&derive_key(secret));
    let nonce_bytes = fresh_nonce();
    let ct = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|e| anyhow::anyhow!("encrypt failed: {}", e))?;
    let n_b64 = base64::engine::general_purpose::STANDARD.encode(nonce_bytes);
    let c_b64 = base64::engine::general_purpose::STANDARD.encode(ct);
    Ok(format!("v1:{}:{}", n_b64, c_b64))
}

pub fn decrypt_string(secret: &str, ciphertext: &str) -> anyhow::Result<String> {
    // Rows written before encryption was enabled hold plain text
    if !ciphertext.starts_with("v1:") {
        return Ok(ciphertext.to_string());
    }
    let parts: Vec<&str> = ciphertext.splitn(3, ':').collect();
    if parts.len() != 3 {
        anyhow::bail!("invalid format");
    }
    let nonce_bytes = base64::engine::general_purpose::STANDARD
        .decode(parts[1])
        .map_err(|e| anyhow::anyhow!("b64 decode nonce: {}", e))?;
    let ct_bytes = base64::engine::general_purpose::STANDARD
        .decode(parts[2])
        .map_err(|e| anyhow::anyhow!("b64 decode ct: {}", e))?;
    if nonce_bytes.len() != NONCE_LEN {
        anyhow::bail!("invalid nonce length");
    }
    let cipher = Aes256Gcm::new(&derive_key(secret));
    let pt = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ct_bytes.as_ref())
        .map_err(|e| anyhow::anyhow!("decrypt failed: {}", e))?;
    Ok(String::from_utf8(pt)?)
}

/// Encrypts a JSON document into a `v1:` string suitable for a TEXT column.
pub fn encrypt_json(secret: &str, value: &serde_json::Value) -> anyhow::Result<String> {
    encrypt_string(secret, &serde_json::to_string(value)?)
}

pub fn decrypt_json(secret: &str, stored: &str) -> anyhow::Result<serde_json::Value> {
    let plain = decrypt_string(secret, stored)?;
    Ok(serde_json::from_str(&plain)?)
}

/// Binary variant used for files at rest: the 12-byte nonce followed by the ciphertext.
pub fn encrypt_bytes(secret: &str, plaintext: &[u8]) -> anyhow::Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(&derive_key(secret));
    let nonce_bytes = fresh_nonce();
    let ct = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| anyhow::anyhow!("encrypt failed: {}", e))?;
    let mut out = Vec::with_capacity(NONCE_LEN + ct.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ct);
    Ok(out)
}

pub fn decrypt_bytes(secret: &str, sealed: &[u8]) -> anyhow::Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        anyhow::bail!("ciphertext too short");
    }
    let (nonce_bytes, ct) = sealed.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(&derive_key(secret));
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ct)
        .map_err(|e| anyhow::anyhow!("decrypt failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "a-file-encryption-key-that-is-long-enough";

    #[test]
    fn string_round_trip_uses_versioned_format() {
        let sealed = encrypt_string(SECRET, "policy 1234").unwrap();
        assert!(sealed.starts_with("v1:"));
        assert_eq!(decrypt_string(SECRET, &sealed).unwrap(), "policy 1234");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(decrypt_string(SECRET, "legacy").unwrap(), "legacy");
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = encrypt_string(SECRET, "x").unwrap();
        assert!(decrypt_string("another-key", &sealed).is_err());
    }

    #[test]
    fn json_round_trip() {
        let value = serde_json::json!({"provider": "Delta", "member_id": "D-77"});
        let sealed = encrypt_json(SECRET, &value).unwrap();
        assert!(!sealed.contains("Delta"));
        assert_eq!(decrypt_json(SECRET, &sealed).unwrap(), value);
    }

    #[test]
    fn bytes_round_trip_and_tamper_detection() {
        let plain = b"%PDF-1.7 radiograph".to_vec();
        let mut sealed = encrypt_bytes(SECRET, &plain).unwrap();
        assert_ne!(&sealed[NONCE_LEN..], plain.as_slice());
        assert_eq!(decrypt_bytes(SECRET, &sealed).unwrap(), plain);

        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;
        assert!(decrypt_bytes(SECRET, &sealed).is_err());
        assert!(decrypt_bytes(SECRET, &[1, 2, 3]).is_err());
    }
}
