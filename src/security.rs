//! Security helpers (password hashing, constant-time compare, TURN credentials)

use base64::Engine;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Generate a random salt (hex) for hashing passwords.
pub fn generate_salt_hex() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);
    hex::encode(bytes)
}

/// Hash `password` with a `salt_hex` using SHA-256.
/// Output is hex-encoded.
pub fn hash_password_sha256_hex(password: &str, salt_hex: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Constant-time equality for hex strings.
pub fn ct_eq_hex(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Verify a password against a stored salt + hash pair.
pub fn verify_password(password: &str, salt_hex: &str, expected_hash_hex: &str) -> bool {
    let got = hash_password_sha256_hex(password, salt_hex);
    ct_eq_hex(&got, expected_hash_hex)
}

/// Ephemeral TURN credentials per the coturn REST convention:
/// username is "<expiry-unix>:<user>", credential is
/// base64(HMAC-SHA1(secret, username)).
pub fn generate_turn_credentials(
    secret: &str,
    user_id: &str,
    ttl_seconds: u64,
) -> (String, String) {
    let expiry = chrono::Utc::now().timestamp() + ttl_seconds as i64;
    let username = format!("{}:{}", expiry, user_id);

    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(username.as_bytes());
    let credential = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());

    (username, credential)
}
