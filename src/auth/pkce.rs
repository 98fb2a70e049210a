use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// A verifier/challenge pair scoped to a single PKCE login attempt (RFC 7636).
pub struct PkceChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl PkceChallenge {
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = derive_code_challenge(&code_verifier);
        PkceChallenge {
            code_verifier,
            code_challenge,
        }
    }
}

/// Generate a fresh PKCE code verifier: 96 random bytes, base64url-encoded.
pub fn generate_code_verifier() -> String {
    let mut buf = [0u8; 96];
    rand::RngCore::fill_bytes(&mut rand::rng(), &mut buf);
    let mut verifier = URL_SAFE_NO_PAD.encode(buf);
    // RFC 7636 caps the verifier at 128 characters.
    verifier.truncate(128);
    verifier
}

/// Derive the S256 code challenge for a verifier.
pub fn derive_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
