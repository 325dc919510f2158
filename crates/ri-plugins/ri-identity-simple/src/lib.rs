//! # ri-identity-simple
//!
//! SHA-256 based implementation of `IdentityProvider`.
//! Handles request fingerprints, anonymous session keys and share tokens.

use base64::Engine;
use ri_core::error::{AppError, Result};
use ri_core::traits::IdentityProvider;
use sha2::{Digest, Sha256};

const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
/// Length of minted share tokens.
pub const SHARE_TOKEN_LEN: usize = 16;
const ANONYMOUS_KEY_BYTES: usize = 24;

pub struct SimpleIdentityProvider {
    /// Secret salt mixed into every fingerprint
    session_salt: String,
}

impl SimpleIdentityProvider {
    /// Accepts a salt string (e.g., from an environment variable)
    pub fn new(salt: &str) -> Self {
        Self { session_salt: salt.to_string() }
    }
}

/// OS randomness. Session keys and share tokens are never minted without it.
fn random_bytes(buf: &mut [u8]) -> Result<()> {
    getrandom::getrandom(buf).map_err(|err| {
        log::error!("os randomness unavailable: {}", err);
        AppError::Internal(format!("randomness unavailable: {err}"))
    })
}

impl IdentityProvider for SimpleIdentityProvider {
    fn fingerprint(&self, user_agent: &str, accept: &str, accept_language: &str, ip: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.session_salt.as_bytes());
        for part in [user_agent, accept, accept_language, ip] {
            hasher.update(b"|");
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    fn mint_anonymous_key(&self) -> Result<String> {
        let mut bytes = [0u8; ANONYMOUS_KEY_BYTES];
        random_bytes(&mut bytes)?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn mint_share_token(&self) -> Result<String> {
        let mut token = String::with_capacity(SHARE_TOKEN_LEN);
        let mut bytes = [0u8; 32];
        while token.len() < SHARE_TOKEN_LEN {
            random_bytes(&mut bytes)?;
            // Rejection sampling keeps the alphabet uniform.
            for b in bytes.iter().copied().filter(|b| (*b as usize) < 248) {
                if token.len() == SHARE_TOKEN_LEN {
                    break;
                }
                token.push(TOKEN_ALPHABET[b as usize % TOKEN_ALPHABET.len()] as char);
            }
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn fingerprint_is_stable_and_salted() {
        let a = SimpleIdentityProvider::new("salt-a");
        let b = SimpleIdentityProvider::new("salt-b");
        let fp = a.fingerprint("Mozilla/5.0", "text/html", "en", "10.0.0.1");
        assert_eq!(fp, a.fingerprint("Mozilla/5.0", "text/html", "en", "10.0.0.1"));
        assert_ne!(fp, b.fingerprint("Mozilla/5.0", "text/html", "en", "10.0.0.1"));
        assert_ne!(fp, a.fingerprint("Mozilla/5.0", "text/html", "en", "10.0.0.2"));
        assert_eq!(fp.len(), 64);
        assert!(!fp.contains("10.0.0.1"));
    }

    #[test]
    fn share_tokens_are_alphanumeric_and_distinct() {
        let provider = SimpleIdentityProvider::new("salt");
        let tokens: HashSet<String> = (0..200).map(|_| provider.mint_share_token().unwrap()).collect();
        assert_eq!(tokens.len(), 200);
        for token in &tokens {
            assert_eq!(token.len(), SHARE_TOKEN_LEN);
            assert!(ri_core::services::sharing::is_valid_share_token(token));
        }
    }

    #[test]
    fn anonymous_keys_are_url_safe() {
        let provider = SimpleIdentityProvider::new("salt");
        let key = provider.mint_anonymous_key().unwrap();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(key, provider.mint_anonymous_key().unwrap());
    }
}
