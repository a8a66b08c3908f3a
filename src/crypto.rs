//! Crypto collaborator
//!
//! Key material generation, the credential cipher transform and password
//! hashing sit behind a trait so the protocol logic never touches the
//! primitives directly. The default implementation derives a SHA-256
//! counter keystream and XORs it over the data, which makes every
//! transform its own inverse.

use rand::RngCore;
use ring::digest;

/// Cryptographic operations used by the handshake and login paths.
pub trait Crypto: Send + Sync {
    /// Fresh per-connection shared secret.
    fn create_secret_key(&self) -> Vec<u8>;

    /// Fresh connect nonce handed to a joining player and the hosting
    /// connection.
    fn create_nonce(&self) -> Vec<u8>;

    /// Wrap the shared secret under the client's key material for the
    /// handshake reply.
    fn handle_key(&self, client_key: &[u8], secret: &[u8]) -> Vec<u8>;

    /// Wrap a fresh session key under the shared secret.
    fn handle_session_key(&self, session_key: &[u8], secret: &[u8]) -> Vec<u8>;

    /// Decrypt a credential cipher block with the shared secret.
    fn handle_cipher(&self, cipher: &[u8], secret: &[u8]) -> Vec<u8>;

    /// One-way password hash.
    fn hash_password(&self, password: &[u8]) -> Vec<u8>;
}

/// Default [`Crypto`] backed by a SHA-256 counter keystream.
pub struct KeystreamCrypto;

impl KeystreamCrypto {
    const SECRET_LEN: usize = 32;
    const NONCE_LEN: usize = 16;

    /// XOR `data` with a keystream of SHA-256(key || counter) blocks.
    /// Symmetric: applying it twice with the same key is the identity.
    fn transform(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        let mut counter: u32 = 0;
        while out.len() < data.len() {
            let mut ctx = digest::Context::new(&digest::SHA256);
            ctx.update(key);
            ctx.update(&counter.to_le_bytes());
            let block = ctx.finish();
            for &b in block.as_ref() {
                if out.len() == data.len() {
                    break;
                }
                out.push(data[out.len()] ^ b);
            }
            counter += 1;
        }
        out
    }

    fn random_bytes(len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }
}

impl Crypto for KeystreamCrypto {
    fn create_secret_key(&self) -> Vec<u8> {
        Self::random_bytes(Self::SECRET_LEN)
    }

    fn create_nonce(&self) -> Vec<u8> {
        Self::random_bytes(Self::NONCE_LEN)
    }

    fn handle_key(&self, client_key: &[u8], secret: &[u8]) -> Vec<u8> {
        Self::transform(client_key, secret)
    }

    fn handle_session_key(&self, session_key: &[u8], secret: &[u8]) -> Vec<u8> {
        Self::transform(secret, session_key)
    }

    fn handle_cipher(&self, cipher: &[u8], secret: &[u8]) -> Vec<u8> {
        Self::transform(secret, cipher)
    }

    fn hash_password(&self, password: &[u8]) -> Vec<u8> {
        digest::digest(&digest::SHA256, password).as_ref().to_vec()
    }
}
