use parsec_core::types::{Signature, VerifyKey};
use pqcrypto_dilithium::dilithium2;
use pqcrypto_traits::sign::{DetachedSignature, PublicKey, SecretKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid verify key length: expected {expected}, got {got}")]
    InvalidVerifyKeyLength { expected: usize, got: usize },
}

/// Sign `message` with a Dilithium2 secret key. Returns a detached signature.
pub fn sign(secret_key_bytes: &[u8], message: &[u8]) -> Result<Signature, SignatureError> {
    let sk = dilithium2::SecretKey::from_bytes(secret_key_bytes)
        .map_err(|_| SignatureError::InvalidSignature)?;
    let sig = dilithium2::detached_sign(message, &sk);
    Ok(Signature(sig.as_bytes().to_vec()))
}

/// Verify a detached Dilithium2 signature against a named verify key. This is
/// the primitive the Crypto Verifier builds on: per certificate it extracts
/// the canonical fields, then calls this against the author device's verify
/// key before trusting anything in the payload.
pub fn verify_signature(
    verify_key: &VerifyKey,
    message: &[u8],
    signature: &Signature,
) -> Result<(), SignatureError> {
    let pk = dilithium2::PublicKey::from_bytes(&verify_key.0).map_err(|_| {
        SignatureError::InvalidVerifyKeyLength {
            expected: dilithium2::public_key_bytes(),
            got: verify_key.0.len(),
        }
    })?;
    let sig = dilithium2::DetachedSignature::from_bytes(&signature.0)
        .map_err(|_| SignatureError::InvalidSignature)?;
    dilithium2::verify_detached_signature(&sig, message, &pk)
        .map_err(|_| SignatureError::InvalidSignature)
}

/// Stateless signer helper used by test harnesses and the bootstrap flow to
/// produce certificates without round-tripping through a `KeyPair`.
pub struct ParsecSigner {
    pub verify_key: VerifyKey,
    secret_key_bytes: zeroize::Zeroizing<Vec<u8>>,
}

impl ParsecSigner {
    pub fn from_secret_key_bytes(sk_bytes: Vec<u8>, pk_bytes: Vec<u8>) -> Self {
        Self {
            verify_key: VerifyKey(pk_bytes),
            secret_key_bytes: zeroize::Zeroizing::new(sk_bytes),
        }
    }

    pub fn sign(&self, message: &[u8]) -> Result<Signature, SignatureError> {
        sign(&self.secret_key_bytes, message)
    }

    pub fn verify(&self, message: &[u8], sig: &Signature) -> Result<(), SignatureError> {
        verify_signature(&self.verify_key, message, sig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pqcrypto_dilithium::dilithium2;

    #[test]
    fn sign_verify_round_trip() {
        let (pk, sk) = dilithium2::keypair();
        let pk_bytes = VerifyKey(pk.as_bytes().to_vec());
        let message = b"a realm key rotation certificate";

        let signer =
            ParsecSigner::from_secret_key_bytes(sk.as_bytes().to_vec(), pk.as_bytes().to_vec());
        let sig = signer.sign(message).unwrap();
        assert!(verify_signature(&pk_bytes, message, &sig).is_ok());
    }

    #[test]
    fn tampered_message_fails() {
        let (pk, sk) = dilithium2::keypair();
        let pk_bytes = VerifyKey(pk.as_bytes().to_vec());
        let signer =
            ParsecSigner::from_secret_key_bytes(sk.as_bytes().to_vec(), pk.as_bytes().to_vec());
        let sig = signer.sign(b"original").unwrap();
        assert!(verify_signature(&pk_bytes, b"tampered", &sig).is_err());
    }

    #[test]
    fn wrong_key_fails() {
        let (pk_a, _sk_a) = dilithium2::keypair();
        let (_pk_b, sk_b) = dilithium2::keypair();
        let signer =
            ParsecSigner::from_secret_key_bytes(sk_b.as_bytes().to_vec(), _pk_b.as_bytes().to_vec());
        let sig = signer.sign(b"message").unwrap();
        let pk_a_key = VerifyKey(pk_a.as_bytes().to_vec());
        assert!(verify_signature(&pk_a_key, b"message", &sig).is_err());
    }
}
