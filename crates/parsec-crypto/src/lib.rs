pub mod ballpark;
pub mod dilithium;
pub mod hash;
pub mod keypair;
pub mod verifier;

pub use ballpark::check_ballpark;
pub use dilithium::{verify_signature, ParsecSigner, SignatureError};
pub use hash::{blake3_hash, blake3_hex};
pub use keypair::KeyPair;
pub use verifier::{split_signed_envelope, verify_certificate};
