//! Binary msgpack codec for the Parsec RPC wire format.
//!
//! Requests and replies are self-describing msgpack maps (via
//! `rmp_serde`'s named-fields mode), versioned by the `Api-Version` header
//! negotiated in the Auth Pipeline rather than by anything embedded in the
//! payload itself — a decode error at any API version surfaces the same
//! `CodecError::BadContent`, which the dispatcher maps to HTTP 415.

pub mod certificate;
pub mod reply;
pub mod request;

pub use certificate::{decode_certificate_payload, encode_certificate_payload, DecodedCertificate};
pub use reply::{CertificateEntry, ErrorOutcome, Reply, VlobReadItem};
pub use request::Request;

use parsec_core::constants::MAX_REQUEST_BODY_BYTES;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("request body exceeds {MAX_REQUEST_BODY_BYTES} bytes")]
    BodyTooLarge,

    #[error("bad content: {0}")]
    BadContent(String),
}

/// Decodes a request body for the settled API version. All versions share
/// one wire shape today; the parameter is kept so a future version fork has
/// somewhere to branch without changing every call site.
pub fn decode_request(body: &[u8], _api_minor: u32) -> Result<Request, CodecError> {
    if body.len() > MAX_REQUEST_BODY_BYTES {
        return Err(CodecError::BodyTooLarge);
    }
    rmp_serde::from_slice(body).map_err(|e| CodecError::BadContent(e.to_string()))
}

pub fn encode_reply(reply: &Reply) -> Result<Vec<u8>, CodecError> {
    rmp_serde::to_vec_named(reply).map_err(|e| CodecError::BadContent(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_round_trip() {
        let req = Request::Ping {
            ping: "hello".into(),
        };
        let encoded = rmp_serde::to_vec_named(&req).unwrap();
        let decoded = decode_request(&encoded, 2).unwrap();
        match decoded {
            Request::Ping { ping } => assert_eq!(ping, "hello"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn oversized_body_rejected() {
        let oversized = vec![0u8; MAX_REQUEST_BODY_BYTES + 1];
        assert!(matches!(
            decode_request(&oversized, 2),
            Err(CodecError::BodyTooLarge)
        ));
    }

    #[test]
    fn garbage_body_is_bad_content() {
        let garbage = vec![0xffu8; 16];
        assert!(matches!(
            decode_request(&garbage, 2),
            Err(CodecError::BadContent(_))
        ));
    }

    #[test]
    fn reply_round_trip() {
        let reply = Reply::Pong {
            pong: "hello".into(),
        };
        let encoded = encode_reply(&reply).unwrap();
        let decoded: Reply = rmp_serde::from_slice(&encoded).unwrap();
        match decoded {
            Reply::Pong { pong } => assert_eq!(pong, "hello"),
            _ => panic!("wrong variant"),
        }
    }
}
