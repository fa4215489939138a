//! Certificate payload (de)serialization. A certificate's raw wire bytes are
//! `signature || payload` (the signature prefix is `parsec-crypto`'s concern,
//! see `split_signed_envelope`); `payload` itself is a self-describing
//! msgpack map carrying the author device, timestamp, and type-specific
//! fields together, which is what this module decodes/encodes.

use serde::{Deserialize, Serialize};

use parsec_core::certificate::Certificate;
use parsec_core::types::{DeviceId, Timestamp};

use crate::CodecError;

#[derive(Serialize, Deserialize)]
struct CertificateEnvelope {
    author: DeviceId,
    timestamp: Timestamp,
    #[serde(flatten)]
    certificate: Certificate,
}

/// A certificate payload's three logical parts, as decoded from the wire.
/// `parsec_core::SignedCertificate` is the cooked-and-verified form this
/// feeds into once `parsec-crypto` has checked the signature.
pub struct DecodedCertificate {
    pub author: DeviceId,
    pub timestamp: Timestamp,
    pub certificate: Certificate,
}

pub fn decode_certificate_payload(payload: &[u8]) -> Result<DecodedCertificate, CodecError> {
    let env: CertificateEnvelope =
        rmp_serde::from_slice(payload).map_err(|e| CodecError::BadContent(e.to_string()))?;
    Ok(DecodedCertificate {
        author: env.author,
        timestamp: env.timestamp,
        certificate: env.certificate,
    })
}

pub fn encode_certificate_payload(
    author: DeviceId,
    timestamp: Timestamp,
    certificate: &Certificate,
) -> Result<Vec<u8>, CodecError> {
    let env = CertificateEnvelope {
        author,
        timestamp,
        certificate: certificate.clone(),
    };
    rmp_serde::to_vec_named(&env).map_err(|e| CodecError::BadContent(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parsec_core::types::{UserId, UserProfile, VerifyKey};

    #[test]
    fn certificate_payload_round_trips() {
        let author = DeviceId::default_new();
        let timestamp = Utc::now();
        let cert = Certificate::UserCertificate {
            user_id: UserId::default_new(),
            human_handle: None,
            public_key: VerifyKey(vec![1, 2, 3]),
            profile: UserProfile::Standard,
        };
        let encoded = encode_certificate_payload(author, timestamp, &cert).unwrap();
        let decoded = decode_certificate_payload(&encoded).unwrap();
        assert_eq!(decoded.author, author);
        assert_eq!(decoded.certificate.kind(), "user");
    }
}
