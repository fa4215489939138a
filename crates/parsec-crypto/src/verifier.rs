//! The Crypto Verifier: given a certificate's raw signed
//! bytes and its already-decoded canonical fields, checks the detached
//! signature against the author's verify key, the declared author against
//! the requesting device, and the timestamp against the ballpark — then
//! hands back a `SignedCertificate` the caller can commit to the store.

use parsec_core::certificate::{Certificate, SignedCertificate};
use parsec_core::error::ParsecCoreError;
use parsec_core::types::{DeviceId, Timestamp, VerifyKey};
use pqcrypto_dilithium::dilithium2;

use crate::dilithium::verify_signature;

/// A certificate's raw wire bytes are `signature || payload`: the detached
/// signature is a fixed-length prefix (Dilithium2: 2420 bytes) over the
/// payload that follows.
pub fn split_signed_envelope(raw: &[u8]) -> Result<(&[u8], &[u8]), ParsecCoreError> {
    let sig_len = dilithium2::signature_bytes();
    if raw.len() < sig_len {
        return Err(ParsecCoreError::InvalidCertificate(
            "certificate shorter than the signature prefix".into(),
        ));
    }
    Ok(raw.split_at(sig_len))
}

#[allow(clippy::too_many_arguments)]
pub fn verify_certificate(
    raw: Vec<u8>,
    redacted_raw: Vec<u8>,
    cooked: Certificate,
    declared_author: DeviceId,
    timestamp: Timestamp,
    expected_author: DeviceId,
    author_verify_key: &VerifyKey,
    server_now: Timestamp,
    ballpark_early_secs: i64,
    ballpark_late_secs: i64,
) -> Result<SignedCertificate, ParsecCoreError> {
    if declared_author != expected_author {
        return Err(ParsecCoreError::InvalidCertificate(
            "declared author does not match the requesting device".into(),
        ));
    }

    let (sig_bytes, payload) = split_signed_envelope(&raw)?;
    let signature = parsec_core::types::Signature(sig_bytes.to_vec());
    verify_signature(author_verify_key, payload, &signature)
        .map_err(|_| ParsecCoreError::InvalidSignature)?;

    crate::ballpark::check_ballpark(
        timestamp,
        server_now,
        ballpark_early_secs,
        ballpark_late_secs,
    )?;

    // The redacted twin must carry a valid envelope of its own (it is signed
    // independently so it can be handed to OUTSIDER callers without ever
    // decoding the non-redacted payload) and must agree with the
    // non-redacted `cooked` value on every field it doesn't redact away.
    let (redacted_sig_bytes, redacted_payload) = split_signed_envelope(&redacted_raw)?;
    let redacted_signature = parsec_core::types::Signature(redacted_sig_bytes.to_vec());
    verify_signature(author_verify_key, redacted_payload, &redacted_signature)
        .map_err(|_| ParsecCoreError::InvalidSignature)?;

    let decoded_redacted = parsec_codec::decode_certificate_payload(redacted_payload)
        .map_err(|e| ParsecCoreError::InvalidCertificate(e.to_string()))?;
    if decoded_redacted.author != declared_author || decoded_redacted.timestamp != timestamp {
        return Err(ParsecCoreError::InvalidCertificate(
            "redacted twin's author/timestamp does not match the non-redacted certificate".into(),
        ));
    }
    if !redacted_twin_matches(&cooked, &decoded_redacted.certificate) {
        return Err(ParsecCoreError::InvalidCertificate(
            "redacted twin does not match the non-redacted certificate on shared fields".into(),
        ));
    }

    Ok(SignedCertificate {
        author: declared_author,
        timestamp,
        raw,
        redacted_raw,
        cooked,
    })
}

/// Compares a cooked certificate against its redacted twin on every field
/// the twin doesn't redact away (`human_handle` on `UserCertificate`,
/// `device_label` on `DeviceCertificate`; every other variant carries no
/// personal data at all, so the twin must match it in full).
fn redacted_twin_matches(cooked: &Certificate, redacted: &Certificate) -> bool {
    match (cooked, redacted) {
        (
            Certificate::UserCertificate {
                user_id,
                human_handle: _,
                public_key,
                profile,
            },
            Certificate::UserCertificate {
                user_id: r_user_id,
                human_handle: r_human_handle,
                public_key: r_public_key,
                profile: r_profile,
            },
        ) => {
            r_human_handle.is_none()
                && user_id == r_user_id
                && public_key == r_public_key
                && profile == r_profile
        }
        (
            Certificate::DeviceCertificate {
                device_id,
                device_label: _,
                verify_key,
            },
            Certificate::DeviceCertificate {
                device_id: r_device_id,
                device_label: r_device_label,
                verify_key: r_verify_key,
            },
        ) => r_device_label.is_none() && device_id == r_device_id && verify_key == r_verify_key,
        (
            Certificate::RevokedUserCertificate { user_id },
            Certificate::RevokedUserCertificate { user_id: r_user_id },
        ) => user_id == r_user_id,
        (
            Certificate::UserUpdateCertificate {
                user_id,
                new_profile,
            },
            Certificate::UserUpdateCertificate {
                user_id: r_user_id,
                new_profile: r_new_profile,
            },
        ) => user_id == r_user_id && new_profile == r_new_profile,
        (
            Certificate::RealmRoleCertificate {
                realm_id,
                user_id,
                role,
            },
            Certificate::RealmRoleCertificate {
                realm_id: r_realm_id,
                user_id: r_user_id,
                role: r_role,
            },
        ) => realm_id == r_realm_id && user_id == r_user_id && role == r_role,
        (
            Certificate::RealmKeyRotationCertificate {
                realm_id,
                key_index,
                encryption_algorithm,
                hash_algorithm,
                key_canary,
            },
            Certificate::RealmKeyRotationCertificate {
                realm_id: r_realm_id,
                key_index: r_key_index,
                encryption_algorithm: r_encryption_algorithm,
                hash_algorithm: r_hash_algorithm,
                key_canary: r_key_canary,
            },
        ) => {
            realm_id == r_realm_id
                && key_index == r_key_index
                && encryption_algorithm == r_encryption_algorithm
                && hash_algorithm == r_hash_algorithm
                && key_canary == r_key_canary
        }
        (
            Certificate::RealmNameCertificate {
                realm_id,
                encrypted_name,
            },
            Certificate::RealmNameCertificate {
                realm_id: r_realm_id,
                encrypted_name: r_encrypted_name,
            },
        ) => realm_id == r_realm_id && encrypted_name == r_encrypted_name,
        (
            Certificate::SequesterAuthorityCertificate { verify_key },
            Certificate::SequesterAuthorityCertificate {
                verify_key: r_verify_key,
            },
        ) => verify_key == r_verify_key,
        (
            Certificate::SequesterServiceCertificate {
                service_id,
                service_label,
                encryption_key,
            },
            Certificate::SequesterServiceCertificate {
                service_id: r_service_id,
                service_label: r_service_label,
                encryption_key: r_encryption_key,
            },
        ) => {
            service_id == r_service_id
                && service_label == r_service_label
                && encryption_key == r_encryption_key
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::KeyPair;
    use chrono::Utc;
    use parsec_codec::encode_certificate_payload;
    use parsec_core::certificate::Certificate;
    use parsec_core::types::{DeviceId, HumanHandle, UserId, UserProfile};

    fn make_envelope(keypair: &KeyPair, payload: &[u8]) -> Vec<u8> {
        let sig = keypair.sign(payload);
        let mut raw = sig.0;
        raw.extend_from_slice(payload);
        raw
    }

    fn make_certificate_envelope(
        keypair: &KeyPair,
        author: DeviceId,
        timestamp: chrono::DateTime<Utc>,
        certificate: &Certificate,
    ) -> Vec<u8> {
        let payload = encode_certificate_payload(author, timestamp, certificate).unwrap();
        make_envelope(keypair, &payload)
    }

    #[test]
    fn verify_certificate_round_trip() {
        let keypair = KeyPair::generate();
        let device = DeviceId::default_new();
        let now = Utc::now();
        let user_id = UserId::default_new();

        let cooked = Certificate::UserCertificate {
            user_id: user_id.clone(),
            human_handle: Some(HumanHandle {
                email: "alice@example.com".into(),
                label: "Alice".into(),
            }),
            public_key: keypair.verify_key.clone(),
            profile: UserProfile::Standard,
        };
        let redacted = Certificate::UserCertificate {
            user_id: user_id.clone(),
            human_handle: None,
            public_key: keypair.verify_key.clone(),
            profile: UserProfile::Standard,
        };

        let raw = make_certificate_envelope(&keypair, device, now, &cooked);
        let redacted_raw = make_certificate_envelope(&keypair, device, now, &redacted);

        let result = verify_certificate(
            raw,
            redacted_raw,
            cooked,
            device,
            now,
            device,
            &keypair.verify_key,
            now,
            300,
            300,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn mismatched_redacted_twin_rejected() {
        let keypair = KeyPair::generate();
        let device = DeviceId::default_new();
        let now = Utc::now();

        let cooked = Certificate::UserCertificate {
            user_id: UserId::default_new(),
            human_handle: Some(HumanHandle {
                email: "alice@example.com".into(),
                label: "Alice".into(),
            }),
            public_key: keypair.verify_key.clone(),
            profile: UserProfile::Standard,
        };
        // Redacted twin declares a different user_id and profile than the
        // non-redacted certificate it's supposed to mirror.
        let redacted = Certificate::UserCertificate {
            user_id: UserId::default_new(),
            human_handle: None,
            public_key: keypair.verify_key.clone(),
            profile: UserProfile::Admin,
        };

        let raw = make_certificate_envelope(&keypair, device, now, &cooked);
        let redacted_raw = make_certificate_envelope(&keypair, device, now, &redacted);

        let result = verify_certificate(
            raw,
            redacted_raw,
            cooked,
            device,
            now,
            device,
            &keypair.verify_key,
            now,
            300,
            300,
        );
        assert!(result.is_err());
    }

    #[test]
    fn wrong_author_rejected() {
        let keypair = KeyPair::generate();
        let device = DeviceId::default_new();
        let other_device = DeviceId::default_new();
        let now = Utc::now();
        let payload = b"payload".to_vec();
        let raw = make_envelope(&keypair, &payload);
        let redacted_raw = make_envelope(&keypair, b"redacted");

        let cooked = Certificate::RevokedUserCertificate {
            user_id: UserId::default_new(),
        };

        let result = verify_certificate(
            raw,
            redacted_raw,
            cooked,
            device,
            now,
            other_device,
            &keypair.verify_key,
            now,
            300,
            300,
        );
        assert!(result.is_err());
    }
}
