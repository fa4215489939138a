use serde::{Deserialize, Serialize};

use crate::types::{DeviceId, HumanHandle, RealmId, RealmRole, SequesterServiceId, Timestamp, UserId, UserProfile, VerifyKey};

/// Type-specific payload of a signed certificate. Every variant carries its
/// author device-ID and timestamp on the enclosing `SignedCertificate`, not
/// here, so the Crypto Verifier can check those against the surrounding
/// request parameters uniformly regardless of certificate kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Certificate {
    UserCertificate {
        user_id: UserId,
        human_handle: Option<HumanHandle>,
        public_key: VerifyKey,
        profile: UserProfile,
    },
    DeviceCertificate {
        device_id: DeviceId,
        device_label: Option<String>,
        verify_key: VerifyKey,
    },
    RevokedUserCertificate {
        user_id: UserId,
    },
    UserUpdateCertificate {
        user_id: UserId,
        new_profile: UserProfile,
    },
    RealmRoleCertificate {
        realm_id: RealmId,
        user_id: UserId,
        role: Option<RealmRole>,
    },
    RealmKeyRotationCertificate {
        realm_id: RealmId,
        key_index: u32,
        encryption_algorithm: String,
        hash_algorithm: String,
        key_canary: Vec<u8>,
    },
    RealmNameCertificate {
        realm_id: RealmId,
        encrypted_name: Vec<u8>,
    },
    SequesterAuthorityCertificate {
        verify_key: VerifyKey,
    },
    SequesterServiceCertificate {
        service_id: SequesterServiceId,
        service_label: String,
        encryption_key: VerifyKey,
    },
}

impl Certificate {
    pub fn kind(&self) -> &'static str {
        match self {
            Certificate::UserCertificate { .. } => "user",
            Certificate::DeviceCertificate { .. } => "device",
            Certificate::RevokedUserCertificate { .. } => "revoked_user",
            Certificate::UserUpdateCertificate { .. } => "user_update",
            Certificate::RealmRoleCertificate { .. } => "realm_role",
            Certificate::RealmKeyRotationCertificate { .. } => "realm_key_rotation",
            Certificate::RealmNameCertificate { .. } => "realm_name",
            Certificate::SequesterAuthorityCertificate { .. } => "sequester_authority",
            Certificate::SequesterServiceCertificate { .. } => "sequester_service",
        }
    }
}

/// A certificate as handed to/from the wire: its signed raw bytes (the exact
/// blob a client submitted, replayed byte-for-byte to other clients), the
/// redacted twin's raw bytes (served to OUTSIDER profiles), and the cooked,
/// already-verified value kept for server-side logic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedCertificate {
    pub author: DeviceId,
    pub timestamp: Timestamp,
    pub raw: Vec<u8>,
    pub redacted_raw: Vec<u8>,
    pub cooked: Certificate,
}

impl SignedCertificate {
    /// The bytes to serve to a caller, selecting the redacted twin for
    /// OUTSIDER profiles and the full certificate for everyone else.
    pub fn bytes_for_profile(&self, profile: UserProfile) -> &[u8] {
        if profile == UserProfile::Outsider {
            &self.redacted_raw
        } else {
            &self.raw
        }
    }
}
