use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use parsec_core::organization::OrganizationStats;
use parsec_core::types::{DeviceId, RealmId, Timestamp, VlobId};

/// Shared bad-outcome vocabulary every reply variant below draws from, kept
/// as one flattened taxonomy rather than per-operation duplication — each
/// handler returns a typed sum of outcomes rather than a bare error string.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ErrorOutcome {
    OrganizationNotFound,
    DeviceNotFound,
    UserNotFound,
    RealmNotFound,
    VlobNotFound,
    InvitationNotFound,
    AuthorNotAllowed,
    RealmRoleNotAllowed,
    TimestampOutOfBallpark {
        server_timestamp: Timestamp,
        client_timestamp: Timestamp,
        ballpark_client_early_offset: i64,
        ballpark_client_late_offset: i64,
    },
    RequireGreaterTimestamp {
        strictly_greater_than: Timestamp,
    },
    BadKeyIndex {
        last_realm_certificate_timestamp: Timestamp,
    },
    BadVlobVersion,
    InvalidCertificate {
        reason: String,
    },
    InvalidKeysBundle {
        reason: String,
    },
    InvalidEncryptedRealmName,
    ActiveUsersLimitReached,
    UserIdAlreadyExists,
    DeviceIdAlreadyExists,
    HumanHandleAlreadyTaken,
    OrganizationAlreadyBootstrapped,
    BootstrapTokenMismatch,
    VlobIdAlreadyExists,
    RealmExpired,
    OutsiderRoleRestriction,
    KeysBundleCoverageIncomplete,
    Internal {
        reason: String,
    },
}

impl From<parsec_core::error::ParsecCoreError> for ErrorOutcome {
    fn from(e: parsec_core::error::ParsecCoreError) -> Self {
        use parsec_core::error::ParsecCoreError as E;
        match e {
            E::OrganizationNotFound(_) => ErrorOutcome::OrganizationNotFound,
            E::DeviceNotFound(_) => ErrorOutcome::DeviceNotFound,
            E::UserNotFound(_) => ErrorOutcome::UserNotFound,
            E::RealmNotFound(_) => ErrorOutcome::RealmNotFound,
            E::VlobNotFound(_) => ErrorOutcome::VlobNotFound,
            E::InvitationNotFound(_) => ErrorOutcome::InvitationNotFound,
            E::AuthorNotAllowed => ErrorOutcome::AuthorNotAllowed,
            E::RealmRoleNotAllowed => ErrorOutcome::RealmRoleNotAllowed,
            E::TimestampOutOfBallpark {
                server_timestamp,
                client_timestamp,
                ballpark_client_early_offset,
                ballpark_client_late_offset,
            } => ErrorOutcome::TimestampOutOfBallpark {
                server_timestamp,
                client_timestamp,
                ballpark_client_early_offset,
                ballpark_client_late_offset,
            },
            E::RequireGreaterTimestamp {
                strictly_greater_than,
            } => ErrorOutcome::RequireGreaterTimestamp {
                strictly_greater_than,
            },
            E::BadKeyIndex {
                last_realm_certificate_timestamp,
            } => ErrorOutcome::BadKeyIndex {
                last_realm_certificate_timestamp,
            },
            E::BadVlobVersion => ErrorOutcome::BadVlobVersion,
            E::InvalidCertificate(reason) => ErrorOutcome::InvalidCertificate { reason },
            E::InvalidKeysBundle(reason) => ErrorOutcome::InvalidKeysBundle { reason },
            E::InvalidEncryptedRealmName => ErrorOutcome::InvalidEncryptedRealmName,
            E::ActiveUsersLimitReached => ErrorOutcome::ActiveUsersLimitReached,
            E::UserIdAlreadyExists => ErrorOutcome::UserIdAlreadyExists,
            E::DeviceIdAlreadyExists => ErrorOutcome::DeviceIdAlreadyExists,
            E::HumanHandleAlreadyTaken => ErrorOutcome::HumanHandleAlreadyTaken,
            E::OrganizationAlreadyBootstrapped => ErrorOutcome::OrganizationAlreadyBootstrapped,
            E::BootstrapTokenMismatch => ErrorOutcome::BootstrapTokenMismatch,
            E::VlobIdAlreadyExists => ErrorOutcome::VlobIdAlreadyExists,
            E::RealmExpired => ErrorOutcome::RealmExpired,
            E::OutsiderRoleRestriction => ErrorOutcome::OutsiderRoleRestriction,
            E::KeysBundleCoverageIncomplete => ErrorOutcome::KeysBundleCoverageIncomplete,
            other => ErrorOutcome::Internal {
                reason: other.to_string(),
            },
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CertificateEntry {
    pub raw: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VlobReadItem {
    pub vlob_id: VlobId,
    pub key_index: u32,
    pub author: DeviceId,
    pub version: u32,
    pub created_on: Timestamp,
    pub blob: Vec<u8>,
}

/// One typed reply per `Request` variant, `Ok` carrying that operation's
/// success payload and every other variant drawn from `ErrorOutcome`. Kept
/// as a single flattened enum (rather than per-operation reply types) so the
/// Codec and RPC Dispatcher share one exhaustive match.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Reply {
    Ok,
    OrganizationBootstrapOk,
    OrganizationConfigOk {
        is_expired: bool,
        active_users_limit: Option<u64>,
        tos_per_locale_urls: Option<HashMap<String, String>>,
    },
    OrganizationStatsOk(OrganizationStats),

    UserCreateOk,
    DeviceCreateOk,
    UserRevokeOk,
    UserRevokeIdempotent {
        certificate_timestamp: Timestamp,
    },
    UserUpdateOk,
    UserGetCertificatesOk {
        common_certificates: Vec<CertificateEntry>,
        sequester_certificates: Vec<CertificateEntry>,
        realm_certificates: HashMap<RealmId, Vec<CertificateEntry>>,
        shamir_recovery_certificates: Vec<CertificateEntry>,
    },

    RealmCreateOk,
    RealmShareOk,
    RealmRotateKeyOk,
    RealmRenameOk,

    VlobCreateOk,
    VlobUpdateOk,
    VlobReadVersionsOk {
        items: Vec<VlobReadItem>,
        needed_common_certificate_timestamp: Timestamp,
        needed_realm_certificate_timestamp: Timestamp,
    },

    TosAcceptOk,
    Pong {
        pong: String,
    },

    Error(ErrorOutcome),
}

impl From<parsec_core::error::ParsecCoreError> for Reply {
    fn from(e: parsec_core::error::ParsecCoreError) -> Self {
        Reply::Error(e.into())
    }
}

impl From<ErrorOutcome> for Reply {
    fn from(e: ErrorOutcome) -> Self {
        Reply::Error(e)
    }
}
