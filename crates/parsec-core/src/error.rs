use thiserror::Error;

use crate::types::Timestamp;

/// Taxonomy shared across the component-level operations. Component crates
/// narrow this down to their own typed outcome enums (e.g. `UserCreateError`)
/// and convert into this one only at the RPC-reply boundary; variants are
/// grouped below by section comment (NotFound, NotAllowed, Revoked/Expired,
/// timestamp outcomes, ...) rather than split into per-concern enums.
#[derive(Debug, Error)]
pub enum ParsecCoreError {
    // ── NotFound ──────────────────────────────────────────────────────────
    #[error("organization not found: {0}")]
    OrganizationNotFound(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("realm not found: {0}")]
    RealmNotFound(String),

    #[error("vlob not found: {0}")]
    VlobNotFound(String),

    #[error("invitation not found: {0}")]
    InvitationNotFound(String),

    // ── NotAllowed ────────────────────────────────────────────────────────
    #[error("author profile does not meet the required minimum")]
    AuthorNotAllowed,

    #[error("author does not hold the required realm role")]
    RealmRoleNotAllowed,

    // ── Handshake-level (mapped to dedicated HTTP codes, never a typed reply) ─
    #[error("organization has expired")]
    OrganizationExpired,

    #[error("user has been revoked")]
    UserRevoked,

    #[error("user is frozen")]
    UserFrozen,

    #[error("terms of service have not been accepted")]
    TosNotAccepted,

    #[error("web client agent not allowed by organization policy")]
    WebClientNotAllowed,

    #[error("bearer token timestamp out of ballpark")]
    TokenOutOfBallpark,

    // ── Timestamp ordering ───────────────────────────────────────────────
    #[error("timestamp out of ballpark: server={server_timestamp} client={client_timestamp}")]
    TimestampOutOfBallpark {
        server_timestamp: Timestamp,
        client_timestamp: Timestamp,
        ballpark_client_early_offset: i64,
        ballpark_client_late_offset: i64,
    },

    #[error("timestamp must be strictly greater than {strictly_greater_than}")]
    RequireGreaterTimestamp { strictly_greater_than: Timestamp },

    // ── Realm / vlob watermark mismatches ─────────────────────────────────
    #[error("bad key index; last realm certificate at {last_realm_certificate_timestamp}")]
    BadKeyIndex {
        last_realm_certificate_timestamp: Timestamp,
    },

    #[error("bad vlob version")]
    BadVlobVersion,

    // ── Structural / cryptographic validation ────────────────────────────
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("invalid keys bundle: {0}")]
    InvalidKeysBundle(String),

    #[error("invalid encrypted realm name")]
    InvalidEncryptedRealmName,

    #[error("invalid signature")]
    InvalidSignature,

    // ── Idempotence ───────────────────────────────────────────────────────
    #[error("operation already applied at {certificate_timestamp}")]
    Idempotent { certificate_timestamp: Timestamp },

    // ── Preconditions specific to user/realm/org mutations ───────────────
    #[error("active users limit reached")]
    ActiveUsersLimitReached,

    #[error("user ID already taken")]
    UserIdAlreadyExists,

    #[error("device ID already taken")]
    DeviceIdAlreadyExists,

    #[error("human handle email already used by an active user")]
    HumanHandleAlreadyTaken,

    #[error("organization already bootstrapped")]
    OrganizationAlreadyBootstrapped,

    #[error("bootstrap token mismatch")]
    BootstrapTokenMismatch,

    #[error("vlob ID already exists")]
    VlobIdAlreadyExists,

    #[error("realm is expired")]
    RealmExpired,

    #[error("outsider profile cannot hold OWNER or MANAGER realm role")]
    OutsiderRoleRestriction,

    #[error("key rotation must cover every current non-revoked participant")]
    KeysBundleCoverageIncomplete,

    // ── Serialization / storage ──────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    // ── Internal ──────────────────────────────────────────────────────────
    #[error("internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(String),
}
