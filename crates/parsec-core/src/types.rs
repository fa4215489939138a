use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Timestamp attached to certificates, vlob versions, and topic watermarks.
/// Carried as RFC 3339 / UTC rather than raw Unix-seconds so it round-trips
/// unambiguously across msgpack encode/decode.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

// ── OrganizationId ───────────────────────────────────────────────────────────

/// Tenancy identifier. Unlike the other identifiers below it is not a UUID:
/// organizations are named at creation time by the administration interface
/// (e.g. `Org1`), so the wire and on-disk form is the raw string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrganizationId(String);

impl OrganizationId {
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidIdError> {
        let raw = raw.into();
        if raw.is_empty() || raw.len() > 32 {
            return Err(InvalidIdError::BadLength { got: raw.len() });
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(InvalidIdError::BadCharset);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrganizationId({})", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InvalidIdError {
    #[error("identifier length out of range: got {got} bytes")]
    BadLength { got: usize },
    #[error("identifier contains characters outside [A-Za-z0-9_-]")]
    BadCharset,
}

macro_rules! uuid_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn default_new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            pub fn hex(&self) -> String {
                self.0.simple().to_string()
            }

            pub fn from_hex(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $prefix, &self.hex()[..8])
            }
        }
    };
}

uuid_id!(UserId, "UserId");
uuid_id!(DeviceId, "DeviceId");
uuid_id!(RealmId, "RealmId");
uuid_id!(VlobId, "VlobId");
uuid_id!(InvitationToken, "InvitationToken");
uuid_id!(SequesterServiceId, "SequesterServiceId");

// ── VerifyKey / Signature ────────────────────────────────────────────────────

/// Opaque verify key blob. The concrete signature scheme (and its byte
/// length) is owned by `parsec-crypto`; this crate only moves bytes around.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyKey(pub Vec<u8>);

impl fmt::Debug for VerifyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifyKey({}b)", self.0.len())
    }
}

/// Detached signature blob, always found prefixed onto its signed payload
/// inside a certificate's raw bytes.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}b)", self.0.len())
    }
}

// ── HumanHandle ───────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct HumanHandle {
    pub email: String,
    pub label: String,
}

impl fmt::Display for HumanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.label, self.email)
    }
}

// ── UserProfile ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserProfile {
    Admin,
    Standard,
    Outsider,
}

impl UserProfile {
    /// Whether `self` meets or exceeds `required` in the Admin > Standard >
    /// Outsider ordering used throughout the User/Realm components.
    pub fn at_least(&self, required: UserProfile) -> bool {
        self.rank() >= required.rank()
    }

    fn rank(&self) -> u8 {
        match self {
            UserProfile::Outsider => 0,
            UserProfile::Standard => 1,
            UserProfile::Admin => 2,
        }
    }
}

// ── RealmRole ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RealmRole {
    Owner,
    Manager,
    Contributor,
    Reader,
}

impl RealmRole {
    pub fn at_least(&self, required: RealmRole) -> bool {
        self.rank() >= required.rank()
    }

    fn rank(&self) -> u8 {
        match self {
            RealmRole::Reader => 0,
            RealmRole::Contributor => 1,
            RealmRole::Manager => 2,
            RealmRole::Owner => 3,
        }
    }
}

// ── Organization-wide policy enums ───────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientAgentPolicy {
    NativeOnly,
    NativeOrWeb,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountVaultStrategy {
    Allowed,
    Forbidden,
}

/// Active-users limit: either unbounded or a hard cap.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ActiveUsersLimit {
    Unbounded,
    Limited(u64),
}

impl ActiveUsersLimit {
    pub fn is_reached(&self, current_active: u64) -> bool {
        match self {
            ActiveUsersLimit::Unbounded => false,
            ActiveUsersLimit::Limited(max) => current_active >= *max,
        }
    }
}
