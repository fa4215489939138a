use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use parsec_core::types::{DeviceId, OrganizationId, RealmId, Timestamp, UserId, VlobId};

/// Unique identifier for a published event, used as the SSE `id:` field and
/// as the cursor for `Last-Event-Id` resumption.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn hex(&self) -> String {
        self.0.simple().to_string()
    }

    /// Parses a `Last-Event-Id` header value back into an `EventId`.
    pub fn from_hex(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hex())
    }
}

/// A typed event published on the per-organization bus.
/// Every variant carries `event_id` (assigned at publish time) and the
/// organization it belongs to; the event bus never fans out across
/// organizations.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EventPayload {
    Pinged { ping: String },
    Invitation { token: String },
    CommonCertificate { timestamp: Timestamp },
    RealmCertificate { realm_id: RealmId, timestamp: Timestamp },
    SequesterCertificate { timestamp: Timestamp },
    ShamirRecoveryCertificate { timestamp: Timestamp },
    Vlob {
        realm_id: RealmId,
        vlob_id: VlobId,
        author: DeviceId,
        version: u32,
        timestamp: Timestamp,
        /// Omitted when the blob exceeds
        /// `parsec_core::constants::EVENT_VLOB_MAX_BLOB_SIZE` — subscribers
        /// are expected to re-fetch via `read_versions`.
        blob: Option<Vec<u8>>,
    },
    /// Sent as the first SSE frame on every subscription rather than broadcast through `EventBus::publish` — each
    /// subscriber needs the settings snapshot as of its own connect time,
    /// not whatever the bus last happened to carry.
    OrganizationConfig {
        is_expired: bool,
        active_users_limit: Option<u64>,
        tos_per_locale_urls: Option<HashMap<String, String>>,
    },
    OrganizationExpired,
    OrganizationTosUpdated,
    UserRevokedOrFrozen { user_id: UserId },
    UserUnfrozen { user_id: UserId },
    UserUpdated { user_id: UserId },
    EnrollmentConduit { token: String },
    PkiEnrollment,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub organization_id: OrganizationId,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(organization_id: OrganizationId, payload: EventPayload) -> Self {
        Self {
            event_id: EventId::new(),
            organization_id,
            payload,
        }
    }

    /// The SSE `event:` name for this payload's kind.
    pub fn sse_event_name(&self) -> &'static str {
        match self.payload {
            EventPayload::Pinged { .. } => "pinged",
            EventPayload::Invitation { .. } => "invitation",
            EventPayload::CommonCertificate { .. } => "common_certificate",
            EventPayload::RealmCertificate { .. } => "realm_certificate",
            EventPayload::SequesterCertificate { .. } => "sequester_certificate",
            EventPayload::ShamirRecoveryCertificate { .. } => "shamir_recovery_certificate",
            EventPayload::Vlob { .. } => "vlob",
            EventPayload::OrganizationConfig { .. } => "organization_config",
            EventPayload::OrganizationExpired => "organization_expired",
            EventPayload::OrganizationTosUpdated => "organization_tos_updated",
            EventPayload::UserRevokedOrFrozen { .. } => "user_revoked_or_frozen",
            EventPayload::UserUnfrozen { .. } => "user_unfrozen",
            EventPayload::UserUpdated { .. } => "user_updated",
            EventPayload::EnrollmentConduit { .. } => "enrollment_conduit",
            EventPayload::PkiEnrollment => "pki_enrollment",
        }
    }
}
