use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use parsec_core::types::{RealmId, Timestamp, UserId, VerifyKey, VlobId};

/// Every typed command the RPC Dispatcher knows how to route, across all
/// three client scopes (anonymous / invited / authenticated). Which variants
/// a given scope may submit is enforced by the dispatcher, not by this type —
/// the Codec's job is only total decode/encode.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Request {
    // ── Anonymous scope ───────────────────────────────────────────────────
    OrganizationBootstrap {
        bootstrap_token: String,
        root_verify_key: VerifyKey,
        user_certificate: Vec<u8>,
        device_certificate: Vec<u8>,
        redacted_user_certificate: Vec<u8>,
        redacted_device_certificate: Vec<u8>,
        sequester_authority_certificate: Option<Vec<u8>>,
        timestamp: Timestamp,
    },

    // ── Invited scope ─────────────────────────────────────────────────────
    InvitationInfo,

    // ── Authenticated scope ───────────────────────────────────────────────
    Ping {
        ping: String,
    },
    OrganizationConfig,
    OrganizationStats {
        at: Option<Timestamp>,
    },

    UserCreate {
        user_certificate: Vec<u8>,
        device_certificate: Vec<u8>,
        redacted_user_certificate: Vec<u8>,
        redacted_device_certificate: Vec<u8>,
    },
    DeviceCreate {
        device_certificate: Vec<u8>,
        redacted_device_certificate: Vec<u8>,
    },
    UserRevoke {
        revoked_user_certificate: Vec<u8>,
    },
    UserUpdate {
        user_update_certificate: Vec<u8>,
    },
    UserGetCertificates {
        common_after: Option<Timestamp>,
        sequester_after: Option<Timestamp>,
        realm_after: HashMap<RealmId, Timestamp>,
        shamir_recovery_after: Option<Timestamp>,
    },

    RealmCreate {
        realm_role_certificate: Vec<u8>,
    },
    RealmShare {
        realm_role_certificate: Vec<u8>,
        recipient_keys_bundle_access: Vec<u8>,
    },
    RealmRotateKey {
        realm_key_rotation_certificate: Vec<u8>,
        per_participant_keys_bundle_access: HashMap<UserId, Vec<u8>>,
    },
    RealmRename {
        realm_name_certificate: Vec<u8>,
    },

    VlobCreate {
        realm_id: RealmId,
        vlob_id: VlobId,
        key_index: u32,
        timestamp: Timestamp,
        blob: Vec<u8>,
        sequester_blob: Option<HashMap<parsec_core::types::SequesterServiceId, Vec<u8>>>,
    },
    VlobUpdate {
        vlob_id: VlobId,
        version: u32,
        key_index: u32,
        timestamp: Timestamp,
        blob: Vec<u8>,
        sequester_blob: Option<HashMap<parsec_core::types::SequesterServiceId, Vec<u8>>>,
    },
    VlobReadVersions {
        realm_id: RealmId,
        items: Vec<(VlobId, u32)>,
    },

    TosAccept {
        tos_updated_on: Timestamp,
    },
}
