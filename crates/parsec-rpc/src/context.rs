//! The three client scopes a request can arrive under. Built by the Auth Pipeline, consumed by
//! the RPC Dispatcher and SSE Streamer — nothing downstream re-derives
//! identity from headers.

use parsec_core::types::{DeviceId, OrganizationId, UserId, UserProfile};

/// Bound identity + organization for one authenticated request or SSE
/// subscription. Cheap to clone: every field is a small Copy type or a
/// cloned `OrganizationId`.
#[derive(Clone, Debug)]
pub enum ClientContext {
    /// `POST`/`GET /anonymous/{org}` — organization bootstrap only.
    Anonymous { organization_id: OrganizationId },
    /// `POST /invited/{org}` — bearer is the raw invitation token.
    Invited {
        organization_id: OrganizationId,
        invitation_token: parsec_core::types::InvitationToken,
    },
    /// `POST /authenticated/{org}`, `GET /authenticated/{org}/events`, and
    /// `POST /authenticated/{org}/tos` — bearer is a signed device token.
    /// `tos_bypass` is set for the `/tos` route only.
    Authenticated {
        organization_id: OrganizationId,
        device_id: DeviceId,
        user_id: UserId,
        profile: UserProfile,
        tos_bypass: bool,
    },
}

impl ClientContext {
    pub fn organization_id(&self) -> &OrganizationId {
        match self {
            ClientContext::Anonymous { organization_id }
            | ClientContext::Invited { organization_id, .. }
            | ClientContext::Authenticated { organization_id, .. } => organization_id,
        }
    }
}
