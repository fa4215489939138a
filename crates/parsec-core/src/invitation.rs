use serde::{Deserialize, Serialize};

use crate::types::{DeviceId, InvitationToken, Timestamp, UserId};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationType {
    User,
    Device,
    ShamirRecovery,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    Idle,
    Ready,
    Deleted,
}

/// A one-time capability to join an organization as a user or device, or to
/// run shamir recovery. Never mutated in place past `Deleted`: lifecycle is
/// created -> used -> deleted|cancelled.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Invitation {
    pub token: InvitationToken,
    pub kind: InvitationType,
    pub created_by: DeviceId,
    pub claimer_email: Option<String>,
    pub greeter_user_id: Option<UserId>,
    pub created_on: Timestamp,
    pub status: InvitationStatus,
    pub deleted_on: Option<Timestamp>,
}

impl Invitation {
    pub fn is_usable(&self) -> bool {
        !matches!(self.status, InvitationStatus::Deleted)
    }
}
