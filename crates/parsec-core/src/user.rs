use serde::{Deserialize, Serialize};

use crate::certificate::SignedCertificate;
use crate::types::{DeviceId, HumanHandle, Timestamp, UserId, UserProfile};

/// A single profile-change event in a user's history, kept so
/// `get_certificates_as_user` can replay the full ordered trail.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub new_profile: UserProfile,
    pub timestamp: Timestamp,
    pub certificate: SignedCertificate,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub human_handle: Option<HumanHandle>,
    pub current_profile: UserProfile,
    pub created_by: Option<DeviceId>,
    pub created_on: Timestamp,
    pub revoked_on: Option<Timestamp>,
    pub revoked_certificate: Option<SignedCertificate>,
    pub frozen: bool,
    pub profile_updates: Vec<ProfileUpdate>,
    pub certificate: SignedCertificate,
    /// Timestamp of the organization TOS version this user last accepted,
    /// via `/authenticated/{org}/tos`. `None` until the first
    /// acceptance, or if the organization carries no TOS at all.
    pub tos_accepted_on: Option<Timestamp>,
}

impl User {
    pub fn is_revoked(&self) -> bool {
        self.revoked_on.is_some()
    }

    /// Every mutating operation funnels its author check through this:
    /// revoked or frozen users never pass author validation.
    pub fn is_usable_as_author(&self) -> bool {
        !self.is_revoked() && !self.frozen
    }
}
