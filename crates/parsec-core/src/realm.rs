use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::certificate::SignedCertificate;
use crate::types::{RealmId, RealmRole, Timestamp, UserId};

/// One entry in a realm's ordered role history. `role = None` records a
/// revocation (the user held a role and no longer does).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RealmRoleEntry {
    pub user_id: UserId,
    pub role: Option<RealmRole>,
    pub timestamp: Timestamp,
    pub certificate: SignedCertificate,
}

/// One entry in a realm's key-rotation history. `key_index` is monotonic
/// starting at 1 (`parsec_core::constants::FIRST_KEY_INDEX`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyRotation {
    pub key_index: u32,
    pub encryption_algorithm: String,
    pub hash_algorithm: String,
    pub key_canary: Vec<u8>,
    pub timestamp: Timestamp,
    pub certificate: SignedCertificate,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RealmRename {
    pub encrypted_name: Vec<u8>,
    pub timestamp: Timestamp,
    pub certificate: SignedCertificate,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Realm {
    pub realm_id: RealmId,
    pub created_on: Timestamp,
    pub role_history: Vec<RealmRoleEntry>,
    pub key_rotations: Vec<KeyRotation>,
    pub renames: Vec<RealmRename>,
    /// No Realm Component operation sets this today (there is no
    /// archive/expire operation defined) but the Vlob Component's "realm exists and
    /// not expired" precondition and the `RealmExpired` outcome both name a
    /// per-realm expiry distinct from organization expiry, so the field is
    /// carried here for that future operation to flip.
    pub is_expired: bool,
}

impl Realm {
    /// Current role per user: the last entry in `role_history` for that
    /// user, or absent if the user never held a role.
    pub fn current_roles(&self) -> HashMap<UserId, RealmRole> {
        let mut roles = HashMap::new();
        for entry in &self.role_history {
            match entry.role {
                Some(role) => {
                    roles.insert(entry.user_id, role);
                }
                None => {
                    roles.remove(&entry.user_id);
                }
            }
        }
        roles
    }

    pub fn current_role_of(&self, user_id: UserId) -> Option<RealmRole> {
        self.current_roles().get(&user_id).copied()
    }

    /// Whether `user_id` ever held any role in this realm (current or past),
    /// which is what `get_certificates_as_user` uses to decide inclusion.
    pub fn ever_participated(&self, user_id: UserId) -> bool {
        self.role_history.iter().any(|e| e.user_id == user_id)
    }

    pub fn last_key_index(&self) -> Option<u32> {
        self.key_rotations.last().map(|k| k.key_index)
    }

    pub fn last_key_rotation_timestamp(&self) -> Option<Timestamp> {
        self.key_rotations.last().map(|k| k.timestamp)
    }
}
