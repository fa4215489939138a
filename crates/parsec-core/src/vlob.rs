use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{DeviceId, RealmId, SequesterServiceId, Timestamp, VlobId};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VlobVersion {
    pub version: u32,
    pub author: DeviceId,
    pub timestamp: Timestamp,
    pub key_index: u32,
    pub blob: Vec<u8>,
    /// One independently-encrypted reveal blob per configured sequester
    /// service, keyed by that service's ID (`Organization::sequester_services`).
    pub sequester_blob: Option<HashMap<SequesterServiceId, Vec<u8>>>,
}

/// An append-only versioned encrypted object within a realm. Versions are
/// contiguous starting at 1.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vlob {
    pub vlob_id: VlobId,
    pub realm_id: RealmId,
    pub versions: Vec<VlobVersion>,
}

impl Vlob {
    pub fn current_version(&self) -> u32 {
        self.versions.len() as u32
    }

    pub fn latest(&self) -> Option<&VlobVersion> {
        self.versions.last()
    }

    pub fn get_version(&self, version: u32) -> Option<&VlobVersion> {
        if version == 0 {
            return None;
        }
        self.versions.get((version - 1) as usize)
    }
}
