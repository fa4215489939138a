use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{RealmId, Timestamp};

/// A logical write-serialization domain within an organization. Each write
/// acquires the minimum set of per-topic locks covering the topics it
/// touches; writes to disjoint topics proceed concurrently.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Topic {
    Common,
    Sequester,
    Realm(RealmId),
    ShamirRecovery,
}

/// Per-organization watermarks: the max certificate/vlob timestamp observed
/// in each topic, plus the global max across all topics and all vlobs. New
/// writes are only accepted if their timestamp strictly exceeds the global
/// watermark (`RequireGreaterTimestamp` otherwise).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TopicWatermarks {
    common: Option<Timestamp>,
    sequester: Option<Timestamp>,
    shamir_recovery: Option<Timestamp>,
    realms: HashMap<RealmId, Timestamp>,
}

impl TopicWatermarks {
    pub fn get(&self, topic: &Topic) -> Option<Timestamp> {
        match topic {
            Topic::Common => self.common,
            Topic::Sequester => self.sequester,
            Topic::ShamirRecovery => self.shamir_recovery,
            Topic::Realm(id) => self.realms.get(id).copied(),
        }
    }

    /// The global `last_certificate_or_vlob_timestamp`: the max across every
    /// topic watermark tracked so far.
    pub fn global_last(&self) -> Option<Timestamp> {
        [self.common, self.sequester, self.shamir_recovery]
            .into_iter()
            .flatten()
            .chain(self.realms.values().copied())
            .max()
    }

    /// Records `ts` as the new watermark for `topic`. Callers must have
    /// already checked `ts > self.global_last()` before committing; this
    /// method does not re-validate ordering.
    pub fn bump(&mut self, topic: &Topic, ts: Timestamp) {
        match topic {
            Topic::Common => self.common = Some(ts),
            Topic::Sequester => self.sequester = Some(ts),
            Topic::ShamirRecovery => self.shamir_recovery = Some(ts),
            Topic::Realm(id) => {
                self.realms.insert(*id, ts);
            }
        }
    }
}
