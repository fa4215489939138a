//! Per-topic write serialization: a mutation acquires the minimum set of
//! write-locks for the topics it touches, so writes to disjoint topics
//! proceed concurrently while writes sharing a topic serialize. One lock
//! per `Topic` rather than one global lock over the whole organization.

use std::sync::Arc;

use parking_lot::RwLock;

use parsec_core::topic::Topic;

use crate::org_state::OrgState;

/// Marker type returned by `OrgState::with_topic_locks` — the locks it
/// represents are released when the enclosing call returns; there is
/// nothing to hold onto afterward.
pub struct TopicGuard;

impl OrgState {
    /// Runs `f` with write-locks held for every topic in `topics`, acquired
    /// in a fixed order (`Common`, `Sequester`, `ShamirRecovery`, then
    /// `Realm` topics sorted by ID) so that two operations requesting an
    /// overlapping topic set can never deadlock on each other.
    pub fn with_topic_locks<R>(&self, topics: &[Topic], f: impl FnOnce() -> R) -> R {
        let mut sorted: Vec<&Topic> = topics.iter().collect();
        sorted.sort_by_key(|t| topic_rank(t));
        sorted.dedup_by_key(|t| topic_rank(t));
        self.lock_chain(&sorted, Box::new(f))
    }

    fn lock_chain<R>(&self, topics: &[&Topic], f: Box<dyn FnOnce() -> R + '_>) -> R {
        match topics.split_first() {
            None => f(),
            Some((head, rest)) => match head {
                Topic::Common => {
                    let _g = self.common_lock.write();
                    self.lock_chain(rest, f)
                }
                Topic::Sequester => {
                    let _g = self.sequester_lock.write();
                    self.lock_chain(rest, f)
                }
                Topic::ShamirRecovery => {
                    let _g = self.shamir_lock.write();
                    self.lock_chain(rest, f)
                }
                Topic::Realm(realm_id) => {
                    let lock = self.realm_lock(*realm_id);
                    let _g = lock.write();
                    self.lock_chain(rest, f)
                }
            },
        }
    }

    /// Returns the (lazily-created) lock guarding a single realm's topic.
    pub(crate) fn realm_lock(&self, realm_id: parsec_core::types::RealmId) -> Arc<RwLock<()>> {
        self.realm_locks
            .entry(realm_id)
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }
}

fn topic_rank(t: &Topic) -> (u8, u128) {
    match t {
        Topic::Common => (0, 0),
        Topic::Sequester => (1, 0),
        Topic::ShamirRecovery => (2, 0),
        Topic::Realm(id) => (3, id.as_uuid().as_u128()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parsec_core::types::{
        AccountVaultStrategy, ActiveUsersLimit, ClientAgentPolicy, OrganizationId, RealmId,
        UserProfile,
    };
    use std::sync::atomic::{AtomicU32, Ordering};

    fn org_state() -> OrgState {
        OrgState::new(parsec_core::organization::Organization {
            organization_id: OrganizationId::new("Org1").unwrap(),
            bootstrap_token: "tok".into(),
            created_on: Utc::now(),
            bootstrapped_on: None,
            is_expired: false,
            root_verify_key: None,
            outsider_profile_policy: UserProfile::Outsider,
            active_users_limit: ActiveUsersLimit::Unbounded,
            minimum_archiving_period_secs: 2592000,
            tos: None,
            allowed_client_agent: ClientAgentPolicy::NativeOrWeb,
            account_vault_strategy: AccountVaultStrategy::Allowed,
            sequester_authority: None,
            sequester_services: Vec::new(),
        })
    }

    #[test]
    fn disjoint_topics_do_not_contend() {
        let state = org_state();
        let counter = AtomicU32::new(0);
        state.with_topic_locks(&[Topic::Common], || {
            state.with_topic_locks(&[Topic::Realm(RealmId::default_new())], || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn same_realm_lock_is_reentrant_safe_across_calls() {
        let state = org_state();
        let realm_id = RealmId::default_new();
        state.with_topic_locks(&[Topic::Realm(realm_id)], || {});
        state.with_topic_locks(&[Topic::Realm(realm_id)], || {});
        assert!(state.realm_locks.contains_key(&realm_id));
    }

    #[test]
    fn duplicate_topics_in_request_do_not_self_deadlock() {
        let state = org_state();
        let mut ran = false;
        state.with_topic_locks(&[Topic::Common, Topic::Common], || {
            ran = true;
        });
        assert!(ran);
    }
}
