use std::sync::Arc;

use dashmap::DashMap;

use parsec_core::organization::Organization;
use parsec_core::types::OrganizationId;

use crate::org_state::OrgState;

/// The top-level Data Store: one `OrgState` per organization, looked up by
/// `OrganizationId`. Organizations are never removed except by the
/// test-only `drop_organization`.
#[derive(Default)]
pub struct Store {
    orgs: DashMap<OrganizationId, Arc<OrgState>>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            orgs: DashMap::new(),
        }
    }

    pub fn get_org(&self, id: &OrganizationId) -> Option<Arc<OrgState>> {
        self.orgs.get(id).map(|o| o.clone())
    }

    /// Inserts a freshly-created organization, overwriting any existing
    /// not-yet-bootstrapped one in place — organization creation is
    /// idempotent over not-yet-bootstrapped orgs.
    pub fn insert_org(&self, organization: Organization) -> Arc<OrgState> {
        let state = Arc::new(OrgState::new(organization.clone()));
        self.orgs.insert(organization.organization_id.clone(), state.clone());
        state
    }

    pub fn org_exists(&self, id: &OrganizationId) -> bool {
        self.orgs.contains_key(id)
    }

    pub fn all_organization_ids(&self) -> Vec<OrganizationId> {
        self.orgs.iter().map(|e| e.key().clone()).collect()
    }

    /// Test-only hard delete: organizations are the one entity kind ever
    /// destroyed outright rather than soft-deleted via the expired flag.
    pub fn drop_organization(&self, id: &OrganizationId) {
        self.orgs.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parsec_core::types::{
        AccountVaultStrategy, ActiveUsersLimit, ClientAgentPolicy, UserProfile,
    };

    fn fresh_org(id: &str) -> Organization {
        Organization {
            organization_id: OrganizationId::new(id).unwrap(),
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
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let store = Store::new();
        let org = fresh_org("Org1");
        store.insert_org(org.clone());
        let state = store.get_org(&org.organization_id).unwrap();
        assert_eq!(state.organization().organization_id, org.organization_id);
    }

    #[test]
    fn unknown_org_is_none() {
        let store = Store::new();
        assert!(store.get_org(&OrganizationId::new("Nope").unwrap()).is_none());
    }

    #[test]
    fn reinsert_overwrites_not_yet_bootstrapped_org() {
        let store = Store::new();
        let org = fresh_org("Org1");
        store.insert_org(org.clone());
        let mut updated = org.clone();
        updated.bootstrap_token = "new-token".into();
        store.insert_org(updated);
        let state = store.get_org(&org.organization_id).unwrap();
        assert_eq!(state.organization().bootstrap_token, "new-token");
    }

    #[test]
    fn drop_organization_removes_it() {
        let store = Store::new();
        let org = fresh_org("Org1");
        store.insert_org(org.clone());
        store.drop_organization(&org.organization_id);
        assert!(store.get_org(&org.organization_id).is_none());
    }
}
