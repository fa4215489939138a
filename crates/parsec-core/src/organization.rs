use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::certificate::SignedCertificate;
use crate::types::{
    AccountVaultStrategy, ActiveUsersLimit, ClientAgentPolicy, OrganizationId, SequesterServiceId,
    Timestamp, UserProfile, VerifyKey,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TermsOfService {
    /// Per-locale URL, e.g. `{"en": "https://.../tos_en.pdf"}`.
    pub per_locale_urls: HashMap<String, String>,
    pub updated_on: Timestamp,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SequesterAuthority {
    pub verify_key: VerifyKey,
    pub created_on: Timestamp,
    /// The signed certificate this record was cooked from, kept around so
    /// `get_certificates_as_user` can hand it back through the `sequester`
    /// bucket instead of only the cooked fields above.
    pub certificate: SignedCertificate,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SequesterService {
    pub service_id: SequesterServiceId,
    pub service_label: String,
    pub encryption_key: VerifyKey,
    pub created_on: Timestamp,
    pub revoked_on: Option<Timestamp>,
}

/// The tenancy unit. Created by the administration interface, bootstrapped
/// exactly once by its first user, optionally expired (soft-delete — the
/// server never drops organization rows).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Organization {
    pub organization_id: OrganizationId,
    pub bootstrap_token: String,
    pub created_on: Timestamp,
    pub bootstrapped_on: Option<Timestamp>,
    pub is_expired: bool,
    pub root_verify_key: Option<VerifyKey>,
    pub outsider_profile_policy: UserProfile,
    pub active_users_limit: ActiveUsersLimit,
    pub minimum_archiving_period_secs: i64,
    pub tos: Option<TermsOfService>,
    pub allowed_client_agent: ClientAgentPolicy,
    pub account_vault_strategy: AccountVaultStrategy,
    pub sequester_authority: Option<SequesterAuthority>,
    pub sequester_services: Vec<SequesterService>,
}

impl Organization {
    pub fn is_bootstrapped(&self) -> bool {
        self.root_verify_key.is_some()
    }
}

/// Per-profile breakdown of a stats query: active and revoked user counts
/// for one profile tier, rolled up per profile rather than into one flat
/// active/revoked pair.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct OrganizationStatsProfileDetailItem {
    pub active: u64,
    pub revoked: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OrganizationStats {
    pub users: u64,
    pub active_users: u64,
    pub revoked_users: u64,
    pub users_per_profile_detail: HashMap<UserProfile, OrganizationStatsProfileDetailItem>,
    pub realms: u64,
    pub metadata_size: u64,
    pub data_size: u64,
}
