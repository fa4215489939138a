//! The Organization Component: tenancy lifecycle — create,
//! bootstrap, administration-plane get/update, and stats. `bootstrap` is the
//! one place users/devices are created without a preceding certificate
//! chain: the certificates it consumes are self-authored by the
//! organization's first device and signed with the very `root_verify_key`
//! the request supplies, writing directly into the store rather than going
//! through the normal author-resolution path, since a one-time setup action
//! has no prior state to resolve an author against.

use parsec_codec::DecodedCertificate;
use parsec_core::certificate::{Certificate, SignedCertificate};
use parsec_core::constants::BALLPARK_DEFAULT_OFFSET_SECS;
use parsec_core::error::ParsecCoreError;
use parsec_core::organization::{Organization, OrganizationStats, SequesterAuthority, TermsOfService};
use parsec_core::topic::Topic;
use parsec_core::types::{
    AccountVaultStrategy, ActiveUsersLimit, ClientAgentPolicy, OrganizationId, Timestamp,
    UserProfile, VerifyKey,
};
use parsec_core::user::User;
use parsec_core::Device;
use parsec_crypto::{split_signed_envelope, verify_certificate};
use parsec_events::{Event, EventBus, EventPayload};
use parsec_store::Store;
use tracing::instrument;

/// Bound handle over the whole store plus the bus it publishes on. Unlike
/// the other components this one is not bound to a single `OrgState`: `create`
/// must act before a full organization exists and `bootstrap` acts at the
/// moment one becomes usable, so both need the store itself to look
/// organizations up by ID.
pub struct OrganizationComponent<'a> {
    pub store: &'a Store,
    pub events: &'a EventBus,
}

/// Patch applied by `update`. Every field is `None` = leave unchanged. `tos`
/// is doubly-optional: `None` leaves it untouched, `Some(None)` clears it,
/// `Some(Some(_))` replaces it.
#[derive(Default)]
pub struct OrganizationUpdate {
    pub is_expired: Option<bool>,
    pub active_users_limit: Option<ActiveUsersLimit>,
    pub outsider_profile_policy: Option<UserProfile>,
    pub allowed_client_agent: Option<ClientAgentPolicy>,
    pub account_vault_strategy: Option<AccountVaultStrategy>,
    pub minimum_archiving_period_secs: Option<i64>,
    pub tos: Option<Option<TermsOfService>>,
}

impl<'a> OrganizationComponent<'a> {
    /// Idempotent over not-yet-bootstrapped organizations: re-creating an
    /// organization that exists but whose `root_verify_key` is still `None`
    /// overwrites it with a fresh bootstrap token, per `organization.py::create`
    /// (see `DESIGN.md`).
    #[instrument(skip_all, fields(org = %organization_id))]
    pub fn create(
        &self,
        organization_id: OrganizationId,
        bootstrap_token: String,
        now: Timestamp,
    ) -> Result<(), ParsecCoreError> {
        if let Some(state) = self.store.get_org(&organization_id) {
            if state.organization().is_bootstrapped() {
                return Err(ParsecCoreError::OrganizationAlreadyBootstrapped);
            }
        }
        self.store.insert_org(Organization {
            organization_id,
            bootstrap_token,
            created_on: now,
            bootstrapped_on: None,
            is_expired: false,
            root_verify_key: None,
            outsider_profile_policy: UserProfile::Standard,
            active_users_limit: ActiveUsersLimit::Unbounded,
            minimum_archiving_period_secs: 30 * 24 * 3600,
            tos: None,
            allowed_client_agent: ClientAgentPolicy::NativeOrWeb,
            account_vault_strategy: AccountVaultStrategy::Allowed,
            sequester_authority: None,
            sequester_services: Vec::new(),
        });
        Ok(())
    }

    #[instrument(skip_all, fields(org = %organization_id))]
    #[allow(clippy::too_many_arguments)]
    pub fn bootstrap(
        &self,
        organization_id: &OrganizationId,
        bootstrap_token: String,
        root_verify_key: VerifyKey,
        user_certificate: Vec<u8>,
        redacted_user_certificate: Vec<u8>,
        device_certificate: Vec<u8>,
        redacted_device_certificate: Vec<u8>,
        sequester_authority_certificate: Option<Vec<u8>>,
        server_now: Timestamp,
    ) -> Result<(), ParsecCoreError> {
        let org = self
            .store
            .get_org(organization_id)
            .ok_or_else(|| ParsecCoreError::OrganizationNotFound(organization_id.to_string()))?;

        {
            let organization = org.organization();
            if organization.is_expired {
                return Err(ParsecCoreError::OrganizationExpired);
            }
            if organization.is_bootstrapped() {
                return Err(ParsecCoreError::OrganizationAlreadyBootstrapped);
            }
            if organization.bootstrap_token != bootstrap_token {
                return Err(ParsecCoreError::BootstrapTokenMismatch);
            }
        }

        let signed_user_cert = cook_bootstrap_certificate(
            user_certificate,
            redacted_user_certificate,
            &root_verify_key,
            server_now,
        )?;
        let (user_id, human_handle, profile) = match &signed_user_cert.cooked {
            Certificate::UserCertificate {
                user_id,
                human_handle,
                profile,
                ..
            } => (*user_id, human_handle.clone(), *profile),
            _ => {
                return Err(ParsecCoreError::InvalidCertificate(
                    "expected a user certificate".into(),
                ))
            }
        };

        let signed_device_cert = cook_bootstrap_certificate(
            device_certificate,
            redacted_device_certificate,
            &root_verify_key,
            server_now,
        )?;
        let (device_id, device_label, device_verify_key) = match &signed_device_cert.cooked {
            Certificate::DeviceCertificate {
                device_id,
                device_label,
                verify_key,
            } => (*device_id, device_label.clone(), verify_key.clone()),
            _ => {
                return Err(ParsecCoreError::InvalidCertificate(
                    "expected a device certificate".into(),
                ))
            }
        };
        if signed_user_cert.author != device_id || signed_device_cert.author != device_id {
            return Err(ParsecCoreError::InvalidCertificate(
                "bootstrap certificates must be self-authored by the new device".into(),
            ));
        }
        if signed_user_cert.timestamp != signed_device_cert.timestamp {
            return Err(ParsecCoreError::InvalidCertificate(
                "user and device certificate timestamps differ".into(),
            ));
        }
        let timestamp = signed_user_cert.timestamp;

        let signed_sequester_cert = sequester_authority_certificate
            .map(|raw| cook_bootstrap_certificate(raw.clone(), raw, &root_verify_key, server_now))
            .transpose()?;
        let sequester_authority = match &signed_sequester_cert {
            Some(signed) => match &signed.cooked {
                Certificate::SequesterAuthorityCertificate { verify_key } => {
                    Some(SequesterAuthority {
                        verify_key: verify_key.clone(),
                        created_on: signed.timestamp,
                        certificate: signed.clone(),
                    })
                }
                _ => {
                    return Err(ParsecCoreError::InvalidCertificate(
                        "expected a sequester-authority certificate".into(),
                    ))
                }
            },
            None => None,
        };

        let topics = if sequester_authority.is_some() {
            vec![Topic::Common, Topic::Sequester]
        } else {
            vec![Topic::Common]
        };

        org.with_topic_locks(&topics, || {
            if org.user_exists(user_id) || org.device_exists(device_id) {
                return Err(ParsecCoreError::InvalidCertificate(
                    "bootstrap user/device ID collision".into(),
                ));
            }
            check_ordering(&org, timestamp)?;

            org.put_user(User {
                user_id,
                human_handle,
                current_profile: profile,
                created_by: None,
                created_on: timestamp,
                revoked_on: None,
                revoked_certificate: None,
                frozen: false,
                profile_updates: Vec::new(),
                tos_accepted_on: None,
                certificate: signed_user_cert.clone(),
            });
            org.put_device(Device {
                device_id,
                user_id,
                device_label,
                verify_key: device_verify_key,
                created_by: None,
                created_on: timestamp,
                certificate: signed_device_cert.clone(),
            });
            org.with_organization_mut(|organization| {
                organization.root_verify_key = Some(root_verify_key.clone());
                organization.bootstrapped_on = Some(timestamp);
                organization.sequester_authority = sequester_authority.clone();
            });
            org.bump_topic(&Topic::Common, timestamp);

            let org_id = org.organization().organization_id;
            self.events.publish(Event::new(
                org_id.clone(),
                EventPayload::CommonCertificate { timestamp },
            ));
            if sequester_authority.is_some() {
                org.bump_topic(&Topic::Sequester, timestamp);
                self.events.publish(Event::new(
                    org_id,
                    EventPayload::SequesterCertificate { timestamp },
                ));
            }
            Ok(())
        })
    }

    pub fn get(&self, organization_id: &OrganizationId) -> Result<Organization, ParsecCoreError> {
        self.store
            .get_org(organization_id)
            .map(|state| state.organization())
            .ok_or_else(|| ParsecCoreError::OrganizationNotFound(organization_id.to_string()))
    }

    #[instrument(skip_all, fields(org = %organization_id))]
    pub fn update(
        &self,
        organization_id: &OrganizationId,
        patch: OrganizationUpdate,
    ) -> Result<(), ParsecCoreError> {
        let state = self
            .store
            .get_org(organization_id)
            .ok_or_else(|| ParsecCoreError::OrganizationNotFound(organization_id.to_string()))?;

        let mut became_expired = false;
        let mut tos_updated = false;
        state.with_organization_mut(|org| {
            if let Some(expired) = patch.is_expired {
                if expired && !org.is_expired {
                    became_expired = true;
                }
                org.is_expired = expired;
            }
            if let Some(limit) = patch.active_users_limit {
                org.active_users_limit = limit;
            }
            if let Some(policy) = patch.outsider_profile_policy {
                org.outsider_profile_policy = policy;
            }
            if let Some(agent) = patch.allowed_client_agent {
                org.allowed_client_agent = agent;
            }
            if let Some(strategy) = patch.account_vault_strategy {
                org.account_vault_strategy = strategy;
            }
            if let Some(period) = patch.minimum_archiving_period_secs {
                org.minimum_archiving_period_secs = period;
            }
            if let Some(tos) = patch.tos {
                org.tos = tos;
                tos_updated = true;
            }
        });

        if became_expired {
            self.events.publish(Event::new(
                organization_id.clone(),
                EventPayload::OrganizationExpired,
            ));
            // Every SSE subscriber for this organization must observe
            // EndOfStream once it has expired/§4.11).
            self.events.invalidate(organization_id);
        }
        if tos_updated {
            self.events.publish(Event::new(
                organization_id.clone(),
                EventPayload::OrganizationTosUpdated,
            ));
        }
        Ok(())
    }

    /// Counts users per profile, realms, and accumulated vlob blob size, all
    /// snapshotted at `at` when provided: entities created after `at` are
    /// excluded and revocations after `at` are treated as not-yet-revoked.
    pub fn stats(
        &self,
        organization_id: &OrganizationId,
        at: Option<Timestamp>,
    ) -> Result<OrganizationStats, ParsecCoreError> {
        let state = self
            .store
            .get_org(organization_id)
            .ok_or_else(|| ParsecCoreError::OrganizationNotFound(organization_id.to_string()))?;

        let mut stats = OrganizationStats::default();
        for user in state.all_users() {
            if at.map_or(false, |at| user.created_on > at) {
                continue;
            }
            let revoked = match user.revoked_on {
                Some(ts) => at.map_or(true, |at| ts <= at),
                None => false,
            };
            stats.users += 1;
            if revoked {
                stats.revoked_users += 1;
            } else {
                stats.active_users += 1;
            }
            let entry = stats
                .users_per_profile_detail
                .entry(user.current_profile)
                .or_default();
            if revoked {
                entry.revoked += 1;
            } else {
                entry.active += 1;
            }
        }

        let realms: Vec<_> = state
            .all_realms()
            .into_iter()
            .filter(|realm| at.map_or(true, |at| realm.created_on <= at))
            .collect();
        stats.realms = realms.len() as u64;

        for realm in &realms {
            for vlob in state.vlobs_in_realm(realm.realm_id) {
                for version in &vlob.versions {
                    if at.map_or(false, |at| version.timestamp > at) {
                        continue;
                    }
                    stats.metadata_size += version.blob.len() as u64;
                }
            }
        }
        // Block storage (file content) is out of scope; this
        // reference store never holds block data.
        stats.data_size = 0;

        Ok(stats)
    }
}

/// Decodes and verifies a bootstrap certificate: unlike the steady-state
/// operations in `parsec-user`/`parsec-realm` there is no pre-existing
/// author device to resolve a verify key from, so the declared author inside
/// the payload is trusted as its own `expected_author` and the signature is
/// checked against the freshly-supplied `root_verify_key` instead of a
/// stored device key.
fn cook_bootstrap_certificate(
    raw: Vec<u8>,
    redacted_raw: Vec<u8>,
    root_verify_key: &VerifyKey,
    server_now: Timestamp,
) -> Result<SignedCertificate, ParsecCoreError> {
    let (_, payload) = split_signed_envelope(&raw)?;
    let decoded: DecodedCertificate = parsec_codec::decode_certificate_payload(payload)
        .map_err(|e| ParsecCoreError::InvalidCertificate(e.to_string()))?;
    let declared_author = decoded.author;
    verify_certificate(
        raw,
        redacted_raw,
        decoded.certificate,
        declared_author,
        decoded.timestamp,
        declared_author,
        root_verify_key,
        server_now,
        BALLPARK_DEFAULT_OFFSET_SECS,
        BALLPARK_DEFAULT_OFFSET_SECS,
    )
}

fn check_ordering(org: &parsec_store::OrgState, timestamp: Timestamp) -> Result<(), ParsecCoreError> {
    if let Some(last) = org.global_last_timestamp() {
        if timestamp <= last {
            return Err(ParsecCoreError::RequireGreaterTimestamp {
                strictly_greater_than: last,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parsec_core::types::{DeviceId, HumanHandle, UserId};
    use parsec_crypto::KeyPair;

    fn envelope(keypair: &KeyPair, payload: &[u8]) -> Vec<u8> {
        let sig = keypair.sign(payload);
        let mut raw = sig.0;
        raw.extend_from_slice(payload);
        raw
    }

    #[test]
    fn create_then_bootstrap_succeeds() {
        let store = Store::new();
        let events = EventBus::new();
        let component = OrganizationComponent {
            store: &store,
            events: &events,
        };
        let org_id = OrganizationId::new("Org1").unwrap();
        let now = Utc::now();
        component
            .create(org_id.clone(), "tok".into(), now)
            .unwrap();

        let keypair = KeyPair::generate();
        let user_id = UserId::default_new();
        let device_id = DeviceId::default_new();
        let later = now + chrono::Duration::seconds(10);

        let user_payload = parsec_codec::encode_certificate_payload(
            device_id,
            later,
            &Certificate::UserCertificate {
                user_id,
                human_handle: Some(HumanHandle {
                    email: "root@example.com".into(),
                    label: "Root".into(),
                }),
                public_key: keypair.verify_key.clone(),
                profile: UserProfile::Admin,
            },
        )
        .unwrap();
        let device_payload = parsec_codec::encode_certificate_payload(
            device_id,
            later,
            &Certificate::DeviceCertificate {
                device_id,
                device_label: None,
                verify_key: keypair.verify_key.clone(),
            },
        )
        .unwrap();
        let redacted_user_payload = parsec_codec::encode_certificate_payload(
            device_id,
            later,
            &Certificate::UserCertificate {
                user_id,
                human_handle: None,
                public_key: keypair.verify_key.clone(),
                profile: UserProfile::Admin,
            },
        )
        .unwrap();
        let user_raw = envelope(&keypair, &user_payload);
        let redacted_user_raw = envelope(&keypair, &redacted_user_payload);
        let device_raw = envelope(&keypair, &device_payload);

        component
            .bootstrap(
                &org_id,
                "tok".into(),
                keypair.verify_key.clone(),
                user_raw,
                redacted_user_raw,
                device_raw.clone(),
                device_raw,
                None,
                later,
            )
            .unwrap();

        let org = component.get(&org_id).unwrap();
        assert!(org.is_bootstrapped());
        assert_eq!(org.root_verify_key, Some(keypair.verify_key));
    }

    #[test]
    fn bootstrap_rejects_token_mismatch() {
        let store = Store::new();
        let events = EventBus::new();
        let component = OrganizationComponent {
            store: &store,
            events: &events,
        };
        let org_id = OrganizationId::new("Org1").unwrap();
        let now = Utc::now();
        component
            .create(org_id.clone(), "tok".into(), now)
            .unwrap();

        let keypair = KeyPair::generate();
        let result = component.bootstrap(
            &org_id,
            "wrong-token".into(),
            keypair.verify_key.clone(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            None,
            now,
        );
        assert!(matches!(
            result,
            Err(ParsecCoreError::BootstrapTokenMismatch)
        ));
    }

    #[test]
    fn create_is_idempotent_over_not_yet_bootstrapped() {
        let store = Store::new();
        let events = EventBus::new();
        let component = OrganizationComponent {
            store: &store,
            events: &events,
        };
        let org_id = OrganizationId::new("Org1").unwrap();
        let now = Utc::now();
        component
            .create(org_id.clone(), "tok".into(), now)
            .unwrap();
        component
            .create(org_id.clone(), "new-tok".into(), now)
            .unwrap();
        assert_eq!(component.get(&org_id).unwrap().bootstrap_token, "new-tok");
    }

    #[test]
    fn update_expiring_invalidates_subscribers() {
        let store = Store::new();
        let events = EventBus::new();
        let component = OrganizationComponent {
            store: &store,
            events: &events,
        };
        let org_id = OrganizationId::new("Org1").unwrap();
        component
            .create(org_id.clone(), "tok".into(), Utc::now())
            .unwrap();

        component
            .update(
                &org_id,
                OrganizationUpdate {
                    is_expired: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(component.get(&org_id).unwrap().is_expired);
    }

    #[test]
    fn stats_counts_active_and_revoked_users() {
        let store = Store::new();
        let events = EventBus::new();
        let component = OrganizationComponent {
            store: &store,
            events: &events,
        };
        let org_id = OrganizationId::new("Org1").unwrap();
        let now = Utc::now();
        component
            .create(org_id.clone(), "tok".into(), now)
            .unwrap();
        let state = store.get_org(&org_id).unwrap();
        state.put_user(User {
            user_id: UserId::default_new(),
            human_handle: None,
            current_profile: UserProfile::Standard,
            created_by: None,
            created_on: now,
            revoked_on: None,
            revoked_certificate: None,
            frozen: false,
            profile_updates: Vec::new(),
                tos_accepted_on: None,
            certificate: SignedCertificate {
                author: DeviceId::default_new(),
                timestamp: now,
                raw: Vec::new(),
                redacted_raw: Vec::new(),
                cooked: Certificate::RevokedUserCertificate {
                    user_id: UserId::default_new(),
                },
            },
        });

        let stats = component.stats(&org_id, None).unwrap();
        assert_eq!(stats.users, 1);
        assert_eq!(stats.active_users, 1);
        assert_eq!(stats.revoked_users, 0);
    }
}
