//! The Vlob Component: append-only versioned encrypted
//! objects within a realm. Unlike the User/Realm components, a vlob write
//! carries no certificate — the client supplies a bare timestamp — so the
//! ordering gate here compares directly against the realm's own topic
//! watermarks rather than going through the Crypto Verifier.

use std::collections::HashMap;

use parsec_core::constants::{BALLPARK_DEFAULT_OFFSET_SECS, EVENT_VLOB_MAX_BLOB_SIZE, FIRST_VLOB_VERSION};
use parsec_core::error::ParsecCoreError;
use parsec_core::topic::Topic;
use parsec_core::types::{DeviceId, RealmId, RealmRole, SequesterServiceId, Timestamp, UserId, VlobId};
use parsec_core::user::User;
use parsec_core::vlob::{Vlob, VlobVersion};
use parsec_core::Device;
use parsec_crypto::check_ballpark;
use parsec_events::{Event, EventBus, EventPayload};
use parsec_store::OrgState;
use tracing::instrument;

pub struct VlobComponent<'a> {
    pub org: &'a OrgState,
    pub events: &'a EventBus,
}

impl<'a> VlobComponent<'a> {
    #[instrument(skip_all, fields(author = %author_device_id, realm = %realm_id, vlob = %vlob_id))]
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        author_device_id: DeviceId,
        realm_id: RealmId,
        vlob_id: VlobId,
        key_index: u32,
        timestamp: Timestamp,
        blob: Vec<u8>,
        sequester_blob: Option<HashMap<SequesterServiceId, Vec<u8>>>,
        server_now: Timestamp,
    ) -> Result<(), ParsecCoreError> {
        let (_author_device, _author_user) = resolve_author(self.org, author_device_id)?;
        check_ballpark(
            timestamp,
            server_now,
            BALLPARK_DEFAULT_OFFSET_SECS,
            BALLPARK_DEFAULT_OFFSET_SECS,
        )?;

        self.org.with_topic_locks(&[Topic::Realm(realm_id)], || {
            let realm = self
                .org
                .get_realm(realm_id)
                .ok_or_else(|| ParsecCoreError::RealmNotFound(realm_id.to_string()))?;
            if realm.is_expired {
                return Err(ParsecCoreError::RealmExpired);
            }
            let caller_author_user_id = self
                .org
                .get_device(author_device_id)
                .expect("resolved above")
                .user_id;
            let role = realm
                .current_role_of(caller_author_user_id)
                .ok_or(ParsecCoreError::RealmRoleNotAllowed)?;
            if !role.at_least(RealmRole::Contributor) {
                return Err(ParsecCoreError::RealmRoleNotAllowed);
            }
            if self.org.vlob_exists(vlob_id) {
                return Err(ParsecCoreError::VlobIdAlreadyExists);
            }
            let expected_key_index = realm
                .last_key_index()
                .ok_or(ParsecCoreError::BadKeyIndex {
                    last_realm_certificate_timestamp: realm.created_on,
                })?;
            if key_index != expected_key_index {
                return Err(ParsecCoreError::BadKeyIndex {
                    last_realm_certificate_timestamp: realm
                        .last_key_rotation_timestamp()
                        .unwrap_or(realm.created_on),
                });
            }
            check_realm_ordering(self.org, realm_id, timestamp)?;

            let blob_len = blob.len();
            self.org.put_vlob(Vlob {
                vlob_id,
                realm_id,
                versions: vec![VlobVersion {
                    version: FIRST_VLOB_VERSION,
                    author: author_device_id,
                    timestamp,
                    key_index,
                    blob: blob.clone(),
                    sequester_blob,
                }],
            });
            self.org.bump_topic(&Topic::Realm(realm_id), timestamp);

            self.events.publish(Event::new(
                self.org.organization().organization_id,
                EventPayload::Vlob {
                    realm_id,
                    vlob_id,
                    author: author_device_id,
                    version: FIRST_VLOB_VERSION,
                    timestamp,
                    blob: (blob_len <= EVENT_VLOB_MAX_BLOB_SIZE).then_some(blob),
                },
            ));
            Ok(())
        })
    }

    #[instrument(skip_all, fields(author = %author_device_id, vlob = %vlob_id))]
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &self,
        author_device_id: DeviceId,
        vlob_id: VlobId,
        version: u32,
        key_index: u32,
        timestamp: Timestamp,
        blob: Vec<u8>,
        sequester_blob: Option<HashMap<SequesterServiceId, Vec<u8>>>,
        server_now: Timestamp,
    ) -> Result<(), ParsecCoreError> {
        let (_author_device, _author_user) = resolve_author(self.org, author_device_id)?;
        check_ballpark(
            timestamp,
            server_now,
            BALLPARK_DEFAULT_OFFSET_SECS,
            BALLPARK_DEFAULT_OFFSET_SECS,
        )?;

        let existing = self
            .org
            .get_vlob(vlob_id)
            .ok_or_else(|| ParsecCoreError::VlobNotFound(vlob_id.to_string()))?;
        let realm_id = existing.realm_id;

        self.org.with_topic_locks(&[Topic::Realm(realm_id)], || {
            let realm = self
                .org
                .get_realm(realm_id)
                .ok_or_else(|| ParsecCoreError::RealmNotFound(realm_id.to_string()))?;
            if realm.is_expired {
                return Err(ParsecCoreError::RealmExpired);
            }
            let caller_user_id = self
                .org
                .get_device(author_device_id)
                .expect("resolved above")
                .user_id;
            let role = realm
                .current_role_of(caller_user_id)
                .ok_or(ParsecCoreError::RealmRoleNotAllowed)?;
            if !role.at_least(RealmRole::Contributor) {
                return Err(ParsecCoreError::RealmRoleNotAllowed);
            }

            let mut vlob = self
                .org
                .get_vlob(vlob_id)
                .ok_or_else(|| ParsecCoreError::VlobNotFound(vlob_id.to_string()))?;
            if version != vlob.current_version() + 1 {
                return Err(ParsecCoreError::BadVlobVersion);
            }
            let expected_key_index = realm
                .last_key_index()
                .ok_or(ParsecCoreError::BadKeyIndex {
                    last_realm_certificate_timestamp: realm.created_on,
                })?;
            if key_index != expected_key_index {
                return Err(ParsecCoreError::BadKeyIndex {
                    last_realm_certificate_timestamp: realm
                        .last_key_rotation_timestamp()
                        .unwrap_or(realm.created_on),
                });
            }
            check_realm_ordering(self.org, realm_id, timestamp)?;

            let blob_len = blob.len();
            vlob.versions.push(VlobVersion {
                version,
                author: author_device_id,
                timestamp,
                key_index,
                blob: blob.clone(),
                sequester_blob,
            });
            self.org.put_vlob(vlob);
            self.org.bump_topic(&Topic::Realm(realm_id), timestamp);

            self.events.publish(Event::new(
                self.org.organization().organization_id,
                EventPayload::Vlob {
                    realm_id,
                    vlob_id,
                    author: author_device_id,
                    version,
                    timestamp,
                    blob: (blob_len <= EVENT_VLOB_MAX_BLOB_SIZE).then_some(blob),
                },
            ));
            Ok(())
        })
    }

    /// Read-only fan-out over `(vlob_id, version)` pairs, skipping absent
    /// ones. "Current or past READER role" is read as: the
    /// caller must appear in the realm's role history at reader-or-above at
    /// least once, even if later removed.
    pub fn read_versions(
        &self,
        caller_device_id: DeviceId,
        realm_id: RealmId,
        items: Vec<(VlobId, u32)>,
    ) -> Result<VlobReadVersionsOutcome, ParsecCoreError> {
        let (_caller_device, caller_user) = resolve_author(self.org, caller_device_id)?;

        let realm = self
            .org
            .get_realm(realm_id)
            .ok_or_else(|| ParsecCoreError::RealmNotFound(realm_id.to_string()))?;
        let ever_reader = realm.role_history.iter().any(|entry| {
            entry.user_id == caller_user.user_id
                && entry.role.map(|r| r.at_least(RealmRole::Reader)).unwrap_or(false)
        });
        if !ever_reader {
            return Err(ParsecCoreError::RealmRoleNotAllowed);
        }

        let mut results = Vec::new();
        for (vlob_id, version) in items {
            let Some(vlob) = self.org.get_vlob(vlob_id) else {
                continue;
            };
            if vlob.realm_id != realm_id {
                continue;
            }
            let Some(entry) = vlob.get_version(version) else {
                continue;
            };
            results.push(VlobReadEntry {
                vlob_id,
                key_index: entry.key_index,
                author: entry.author,
                version: entry.version,
                created_on: entry.timestamp,
                blob: entry.blob.clone(),
            });
        }

        let needed_common_certificate_timestamp = self
            .org
            .topic_last(&Topic::Common)
            .unwrap_or(realm.created_on);
        let needed_realm_certificate_timestamp = self
            .org
            .topic_last(&Topic::Realm(realm_id))
            .unwrap_or(realm.created_on);

        Ok(VlobReadVersionsOutcome {
            items: results,
            needed_common_certificate_timestamp,
            needed_realm_certificate_timestamp,
        })
    }
}

pub struct VlobReadEntry {
    pub vlob_id: VlobId,
    pub key_index: u32,
    pub author: DeviceId,
    pub version: u32,
    pub created_on: Timestamp,
    pub blob: Vec<u8>,
}

pub struct VlobReadVersionsOutcome {
    pub items: Vec<VlobReadEntry>,
    pub needed_common_certificate_timestamp: Timestamp,
    pub needed_realm_certificate_timestamp: Timestamp,
}

fn resolve_author(
    org: &OrgState,
    author_device_id: DeviceId,
) -> Result<(Device, User), ParsecCoreError> {
    let device = org
        .get_device(author_device_id)
        .ok_or_else(|| ParsecCoreError::DeviceNotFound(author_device_id.to_string()))?;
    let user = org
        .get_user(device.user_id)
        .ok_or_else(|| ParsecCoreError::UserNotFound(device.user_id.to_string()))?;
    if user.is_revoked() {
        return Err(ParsecCoreError::UserRevoked);
    }
    Ok((device, user))
}

/// A vlob write must have a timestamp strictly greater than both the
/// realm's own topic watermark and the organization's `common` watermark —
/// not the organization-wide global maximum across every topic.
fn check_realm_ordering(
    org: &OrgState,
    realm_id: RealmId,
    timestamp: Timestamp,
) -> Result<(), ParsecCoreError> {
    let bound = [
        org.topic_last(&Topic::Common),
        org.topic_last(&Topic::Realm(realm_id)),
    ]
    .into_iter()
    .flatten()
    .max();
    if let Some(last) = bound {
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
    use parsec_core::certificate::{Certificate, SignedCertificate};
    use parsec_core::organization::Organization;
    use parsec_core::realm::{Realm, RealmRoleEntry};
    use parsec_core::types::{
        AccountVaultStrategy, ActiveUsersLimit, ClientAgentPolicy, HumanHandle, OrganizationId,
        UserProfile,
    };
    use parsec_crypto::KeyPair;

    fn org_state() -> OrgState {
        OrgState::new(Organization {
            organization_id: OrganizationId::new("Org1").unwrap(),
            bootstrap_token: "tok".into(),
            created_on: Utc::now(),
            bootstrapped_on: Some(Utc::now()),
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

    fn seed_owner_with_realm(org: &OrgState, now: Timestamp) -> (UserId, DeviceId, RealmId) {
        let keypair = KeyPair::generate();
        let user_id = UserId::default_new();
        let device_id = DeviceId::default_new();
        let signed = SignedCertificate {
            author: device_id,
            timestamp: now,
            raw: Vec::new(),
            redacted_raw: Vec::new(),
            cooked: Certificate::UserCertificate {
                user_id,
                human_handle: Some(HumanHandle {
                    email: "owner@example.com".into(),
                    label: "Owner".into(),
                }),
                public_key: keypair.verify_key.clone(),
                profile: UserProfile::Standard,
            },
        };
        org.put_user(User {
            user_id,
            human_handle: Some(HumanHandle {
                email: "owner@example.com".into(),
                label: "Owner".into(),
            }),
            current_profile: UserProfile::Standard,
            created_by: None,
            created_on: now,
            revoked_on: None,
            revoked_certificate: None,
            frozen: false,
            profile_updates: Vec::new(),
            tos_accepted_on: None,
            certificate: signed.clone(),
        });
        org.put_device(Device {
            device_id,
            user_id,
            device_label: None,
            verify_key: keypair.verify_key.clone(),
            created_by: None,
            created_on: now,
            certificate: signed.clone(),
        });

        let realm_id = RealmId::default_new();
        org.put_realm(Realm {
            realm_id,
            created_on: now,
            role_history: vec![RealmRoleEntry {
                user_id,
                role: Some(RealmRole::Owner),
                timestamp: now,
                certificate: signed,
            }],
            key_rotations: Vec::new(),
            renames: Vec::new(),
            is_expired: false,
        });
        org.bump_topic(&Topic::Common, now);
        org.bump_topic(&Topic::Realm(realm_id), now);
        (user_id, device_id, realm_id)
    }

    #[test]
    fn create_rejects_key_index_without_rotation() {
        let org = org_state();
        let events = EventBus::new();
        let now = Utc::now();
        let (_, device_id, realm_id) = seed_owner_with_realm(&org, now);

        let component = VlobComponent {
            org: &org,
            events: &events,
        };
        let later = now + chrono::Duration::seconds(10);
        let result = component.create(
            device_id,
            realm_id,
            VlobId::default_new(),
            1,
            later,
            b"ciphertext".to_vec(),
            None,
            later,
        );
        assert!(matches!(result, Err(ParsecCoreError::BadKeyIndex { .. })));
    }

    #[test]
    fn update_requires_contiguous_version() {
        let org = org_state();
        let events = EventBus::new();
        let now = Utc::now();
        let (user_id, device_id, realm_id) = seed_owner_with_realm(&org, now);

        org.put_realm({
            let mut realm = org.get_realm(realm_id).unwrap();
            realm.key_rotations.push(parsec_core::realm::KeyRotation {
                key_index: 1,
                encryption_algorithm: "xsalsa20poly1305".into(),
                hash_algorithm: "blake2b".into(),
                key_canary: vec![0],
                timestamp: now,
                certificate: realm.role_history[0].certificate.clone(),
            });
            realm
        });
        let _ = user_id;

        let component = VlobComponent {
            org: &org,
            events: &events,
        };
        let vlob_id = VlobId::default_new();
        let t1 = now + chrono::Duration::seconds(10);
        component
            .create(device_id, realm_id, vlob_id, 1, t1, b"v1".to_vec(), None, t1)
            .unwrap();

        let t2 = t1 + chrono::Duration::seconds(10);
        let result = component.update(
            device_id,
            vlob_id,
            3,
            1,
            t2,
            b"v3".to_vec(),
            None,
            t2,
        );
        assert!(matches!(result, Err(ParsecCoreError::BadVlobVersion)));
    }
}
