//! The Realm Component: shared-access realms, their role
//! grants, key rotations, and renames. Follows the same resolve-author →
//! verify-certificate → check-preconditions → ordering-gate → commit shape
//! as `parsec-user`, scoped to a realm's own topic lock instead of `common`.

use std::collections::HashMap;

use parsec_codec::DecodedCertificate;
use parsec_core::certificate::Certificate;
use parsec_core::constants::{BALLPARK_DEFAULT_OFFSET_SECS, FIRST_KEY_INDEX};
use parsec_core::error::ParsecCoreError;
use parsec_core::realm::{KeyRotation, Realm, RealmRename, RealmRoleEntry};
use parsec_core::topic::Topic;
use parsec_core::types::{DeviceId, RealmId, RealmRole, Timestamp, UserId, UserProfile, VerifyKey};
use parsec_core::user::User;
use parsec_core::{Device, SignedCertificate};
use parsec_crypto::{split_signed_envelope, verify_certificate};
use parsec_events::{Event, EventBus, EventPayload};
use parsec_store::OrgState;
use tracing::instrument;

pub struct RealmComponent<'a> {
    pub org: &'a OrgState,
    pub events: &'a EventBus,
}

impl<'a> RealmComponent<'a> {
    #[instrument(skip_all, fields(author = %author_device_id))]
    pub fn create_realm(
        &self,
        author_device_id: DeviceId,
        realm_role_certificate: Vec<u8>,
        server_now: Timestamp,
    ) -> Result<(), ParsecCoreError> {
        let (author_device, _author_user) = resolve_author(self.org, author_device_id)?;

        let signed_cert = cook_certificate(
            realm_role_certificate,
            author_device_id,
            &author_device.verify_key,
            server_now,
        )?;
        let (realm_id, user_id, role) = match &signed_cert.cooked {
            Certificate::RealmRoleCertificate {
                realm_id,
                user_id,
                role,
            } => (*realm_id, *user_id, *role),
            _ => {
                return Err(ParsecCoreError::InvalidCertificate(
                    "expected a realm-role certificate".into(),
                ))
            }
        };
        if user_id != author_device.user_id {
            return Err(ParsecCoreError::InvalidCertificate(
                "realm creation must grant OWNER to its own author".into(),
            ));
        }
        if role != Some(RealmRole::Owner) {
            return Err(ParsecCoreError::InvalidCertificate(
                "a realm's first role entry must be OWNER".into(),
            ));
        }
        let timestamp = signed_cert.timestamp;

        self.org.with_topic_locks(&[Topic::Realm(realm_id)], || {
            if self.org.realm_exists(realm_id) {
                return Err(ParsecCoreError::InvalidCertificate(
                    "realm ID already exists".into(),
                ));
            }
            check_ordering(self.org, timestamp)?;

            self.org.put_realm(Realm {
                realm_id,
                created_on: timestamp,
                role_history: vec![RealmRoleEntry {
                    user_id,
                    role,
                    timestamp,
                    certificate: signed_cert,
                }],
                key_rotations: Vec::new(),
                renames: Vec::new(),
                is_expired: false,
            });
            self.org.bump_topic(&Topic::Realm(realm_id), timestamp);

            self.events.publish(Event::new(
                self.org.organization().organization_id,
                EventPayload::RealmCertificate { realm_id, timestamp },
            ));
            Ok(())
        })
    }

    #[instrument(skip_all, fields(author = %author_device_id))]
    pub fn share(
        &self,
        author_device_id: DeviceId,
        realm_role_certificate: Vec<u8>,
        recipient_keys_bundle_access: Vec<u8>,
        server_now: Timestamp,
    ) -> Result<(), ParsecCoreError> {
        let (author_device, _author_user) = resolve_author(self.org, author_device_id)?;

        let signed_cert = cook_certificate(
            realm_role_certificate,
            author_device_id,
            &author_device.verify_key,
            server_now,
        )?;
        let (realm_id, target_user_id, new_role) = match &signed_cert.cooked {
            Certificate::RealmRoleCertificate {
                realm_id,
                user_id,
                role,
            } => (*realm_id, *user_id, *role),
            _ => {
                return Err(ParsecCoreError::InvalidCertificate(
                    "expected a realm-role certificate".into(),
                ))
            }
        };
        let timestamp = signed_cert.timestamp;

        self.org.with_topic_locks(&[Topic::Realm(realm_id)], || {
            let mut realm = self
                .org
                .get_realm(realm_id)
                .ok_or_else(|| ParsecCoreError::RealmNotFound(realm_id.to_string()))?;
            if realm.is_expired {
                return Err(ParsecCoreError::RealmExpired);
            }
            let author_role = realm
                .current_role_of(author_device.user_id)
                .ok_or(ParsecCoreError::RealmRoleNotAllowed)?;
            if !author_role.at_least(required_author_role_for(new_role)) {
                return Err(ParsecCoreError::RealmRoleNotAllowed);
            }

            let target = self
                .org
                .get_user(target_user_id)
                .ok_or_else(|| ParsecCoreError::UserNotFound(target_user_id.to_string()))?;
            if target.is_revoked() {
                return Err(ParsecCoreError::UserRevoked);
            }
            if target.current_profile == UserProfile::Outsider
                && matches!(new_role, Some(RealmRole::Owner) | Some(RealmRole::Manager))
            {
                return Err(ParsecCoreError::OutsiderRoleRestriction);
            }
            if new_role.is_some() && recipient_keys_bundle_access.is_empty() {
                return Err(ParsecCoreError::InvalidKeysBundle(
                    "recipient keys bundle access must not be empty when granting a role".into(),
                ));
            }
            check_ordering(self.org, timestamp)?;

            realm.role_history.push(RealmRoleEntry {
                user_id: target_user_id,
                role: new_role,
                timestamp,
                certificate: signed_cert,
            });
            self.org.put_realm(realm);
            self.org.bump_topic(&Topic::Realm(realm_id), timestamp);

            self.events.publish(Event::new(
                self.org.organization().organization_id,
                EventPayload::RealmCertificate { realm_id, timestamp },
            ));
            Ok(())
        })
    }

    #[instrument(skip_all, fields(author = %author_device_id))]
    pub fn rotate_key(
        &self,
        author_device_id: DeviceId,
        realm_key_rotation_certificate: Vec<u8>,
        per_participant_keys_bundle_access: HashMap<UserId, Vec<u8>>,
        server_now: Timestamp,
    ) -> Result<(), ParsecCoreError> {
        let (author_device, _author_user) = resolve_author(self.org, author_device_id)?;

        let signed_cert = cook_certificate(
            realm_key_rotation_certificate,
            author_device_id,
            &author_device.verify_key,
            server_now,
        )?;
        let (realm_id, key_index) = match &signed_cert.cooked {
            Certificate::RealmKeyRotationCertificate {
                realm_id, key_index, ..
            } => (*realm_id, *key_index),
            _ => {
                return Err(ParsecCoreError::InvalidCertificate(
                    "expected a realm-key-rotation certificate".into(),
                ))
            }
        };
        let timestamp = signed_cert.timestamp;

        self.org.with_topic_locks(&[Topic::Realm(realm_id)], || {
            let mut realm = self
                .org
                .get_realm(realm_id)
                .ok_or_else(|| ParsecCoreError::RealmNotFound(realm_id.to_string()))?;
            if realm.is_expired {
                return Err(ParsecCoreError::RealmExpired);
            }
            let author_role = realm
                .current_role_of(author_device.user_id)
                .ok_or(ParsecCoreError::RealmRoleNotAllowed)?;
            if !author_role.at_least(RealmRole::Owner) {
                return Err(ParsecCoreError::RealmRoleNotAllowed);
            }

            let expected_index = realm.last_key_index().map_or(FIRST_KEY_INDEX, |i| i + 1);
            if key_index != expected_index {
                let last_ts = realm
                    .last_key_rotation_timestamp()
                    .unwrap_or(realm.created_on);
                return Err(ParsecCoreError::BadKeyIndex {
                    last_realm_certificate_timestamp: last_ts,
                });
            }

            let current_participants: Vec<UserId> = realm
                .current_roles()
                .into_iter()
                .filter_map(|(user_id, _role)| {
                    let still_active = self
                        .org
                        .get_user(user_id)
                        .map(|u| !u.is_revoked())
                        .unwrap_or(false);
                    still_active.then_some(user_id)
                })
                .collect();
            let missing = current_participants
                .iter()
                .any(|user_id| !per_participant_keys_bundle_access.contains_key(user_id));
            if missing {
                return Err(ParsecCoreError::KeysBundleCoverageIncomplete);
            }
            check_ordering(self.org, timestamp)?;

            let (encryption_algorithm, hash_algorithm, key_canary) = match &signed_cert.cooked {
                Certificate::RealmKeyRotationCertificate {
                    encryption_algorithm,
                    hash_algorithm,
                    key_canary,
                    ..
                } => (
                    encryption_algorithm.clone(),
                    hash_algorithm.clone(),
                    key_canary.clone(),
                ),
                _ => unreachable!("matched above"),
            };
            realm.key_rotations.push(KeyRotation {
                key_index,
                encryption_algorithm,
                hash_algorithm,
                key_canary,
                timestamp,
                certificate: signed_cert,
            });
            self.org.put_realm(realm);
            self.org.bump_topic(&Topic::Realm(realm_id), timestamp);

            self.events.publish(Event::new(
                self.org.organization().organization_id,
                EventPayload::RealmCertificate { realm_id, timestamp },
            ));
            Ok(())
        })
    }

    #[instrument(skip_all, fields(author = %author_device_id))]
    pub fn rename(
        &self,
        author_device_id: DeviceId,
        realm_name_certificate: Vec<u8>,
        server_now: Timestamp,
    ) -> Result<(), ParsecCoreError> {
        let (author_device, _author_user) = resolve_author(self.org, author_device_id)?;

        let signed_cert = cook_certificate(
            realm_name_certificate,
            author_device_id,
            &author_device.verify_key,
            server_now,
        )?;
        let (realm_id, encrypted_name) = match &signed_cert.cooked {
            Certificate::RealmNameCertificate {
                realm_id,
                encrypted_name,
            } => (*realm_id, encrypted_name.clone()),
            _ => {
                return Err(ParsecCoreError::InvalidCertificate(
                    "expected a realm-name certificate".into(),
                ))
            }
        };
        if encrypted_name.is_empty() {
            return Err(ParsecCoreError::InvalidEncryptedRealmName);
        }
        let timestamp = signed_cert.timestamp;

        self.org.with_topic_locks(&[Topic::Realm(realm_id)], || {
            let mut realm = self
                .org
                .get_realm(realm_id)
                .ok_or_else(|| ParsecCoreError::RealmNotFound(realm_id.to_string()))?;
            if realm.is_expired {
                return Err(ParsecCoreError::RealmExpired);
            }
            let author_role = realm
                .current_role_of(author_device.user_id)
                .ok_or(ParsecCoreError::RealmRoleNotAllowed)?;
            if !author_role.at_least(RealmRole::Owner) {
                return Err(ParsecCoreError::RealmRoleNotAllowed);
            }
            check_ordering(self.org, timestamp)?;

            realm.renames.push(RealmRename {
                encrypted_name,
                timestamp,
                certificate: signed_cert,
            });
            self.org.put_realm(realm);
            self.org.bump_topic(&Topic::Realm(realm_id), timestamp);

            self.events.publish(Event::new(
                self.org.organization().organization_id,
                EventPayload::RealmCertificate { realm_id, timestamp },
            ));
            Ok(())
        })
    }
}

/// The minimum current role a `share` caller must hold to grant/change a
/// target's role to `new_role`: OWNER is required to create peer OWNERs or
/// MANAGERs, MANAGER suffices for CONTRIBUTOR/READER grants and revocations.
fn required_author_role_for(new_role: Option<RealmRole>) -> RealmRole {
    match new_role {
        Some(RealmRole::Owner) | Some(RealmRole::Manager) => RealmRole::Owner,
        Some(RealmRole::Contributor) | Some(RealmRole::Reader) | None => RealmRole::Manager,
    }
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

/// All Realm Component certificates carry no personal data, so the raw
/// envelope stands in as its own redacted twin (mirrors
/// `parsec_user::cook_certificate_no_redaction`).
fn cook_certificate(
    raw: Vec<u8>,
    expected_author: DeviceId,
    author_verify_key: &VerifyKey,
    server_now: Timestamp,
) -> Result<SignedCertificate, ParsecCoreError> {
    let (_, payload) = split_signed_envelope(&raw)?;
    let decoded: DecodedCertificate = parsec_codec::decode_certificate_payload(payload)
        .map_err(|e| ParsecCoreError::InvalidCertificate(e.to_string()))?;
    verify_certificate(
        raw.clone(),
        raw,
        decoded.certificate,
        decoded.author,
        decoded.timestamp,
        expected_author,
        author_verify_key,
        server_now,
        BALLPARK_DEFAULT_OFFSET_SECS,
        BALLPARK_DEFAULT_OFFSET_SECS,
    )
}

fn check_ordering(org: &OrgState, timestamp: Timestamp) -> Result<(), ParsecCoreError> {
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
    use parsec_core::organization::Organization;
    use parsec_core::types::{
        AccountVaultStrategy, ActiveUsersLimit, ClientAgentPolicy, HumanHandle, OrganizationId,
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

    fn envelope(keypair: &KeyPair, payload: &[u8]) -> Vec<u8> {
        let sig = keypair.sign(payload);
        let mut raw = sig.0;
        raw.extend_from_slice(payload);
        raw
    }

    fn seed_user(org: &OrgState, keypair: &KeyPair, now: Timestamp, email: &str) -> (UserId, DeviceId) {
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
                    email: email.into(),
                    label: "User".into(),
                }),
                public_key: keypair.verify_key.clone(),
                profile: UserProfile::Standard,
            },
        };
        org.put_user(User {
            user_id,
            human_handle: Some(HumanHandle {
                email: email.into(),
                label: "User".into(),
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
            certificate: signed,
        });
        (user_id, device_id)
    }

    #[test]
    fn create_realm_sets_owner_role() {
        let org = org_state();
        let events = EventBus::new();
        let keypair = KeyPair::generate();
        let now = Utc::now();
        let (user_id, device_id) = seed_user(&org, &keypair, now, "owner@example.com");
        org.bump_topic(&Topic::Common, now);

        let component = RealmComponent {
            org: &org,
            events: &events,
        };
        let realm_id = RealmId::default_new();
        let later = now + chrono::Duration::seconds(10);
        let payload = parsec_codec::encode_certificate_payload(
            device_id,
            later,
            &Certificate::RealmRoleCertificate {
                realm_id,
                user_id,
                role: Some(RealmRole::Owner),
            },
        )
        .unwrap();
        let raw = envelope(&keypair, &payload);

        component
            .create_realm(device_id, raw, later)
            .unwrap();
        let realm = org.get_realm(realm_id).unwrap();
        assert_eq!(realm.current_role_of(user_id), Some(RealmRole::Owner));
    }

    #[test]
    fn rotate_key_rejects_non_monotonic_index() {
        let org = org_state();
        let events = EventBus::new();
        let keypair = KeyPair::generate();
        let now = Utc::now();
        let (user_id, device_id) = seed_user(&org, &keypair, now, "owner2@example.com");
        org.bump_topic(&Topic::Common, now);

        let component = RealmComponent {
            org: &org,
            events: &events,
        };
        let realm_id = RealmId::default_new();
        let t1 = now + chrono::Duration::seconds(10);
        let create_payload = parsec_codec::encode_certificate_payload(
            device_id,
            t1,
            &Certificate::RealmRoleCertificate {
                realm_id,
                user_id,
                role: Some(RealmRole::Owner),
            },
        )
        .unwrap();
        component
            .create_realm(device_id, envelope(&keypair, &create_payload), t1)
            .unwrap();

        let t2 = t1 + chrono::Duration::seconds(10);
        let rotation_payload = parsec_codec::encode_certificate_payload(
            device_id,
            t2,
            &Certificate::RealmKeyRotationCertificate {
                realm_id,
                key_index: 2,
                encryption_algorithm: "xsalsa20poly1305".into(),
                hash_algorithm: "blake2b".into(),
                key_canary: vec![1, 2, 3],
            },
        )
        .unwrap();
        let mut bundle = HashMap::new();
        bundle.insert(user_id, vec![9u8]);

        let result = component.rotate_key(
            device_id,
            envelope(&keypair, &rotation_payload),
            bundle,
            t2,
        );
        assert!(matches!(result, Err(ParsecCoreError::BadKeyIndex { .. })));
    }
}
