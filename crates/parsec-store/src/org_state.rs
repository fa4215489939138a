//! Per-organization state tree: one map per entity kind, keyed by that
//! entity's stable identifier, nested under each `OrganizationId` rather
//! than sharing a single global keyspace.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use parsec_core::invitation::Invitation;
use parsec_core::organization::Organization;
use parsec_core::realm::Realm;
use parsec_core::topic::{Topic, TopicWatermarks};
use parsec_core::types::{DeviceId, InvitationToken, RealmId, Timestamp, UserId, VlobId};
use parsec_core::user::User;
use parsec_core::vlob::Vlob;
use parsec_core::Device;

/// All state belonging to one organization. Every field is independently
/// concurrent-safe (`DashMap` entries, or a dedicated `RwLock`); the only
/// cross-entity serialization is the per-topic lock chain in `locks.rs`.
pub struct OrgState {
    pub(crate) organization: RwLock<Organization>,
    pub(crate) common_lock: RwLock<()>,
    pub(crate) sequester_lock: RwLock<()>,
    pub(crate) shamir_lock: RwLock<()>,
    pub(crate) realm_locks: DashMap<RealmId, Arc<RwLock<()>>>,

    users: DashMap<UserId, User>,
    devices: DashMap<DeviceId, Device>,
    /// Active (non-revoked) human-handle email -> owning user, enforcing
    /// pairwise-distinct active emails without a linear scan per create.
    active_emails: DashMap<String, UserId>,
    realms: DashMap<RealmId, Realm>,
    vlobs: DashMap<VlobId, Vlob>,
    invitations: DashMap<InvitationToken, Invitation>,
    topics: RwLock<TopicWatermarks>,
}

impl OrgState {
    pub fn new(organization: Organization) -> Self {
        Self {
            organization: RwLock::new(organization),
            common_lock: RwLock::new(()),
            sequester_lock: RwLock::new(()),
            shamir_lock: RwLock::new(()),
            realm_locks: DashMap::new(),
            users: DashMap::new(),
            devices: DashMap::new(),
            active_emails: DashMap::new(),
            realms: DashMap::new(),
            vlobs: DashMap::new(),
            invitations: DashMap::new(),
            topics: RwLock::new(TopicWatermarks::default()),
        }
    }

    // ── Organization ──────────────────────────────────────────────────────

    pub fn organization(&self) -> Organization {
        self.organization.read().clone()
    }

    pub fn with_organization_mut<R>(&self, f: impl FnOnce(&mut Organization) -> R) -> R {
        f(&mut self.organization.write())
    }

    // ── Users ─────────────────────────────────────────────────────────────

    pub fn get_user(&self, id: UserId) -> Option<User> {
        self.users.get(&id).map(|u| u.clone())
    }

    pub fn user_exists(&self, id: UserId) -> bool {
        self.users.contains_key(&id)
    }

    pub fn put_user(&self, user: User) {
        if let Some(handle) = &user.human_handle {
            if user.is_revoked() {
                self.active_emails.remove(&handle.email);
            } else {
                self.active_emails.insert(handle.email.clone(), user.user_id);
            }
        }
        self.users.insert(user.user_id, user);
    }

    /// The active user currently holding `email`, if any — used to enforce
    /// that active users' emails are pairwise distinct.
    pub fn active_user_for_email(&self, email: &str) -> Option<UserId> {
        self.active_emails.get(email).map(|r| *r)
    }

    pub fn all_users(&self) -> Vec<User> {
        self.users.iter().map(|u| u.clone()).collect()
    }

    // ── Devices ───────────────────────────────────────────────────────────

    pub fn get_device(&self, id: DeviceId) -> Option<Device> {
        self.devices.get(&id).map(|d| d.clone())
    }

    pub fn device_exists(&self, id: DeviceId) -> bool {
        self.devices.contains_key(&id)
    }

    pub fn put_device(&self, device: Device) {
        self.devices.insert(device.device_id, device);
    }

    pub fn devices_of(&self, user_id: UserId) -> Vec<Device> {
        self.devices
            .iter()
            .filter(|d| d.user_id == user_id)
            .map(|d| d.clone())
            .collect()
    }

    pub fn all_devices(&self) -> Vec<Device> {
        self.devices.iter().map(|d| d.clone()).collect()
    }

    // ── Realms ────────────────────────────────────────────────────────────

    pub fn get_realm(&self, id: RealmId) -> Option<Realm> {
        self.realms.get(&id).map(|r| r.clone())
    }

    pub fn realm_exists(&self, id: RealmId) -> bool {
        self.realms.contains_key(&id)
    }

    pub fn put_realm(&self, realm: Realm) {
        self.realms.insert(realm.realm_id, realm);
    }

    pub fn all_realms(&self) -> Vec<Realm> {
        self.realms.iter().map(|r| r.clone()).collect()
    }

    /// Realms the user currently or formerly held any role in — used by
    /// `get_certificates_as_user`'s per-realm certificate fan-out.
    pub fn realms_with_participant(&self, user_id: UserId) -> Vec<Realm> {
        self.realms
            .iter()
            .filter(|r| r.ever_participated(user_id))
            .map(|r| r.clone())
            .collect()
    }

    // ── Vlobs ─────────────────────────────────────────────────────────────

    pub fn get_vlob(&self, id: VlobId) -> Option<Vlob> {
        self.vlobs.get(&id).map(|v| v.clone())
    }

    pub fn vlob_exists(&self, id: VlobId) -> bool {
        self.vlobs.contains_key(&id)
    }

    pub fn put_vlob(&self, vlob: Vlob) {
        self.vlobs.insert(vlob.vlob_id, vlob);
    }

    pub fn vlobs_in_realm(&self, realm_id: RealmId) -> Vec<Vlob> {
        self.vlobs
            .iter()
            .filter(|v| v.realm_id == realm_id)
            .map(|v| v.clone())
            .collect()
    }

    // ── Invitations ───────────────────────────────────────────────────────

    pub fn get_invitation(&self, token: InvitationToken) -> Option<Invitation> {
        self.invitations.get(&token).map(|i| i.clone())
    }

    pub fn put_invitation(&self, invitation: Invitation) {
        self.invitations.insert(invitation.token, invitation);
    }

    pub fn remove_invitation(&self, token: InvitationToken) {
        self.invitations.remove(&token);
    }

    pub fn all_invitations(&self) -> Vec<Invitation> {
        self.invitations.iter().map(|i| i.clone()).collect()
    }

    // ── Topic watermarks ──────────────────────────────────────────────────

    pub fn topic_last(&self, topic: &Topic) -> Option<Timestamp> {
        self.topics.read().get(topic)
    }

    pub fn global_last_timestamp(&self) -> Option<Timestamp> {
        self.topics.read().global_last()
    }

    /// Records `ts` as the new watermark for `topic`. Callers must already
    /// hold the matching topic's write lock (via `with_topic_locks`) and
    /// have validated `ts > global_last_timestamp()` beforehand.
    pub fn bump_topic(&self, topic: &Topic, ts: Timestamp) {
        self.topics.write().bump(topic, ts);
    }
}
