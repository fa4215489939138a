use std::collections::VecDeque;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use parsec_core::constants::{EVENT_RING_BUFFER_SIZE, EVENT_SUBSCRIBER_QUEUE_SIZE};
use parsec_core::types::OrganizationId;

use crate::event::{Event, EventId};

struct OrgChannel {
    sender: broadcast::Sender<Event>,
    ring: Mutex<VecDeque<Event>>,
}

impl OrgChannel {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_SUBSCRIBER_QUEUE_SIZE);
        Self {
            sender,
            ring: Mutex::new(VecDeque::with_capacity(EVENT_RING_BUFFER_SIZE)),
        }
    }
}

/// In-process publish/subscribe broker. One broadcast
/// channel plus one replay ring buffer per organization — no cross-org
/// fan-out is possible because a subscription is always scoped to a single
/// `OrganizationId`.
pub struct EventBus {
    orgs: DashMap<OrganizationId, OrgChannel>,
}

/// Outcome of asking the bus to replay events after a `Last-Event-Id`.
pub enum Replay {
    /// The requested ID (or "subscribe fresh") is within the buffered
    /// window; here are the events published since.
    Found(Vec<Event>),
    /// The requested ID has aged out of the ring buffer — the caller must
    /// emit the `missed_events` marker frame.
    Missed,
}

pub struct Subscription {
    pub receiver: broadcast::Receiver<Event>,
}

/// Mirrors `tokio::sync::broadcast`'s error variants but gives the SSE
/// streamer the vocabulary its state machine expects: a lagged
/// subscriber is disconnected outright rather than silently catching up.
#[derive(Debug)]
pub enum RecvOutcome {
    Event(Event),
    EndOfStream,
}

impl Subscription {
    pub async fn recv(&mut self) -> RecvOutcome {
        match self.receiver.recv().await {
            Ok(event) => RecvOutcome::Event(event),
            Err(_) => RecvOutcome::EndOfStream,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            orgs: DashMap::new(),
        }
    }

    fn channel_for(&self, org: &OrganizationId) -> dashmap::mapref::one::RefMut<'_, OrganizationId, OrgChannel> {
        self.orgs
            .entry(org.clone())
            .or_insert_with(OrgChannel::new)
    }

    /// Publishes `event`, storing it in the organization's ring buffer and
    /// broadcasting it to every subscriber registered at this moment.
    /// Delivery to subscribers registered *after* this call is not
    /// guaranteed.
    pub fn publish(&self, event: Event) {
        let channel = self.channel_for(&event.organization_id);
        {
            let mut ring = channel.ring.lock();
            if ring.len() == EVENT_RING_BUFFER_SIZE {
                ring.pop_front();
            }
            ring.push_back(event.clone());
        }
        // No active subscribers is not an error; the event is still kept
        // for replay.
        let _ = channel.sender.send(event);
    }

    pub fn subscribe(&self, org: &OrganizationId) -> Subscription {
        let channel = self.channel_for(org);
        Subscription {
            receiver: channel.sender.subscribe(),
        }
    }

    /// Replays buffered events published after `last_event_id`, or `None`
    /// (treated the same as "subscribe fresh, no replay needed") if the
    /// caller did not present a `Last-Event-Id` at all.
    pub fn replay_since(&self, org: &OrganizationId, last_event_id: Option<EventId>) -> Replay {
        let Some(last_event_id) = last_event_id else {
            return Replay::Found(Vec::new());
        };
        let channel = self.channel_for(org);
        let ring = channel.ring.lock();
        match ring.iter().position(|e| e.event_id == last_event_id) {
            Some(idx) => Replay::Found(ring.iter().skip(idx + 1).cloned().collect()),
            None => Replay::Missed,
        }
    }

    /// Forces every current subscriber for `org` to observe `EndOfStream` —
    /// used when organization/user state changes invalidate a subscription
    /// (org expired, user revoked/frozen, server stopping).
    pub fn invalidate(&self, org: &OrganizationId) {
        if let Some(mut channel) = self.orgs.get_mut(org) {
            *channel = OrgChannel::new();
        }
    }
}
