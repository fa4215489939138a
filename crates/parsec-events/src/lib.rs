pub mod bus;
pub mod event;

pub use bus::{EventBus, RecvOutcome, Replay, Subscription};
pub use event::{Event, EventId, EventPayload};

#[cfg(test)]
mod tests {
    use super::*;
    use parsec_core::types::OrganizationId;

    fn org() -> OrganizationId {
        OrganizationId::new("TestOrg").unwrap()
    }

    fn config_event() -> EventPayload {
        EventPayload::OrganizationConfig {
            is_expired: false,
            active_users_limit: None,
            tos_per_locale_urls: None,
        }
    }

    #[tokio::test]
    async fn publish_delivers_to_registered_subscriber() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(&org());
        bus.publish(Event::new(org(), EventPayload::Pinged { ping: "hi".into() }));
        match sub.recv().await {
            RecvOutcome::Event(e) => assert_eq!(e.sse_event_name(), "pinged"),
            RecvOutcome::EndOfStream => panic!("expected event"),
        }
    }

    #[test]
    fn replay_without_last_event_id_is_empty() {
        let bus = EventBus::new();
        bus.publish(Event::new(org(), config_event()));
        match bus.replay_since(&org(), None) {
            Replay::Found(events) => assert!(events.is_empty()),
            Replay::Missed => panic!("fresh subscribe should never report missed"),
        }
    }

    #[test]
    fn replay_after_known_id_returns_subsequent_events() {
        let bus = EventBus::new();
        let first = Event::new(org(), config_event());
        let first_id = first.event_id;
        bus.publish(first);
        bus.publish(Event::new(org(), EventPayload::Pinged { ping: "a".into() }));
        match bus.replay_since(&org(), Some(first_id)) {
            Replay::Found(events) => assert_eq!(events.len(), 1),
            Replay::Missed => panic!("id is buffered"),
        }
    }

    #[test]
    fn replay_after_unknown_id_is_missed() {
        let bus = EventBus::new();
        bus.publish(Event::new(org(), config_event()));
        match bus.replay_since(&org(), Some(EventId::new())) {
            Replay::Missed => {}
            Replay::Found(_) => panic!("unknown id should report missed"),
        }
    }

    #[tokio::test]
    async fn invalidate_ends_existing_subscriptions() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(&org());
        bus.invalidate(&org());
        match sub.recv().await {
            RecvOutcome::EndOfStream => {}
            RecvOutcome::Event(_) => panic!("expected end of stream"),
        }
    }
}
