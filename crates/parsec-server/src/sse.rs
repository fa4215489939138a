//! The SSE Streamer: one long-lived `GET
//! /authenticated/{org}/events` response per client, replaying buffered
//! events after `Last-Event-Id`, opening with the current
//! `ORGANIZATION_CONFIG` snapshot, then alternating between bus events and a
//! keep-alive tick until `EndOfStream` or peer disconnect.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, Stream, StreamExt};

use parsec_core::types::OrganizationId;
use parsec_events::{Event, EventId, EventPayload, Replay};
use parsec_rpc::SettledApiVersion;

use crate::state::AppState;

fn frame(event_id: Option<EventId>, event_name: &str, data: &str) -> Bytes {
    let mut out = String::new();
    if let Some(id) = event_id {
        out.push_str("id:");
        out.push_str(&id.hex());
        out.push('\n');
    }
    out.push_str("event:");
    out.push_str(event_name);
    out.push_str("\ndata:");
    out.push_str(data);
    out.push_str("\n\n");
    Bytes::from(out)
}

fn event_frame(event: &Event) -> Bytes {
    let data = serde_json::to_string(&event.payload).unwrap_or_default();
    frame(Some(event.event_id), event.sse_event_name(), &data)
}

fn missed_events_frame() -> Bytes {
    Bytes::from_static(b"event:missed_events\ndata:\n\n")
}

fn keepalive_frame() -> Bytes {
    Bytes::from_static(b"event:keepalive\ndata:\n\n")
}

fn organization_config_frame(app: &AppState, organization_id: &OrganizationId) -> Bytes {
    let organization = app
        .store
        .get_org(organization_id)
        .map(|org| org.organization());
    let (is_expired, active_users_limit, tos_per_locale_urls) = match organization {
        Some(org) => (
            org.is_expired,
            match org.active_users_limit {
                parsec_core::types::ActiveUsersLimit::Unbounded => None,
                parsec_core::types::ActiveUsersLimit::Limited(n) => Some(n),
            },
            org.tos.map(|tos| tos.per_locale_urls),
        ),
        None => (false, None, None),
    };
    let event = Event::new(
        organization_id.clone(),
        EventPayload::OrganizationConfig {
            is_expired,
            active_users_limit,
            tos_per_locale_urls,
        },
    );
    event_frame(&event)
}

/// The non-live part of step 1-2: an optional replay (or `missed_events`
/// marker) followed by the connect-time `ORGANIZATION_CONFIG` snapshot.
/// Split out from `stream_response` so it can be tested without driving the
/// unbounded keep-alive/event loop that follows it.
fn initial_frames(
    app: &AppState,
    organization_id: &OrganizationId,
    last_event_id: Option<EventId>,
) -> Vec<Bytes> {
    let mut initial = Vec::new();
    if last_event_id.is_some() {
        match app.events.replay_since(organization_id, last_event_id) {
            Replay::Found(events) => {
                for event in &events {
                    initial.push(event_frame(event));
                }
            }
            Replay::Missed => initial.push(missed_events_frame()),
        }
    }
    initial.push(organization_config_frame(app, organization_id));
    initial
}

/// Builds the full response for an already-authenticated SSE request:
/// initial frames (replay or `missed_events`, then `ORGANIZATION_CONFIG`)
/// chained onto the live keep-alive/event loop.
pub fn stream_response(
    app: AppState,
    version: SettledApiVersion,
    organization_id: OrganizationId,
    last_event_id: Option<EventId>,
) -> Response {
    let initial = initial_frames(&app, &organization_id, last_event_id);

    let subscription = app.events.subscribe(&organization_id);
    let keepalive = app.sse_keepalive;
    let live = live_stream(subscription, keepalive);
    let body_stream = stream::iter(initial.into_iter().map(Ok::<_, std::io::Error>)).chain(live);

    Response::builder()
        .status(StatusCode::OK)
        .header("Api-Version", version.header_value())
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body_stream))
        .unwrap()
        .into_response()
}

/// The steady-state loop: await either a bus event or the keep-alive tick;
/// stop on `EndOfStream` (user frozen/revoked, org expired, bus torn down).
fn live_stream(
    subscription: parsec_events::Subscription,
    keepalive: Duration,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
    let start = tokio::time::Instant::now() + keepalive;
    let interval = tokio::time::interval_at(start, keepalive);
    stream::unfold(Some((subscription, interval)), move |state| async move {
        let (mut sub, mut interval) = state?;
        tokio::select! {
            _ = interval.tick() => {
                Some((Ok(keepalive_frame()), Some((sub, interval))))
            }
            outcome = sub.recv() => {
                match outcome {
                    parsec_events::RecvOutcome::Event(event) => {
                        Some((Ok(event_frame(&event)), Some((sub, interval))))
                    }
                    parsec_events::RecvOutcome::EndOfStream => None,
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parsec_core::constants::EVENT_RING_BUFFER_SIZE;

    fn app() -> AppState {
        AppState::new(Duration::from_secs(15))
    }

    fn org() -> OrganizationId {
        OrganizationId::new("Org1").unwrap()
    }

    /// S6: a `Last-Event-Id` old enough to have fallen out of the ring
    /// buffer yields `missed_events` as the first frame, not a replay.
    #[test]
    fn aged_out_last_event_id_yields_missed_events_frame() {
        let app = app();
        let org_id = org();
        let stale_id = EventId::new();
        for i in 0..(EVENT_RING_BUFFER_SIZE + 1) {
            app.events.publish(Event::new(
                org_id.clone(),
                EventPayload::Pinged {
                    ping: i.to_string(),
                },
            ));
        }

        let frames = initial_frames(&app, &org_id, Some(stale_id));
        assert_eq!(frames[0], missed_events_frame());
    }

    /// S5 (first frame): connecting fresh (no `Last-Event-Id`) skips replay
    /// entirely and opens with `ORGANIZATION_CONFIG`.
    #[test]
    fn fresh_connect_opens_with_organization_config_frame() {
        let app = app();
        let org_id = org();
        let frames = initial_frames(&app, &org_id, None);
        assert_eq!(frames.len(), 1);
        let text = String::from_utf8(frames[0].to_vec()).unwrap();
        assert!(text.starts_with("event:organization_config\n"));
    }

    /// A `Last-Event-Id` still within the buffered window replays the
    /// events published after it instead of reporting a miss.
    #[test]
    fn known_last_event_id_replays_subsequent_events() {
        let app = app();
        let org_id = org();
        let first = Event::new(org_id.clone(), EventPayload::Pinged { ping: "a".into() });
        let first_id = first.event_id;
        app.events.publish(first);
        app.events.publish(Event::new(
            org_id.clone(),
            EventPayload::Pinged { ping: "b".into() },
        ));

        let frames = initial_frames(&app, &org_id, Some(first_id));
        // One replayed event, then the organization_config frame.
        assert_eq!(frames.len(), 2);
        assert_ne!(frames[0], missed_events_frame());
        let config_text = String::from_utf8(frames[1].to_vec()).unwrap();
        assert!(config_text.starts_with("event:organization_config\n"));
    }
}
