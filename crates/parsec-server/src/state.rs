//! Shared server state handed to every axum handler:
//! one process-wide `Store` and `EventBus`, plus the handful of knobs that
//! are operational rather than per-organization (the SSE keep-alive
//! interval today).

use std::sync::Arc;
use std::time::Duration;

use parsec_events::EventBus;
use parsec_store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub events: Arc<EventBus>,
    pub sse_keepalive: Duration,
}

impl AppState {
    pub fn new(sse_keepalive: Duration) -> Self {
        Self {
            store: Arc::new(Store::new()),
            events: Arc::new(EventBus::new()),
            sse_keepalive,
        }
    }
}
