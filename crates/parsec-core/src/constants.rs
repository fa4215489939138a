//! Protocol constants for the Parsec request authority.

// ── API negotiation ──────────────────────────────────────────────────────────

/// Highest API major.minor this server speaks. The Auth Pipeline settles on
/// the newest client-offered version sharing this major.
pub const API_VERSION_MAJOR: u32 = 4;
pub const API_VERSION_MINOR: u32 = 2;

// ── Ballpark (timestamp skew tolerance) ──────────────────────────────────────

/// Default allowed skew, in either direction, between a client-supplied
/// timestamp and server-now before a `TimestampOutOfBallpark` outcome fires.
pub const BALLPARK_DEFAULT_OFFSET_SECS: i64 = 5 * 60;

/// Same tolerance, applied to bearer-token timestamps during the handshake
/// (maps to HTTP 498 rather than a typed RPC outcome).
pub const TOKEN_BALLPARK_OFFSET_SECS: i64 = 5 * 60;

// ── Event Bus ─────────────────────────────────────────────────────────────

/// A vlob blob larger than this is omitted from its `VLOB` event; subscribers
/// are expected to re-fetch via `read_versions`.
pub const EVENT_VLOB_MAX_BLOB_SIZE: usize = 4096;

/// Number of most-recent events retained per organization for SSE resume.
pub const EVENT_RING_BUFFER_SIZE: usize = 1024;

/// Bound on a single subscriber's outstanding queue before it is disconnected.
pub const EVENT_SUBSCRIBER_QUEUE_SIZE: usize = 256;

// ── SSE ───────────────────────────────────────────────────────────────────

/// Default keep-alive interval; clients should treat 2x this as dead-link.
pub const SSE_KEEPALIVE_DEFAULT_SECS: u64 = 15;

// ── Wire limits ───────────────────────────────────────────────────────────

/// Hard cap on a decoded RPC request body.
pub const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

// ── Realm / key rotation ─────────────────────────────────────────────────

/// First key-index assigned to a realm's initial key rotation.
pub const FIRST_KEY_INDEX: u32 = 1;

/// First version number assigned to a freshly created vlob.
pub const FIRST_VLOB_VERSION: u32 = 1;
