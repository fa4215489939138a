//! parsec-rpc
//!
//! The Auth Pipeline, client-context vocabulary, and RPC Dispatcher
//!: everything that sits between a decoded HTTP
//! request and a typed component call. `parsec-server` is the thin binary
//! that wires axum routing onto the functions exported here.

pub mod auth;
pub mod context;
pub mod dispatcher;

pub use auth::{
    anonymous_context, authenticate, authenticate_sse, build_device_token, invited_context,
    negotiate_api_version, resolve_organization, supported_api_versions_header, AuthError,
    SettledApiVersion,
};
pub use context::ClientContext;
pub use dispatcher::{dispatch_anonymous, dispatch_authenticated, dispatch_invited};
