//! Axum handlers for the anonymous/invited/authenticated/SSE routes, one per
//! client scope. Each handler runs the matching Auth Pipeline entry point,
//! decodes the body via the Codec, dispatches through `parsec-rpc`, and
//! encodes the typed reply — the RPC Dispatcher itself lives in `parsec-rpc`
//! so this module stays pure HTTP plumbing.

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use parsec_codec::{decode_request, encode_reply, CodecError, Reply};
use parsec_core::constants::{API_VERSION_MAJOR, API_VERSION_MINOR};
use parsec_events::EventId;
use parsec_rpc::{
    anonymous_context, authenticate, authenticate_sse, dispatch_anonymous, dispatch_authenticated,
    dispatch_invited, invited_context, negotiate_api_version, resolve_organization,
    supported_api_versions_header, AuthError, ClientContext, SettledApiVersion,
};
use tracing::instrument;

use crate::sse;
use crate::state::AppState;

/// Records the authenticated device onto the handler's `#[instrument]` span
/// once the Auth Pipeline resolves one, so every log line for the rest of
/// the request carries it without threading it through every call.
fn record_context(ctx: &ClientContext) {
    if let ClientContext::Authenticated { device_id, .. } = ctx {
        tracing::Span::current().record("device", tracing::field::display(device_id));
    }
}

fn fallback_version() -> SettledApiVersion {
    SettledApiVersion {
        major: API_VERSION_MAJOR,
        minor: API_VERSION_MINOR,
    }
}

fn auth_error_response(version: SettledApiVersion, err: AuthError) -> Response {
    let mut builder = Response::builder()
        .status(err.status_code())
        .header("Api-Version", version.header_value());
    if matches!(err, AuthError::UnsupportedApiVersion) {
        builder = builder.header("Supported-Api-Versions", supported_api_versions_header());
    }
    builder.body(Body::empty()).unwrap().into_response()
}

fn codec_error_response(version: SettledApiVersion, _err: CodecError) -> Response {
    // A decode failure (oversized body, malformed msgpack, unknown command)
    // surfaces as 415 before any component runs.
    Response::builder()
        .status(StatusCode::UNSUPPORTED_MEDIA_TYPE)
        .header("Api-Version", version.header_value())
        .body(Body::empty())
        .unwrap()
        .into_response()
}

fn reply_response(version: SettledApiVersion, reply: &Reply) -> Response {
    match encode_reply(reply) {
        Ok(bytes) => Response::builder()
            .status(StatusCode::OK)
            .header("Api-Version", version.header_value())
            .header(header::CONTENT_TYPE, "application/msgpack")
            .body(Body::from(bytes))
            .unwrap()
            .into_response(),
        Err(e) => codec_error_response(version, e),
    }
}

#[instrument(skip_all, fields(org = %organization_id))]
pub async fn anonymous_post(
    State(app): State<AppState>,
    Path(organization_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match anonymous_context(&app.store, &headers, &organization_id) {
        Ok((version, ctx)) => match decode_request(&body, version.minor) {
            Ok(request) => {
                let reply = dispatch_anonymous(&ctx, &app.store, &app.events, request, chrono::Utc::now());
                reply_response(version, &reply)
            }
            Err(e) => codec_error_response(version, e),
        },
        Err((version, e)) => auth_error_response(version, e),
    }
}

/// `GET /anonymous/{org}`: a bare connectivity probe — version and
/// organization resolution only, no content-type or body.
#[instrument(skip_all, fields(org = %organization_id))]
pub async fn anonymous_get(
    State(app): State<AppState>,
    Path(organization_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let version = match negotiate_api_version(&headers) {
        Ok(v) => v,
        Err(e) => return auth_error_response(fallback_version(), e),
    };
    match resolve_organization(&app.store, &organization_id) {
        Ok(_) => Response::builder()
            .status(StatusCode::OK)
            .header("Api-Version", version.header_value())
            .body(Body::empty())
            .unwrap()
            .into_response(),
        Err(e) => auth_error_response(version, e),
    }
}

#[instrument(skip_all, fields(org = %organization_id))]
pub async fn invited_post(
    State(app): State<AppState>,
    Path(organization_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match invited_context(&app.store, &headers, &organization_id) {
        Ok((version, ctx)) => match decode_request(&body, version.minor) {
            Ok(request) => reply_response(version, &dispatch_invited(&ctx, request)),
            Err(e) => codec_error_response(version, e),
        },
        Err((version, e)) => auth_error_response(version, e),
    }
}

#[instrument(skip_all, fields(org = %organization_id, device = tracing::field::Empty))]
pub async fn authenticated_post(
    State(app): State<AppState>,
    Path(organization_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match authenticate(&app.store, &headers, &organization_id, false) {
        Ok((version, ctx)) => match decode_request(&body, version.minor) {
            Ok(request) => {
                record_context(&ctx);
                let reply =
                    dispatch_authenticated(&ctx, &app.store, &app.events, request, chrono::Utc::now());
                reply_response(version, &reply)
            }
            Err(e) => codec_error_response(version, e),
        },
        Err((version, e)) => auth_error_response(version, e),
    }
}

/// `POST /authenticated/{org}/tos`: the one route that bypasses the
/// TOS-accepted precondition so a client can submit `TosAccept` in the
/// first place.
#[instrument(skip_all, fields(org = %organization_id, device = tracing::field::Empty))]
pub async fn authenticated_tos_post(
    State(app): State<AppState>,
    Path(organization_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match authenticate(&app.store, &headers, &organization_id, true) {
        Ok((version, ctx)) => match decode_request(&body, version.minor) {
            Ok(request) => {
                record_context(&ctx);
                let reply =
                    dispatch_authenticated(&ctx, &app.store, &app.events, request, chrono::Utc::now());
                reply_response(version, &reply)
            }
            Err(e) => codec_error_response(version, e),
        },
        Err((version, e)) => auth_error_response(version, e),
    }
}

/// `GET /authenticated/{org}/events`: the SSE Streamer's entry point
///. The handshake is identical to the authenticated RPC
/// scope except for the `Accept` check; once it succeeds, `sse` owns the
/// rest of the response.
#[instrument(skip_all, fields(org = %organization_id, device = tracing::field::Empty))]
pub async fn events_get(
    State(app): State<AppState>,
    Path(organization_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    match authenticate_sse(&app.store, &headers, &organization_id) {
        Ok((version, ctx @ ClientContext::Authenticated { .. })) => {
            record_context(&ctx);
            let ClientContext::Authenticated { organization_id, .. } = ctx else {
                unreachable!()
            };
            let last_event_id = headers
                .get("Last-Event-Id")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| EventId::from_hex(s).ok());
            sse::stream_response(app, version, organization_id, last_event_id)
        }
        Ok(_) => unreachable!("authenticate_sse only ever returns an Authenticated context"),
        Err((version, e)) => auth_error_response(version, e),
    }
}

/// `POST /anonymous_account`, `POST /authenticated_account`: the account-level
/// scopes sit behind a separate token kind and data model not covered by
/// this component; kept as a typed 404 rather than a fabricated
/// implementation.
pub async fn account_scope_unimplemented(headers: HeaderMap) -> Response {
    let version = negotiate_api_version(&headers).unwrap_or_else(|_| fallback_version());
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Api-Version", version.header_value())
        .body(Body::empty())
        .unwrap()
        .into_response()
}
