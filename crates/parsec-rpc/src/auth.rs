//! The Auth Pipeline: one ordered chain of checks run
//! before any RPC or SSE handler sees a request, each aborting with a fixed
//! status on failure. Generalizes `client_context.py`'s per-scope
//! `*_abort`-on-first-failure helpers into a single ordered function per
//! scope, since every scope here shares the same first four steps.

use axum::http::{HeaderMap, StatusCode};

use parsec_core::constants::{API_VERSION_MAJOR, API_VERSION_MINOR, TOKEN_BALLPARK_OFFSET_SECS};
use parsec_core::types::{ClientAgentPolicy, DeviceId, InvitationToken, OrganizationId, Signature, Timestamp};
use parsec_crypto::{check_ballpark, verify_signature};
use parsec_store::Store;
use tracing::warn;

use crate::context::ClientContext;

/// Every way the pipeline can abort, carrying enough to build the HTTP
/// response.
#[derive(Debug)]
pub enum AuthError {
    UnsupportedApiVersion,
    OrganizationNotFound,
    UnsupportedContentType,
    NotAcceptable,
    MissingOrMalformedToken,
    IdentityNotFoundOrInvalid,
    OrganizationExpired,
    UserRevoked,
    UserFrozen,
    TosNotAccepted,
    TokenOutOfBallpark,
    ClientAgentNotAllowed,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::UnsupportedApiVersion => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::OrganizationNotFound => StatusCode::NOT_FOUND,
            AuthError::UnsupportedContentType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AuthError::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            AuthError::MissingOrMalformedToken => StatusCode::UNAUTHORIZED,
            AuthError::IdentityNotFoundOrInvalid => StatusCode::FORBIDDEN,
            AuthError::OrganizationExpired => StatusCode::from_u16(460).unwrap(),
            AuthError::UserRevoked => StatusCode::from_u16(461).unwrap(),
            AuthError::UserFrozen => StatusCode::from_u16(462).unwrap(),
            AuthError::TosNotAccepted => StatusCode::from_u16(463).unwrap(),
            AuthError::TokenOutOfBallpark => StatusCode::from_u16(498).unwrap(),
            AuthError::ClientAgentNotAllowed => StatusCode::from_u16(464).unwrap(),
        }
    }
}

/// The API version settled on for this request, always echoed back via the
/// `Api-Version` response header regardless of outcome.
#[derive(Clone, Copy, Debug)]
pub struct SettledApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl SettledApiVersion {
    pub fn header_value(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }
}

/// Settles the API version: the newest minor the client offers sharing our
/// major. A missing header, a major mismatch, or a malformed value is a 422
/// carrying `Supported-Api-Versions`.
pub fn negotiate_api_version(headers: &HeaderMap) -> Result<SettledApiVersion, AuthError> {
    let raw = headers
        .get("Api-Version")
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::UnsupportedApiVersion)?;
    let (major_str, minor_str) = raw.split_once('.').ok_or(AuthError::UnsupportedApiVersion)?;
    let major: u32 = major_str.parse().map_err(|_| AuthError::UnsupportedApiVersion)?;
    let minor: u32 = minor_str.parse().map_err(|_| AuthError::UnsupportedApiVersion)?;
    if major != API_VERSION_MAJOR {
        return Err(AuthError::UnsupportedApiVersion);
    }
    Ok(SettledApiVersion {
        major,
        minor: minor.min(API_VERSION_MINOR),
    })
}

pub fn supported_api_versions_header() -> String {
    format!("{API_VERSION_MAJOR}.{API_VERSION_MINOR}")
}

/// Parses the `{org}` path segment. A store lookup miss is folded into the
/// same 404 as a syntactically invalid identifier — both mean "this
/// organization does not exist" from the caller's point of view.
pub fn resolve_organization(store: &Store, org_path: &str) -> Result<OrganizationId, AuthError> {
    let organization_id =
        OrganizationId::new(org_path).map_err(|_| AuthError::OrganizationNotFound)?;
    if !store.org_exists(&organization_id) {
        return Err(AuthError::OrganizationNotFound);
    }
    Ok(organization_id)
}

pub fn check_msgpack_content_type(headers: &HeaderMap) -> Result<(), AuthError> {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if content_type.starts_with("application/msgpack") {
        Ok(())
    } else {
        Err(AuthError::UnsupportedContentType)
    }
}

pub fn check_sse_accept(headers: &HeaderMap) -> Result<(), AuthError> {
    let accept = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if accept.contains("text/event-stream") {
        Ok(())
    } else {
        Err(AuthError::NotAcceptable)
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingOrMalformedToken)
}

/// A signed authenticated-scope token: `<device-id-hex>.<rfc3339
/// timestamp>.<signature-hex>`. The signature covers the first two
/// dot-joined fields, letting the server prove the bearer actually holds the
/// claimed device's secret key without a session table.
struct ParsedDeviceToken {
    device_id: DeviceId,
    timestamp: Timestamp,
    signature: Signature,
    signed_message: Vec<u8>,
}

fn parse_device_token(token: &str) -> Result<ParsedDeviceToken, AuthError> {
    let mut parts = token.splitn(3, '.');
    let (Some(device_hex), Some(ts_str), Some(sig_hex)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::MissingOrMalformedToken);
    };
    let device_id =
        DeviceId::from_hex(device_hex).map_err(|_| AuthError::MissingOrMalformedToken)?;
    let timestamp: Timestamp = ts_str
        .parse()
        .map_err(|_| AuthError::MissingOrMalformedToken)?;
    let sig_bytes = hex::decode(sig_hex).map_err(|_| AuthError::MissingOrMalformedToken)?;
    Ok(ParsedDeviceToken {
        device_id,
        timestamp,
        signature: Signature(sig_bytes),
        signed_message: format!("{device_hex}.{ts_str}").into_bytes(),
    })
}

/// Detects a browser client from its `User-Agent`. Native clients send their
/// own product token (e.g. `Parsec-Client/3.2`); browsers send the standard
/// `Mozilla/5.0 (...)` preamble used by every mainstream engine.
fn is_web_client(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| ua.starts_with("Mozilla/"))
        .unwrap_or(false)
}

/// Runs the full pipeline for the `authenticated` (and `tos`, via
/// `tos_bypass`) scope. Returns the settled version alongside the context so
/// callers can stamp `Api-Version` on both success and failure paths.
pub fn authenticate(
    store: &Store,
    headers: &HeaderMap,
    org_path: &str,
    tos_bypass: bool,
) -> Result<(SettledApiVersion, ClientContext), (SettledApiVersion, AuthError)> {
    let version = negotiate_api_version(headers).map_err(|e| {
        // Without a settled version there is nothing meaningful to echo back;
        // the dispatcher falls back to our own highest version in that case.
        (SettledApiVersion { major: API_VERSION_MAJOR, minor: API_VERSION_MINOR }, e)
    })?;
    let wrap = |e: AuthError| (version, e);

    let organization_id = resolve_organization(store, org_path).map_err(wrap)?;
    check_msgpack_content_type(headers).map_err(wrap)?;
    let token = bearer_token(headers).map_err(wrap)?;
    let parsed = parse_device_token(token).map_err(wrap)?;

    let org = store
        .get_org(&organization_id)
        .ok_or_else(|| wrap(AuthError::IdentityNotFoundOrInvalid))?;
    let device = org
        .get_device(parsed.device_id)
        .ok_or_else(|| wrap(AuthError::IdentityNotFoundOrInvalid))?;
    let user = org
        .get_user(device.user_id)
        .ok_or_else(|| wrap(AuthError::IdentityNotFoundOrInvalid))?;
    verify_signature(&device.verify_key, &parsed.signed_message, &parsed.signature)
        .map_err(|_| wrap(AuthError::IdentityNotFoundOrInvalid))?;

    let organization = org.organization();
    if organization.is_expired {
        return Err(wrap(AuthError::OrganizationExpired));
    }
    if user.is_revoked() {
        return Err(wrap(AuthError::UserRevoked));
    }
    if user.frozen {
        return Err(wrap(AuthError::UserFrozen));
    }
    if !tos_bypass {
        if let Some(tos) = &organization.tos {
            let accepted_current = user
                .tos_accepted_on
                .map(|accepted| accepted >= tos.updated_on)
                .unwrap_or(false);
            if !accepted_current {
                return Err(wrap(AuthError::TosNotAccepted));
            }
        }
    }
    check_ballpark(
        parsed.timestamp,
        chrono::Utc::now(),
        TOKEN_BALLPARK_OFFSET_SECS,
        TOKEN_BALLPARK_OFFSET_SECS,
    )
    .map_err(|_| wrap(AuthError::TokenOutOfBallpark))?;
    if organization.allowed_client_agent == ClientAgentPolicy::NativeOnly && is_web_client(headers) {
        return Err(wrap(AuthError::ClientAgentNotAllowed));
    }

    Ok((
        version,
        ClientContext::Authenticated {
            organization_id,
            device_id: parsed.device_id,
            user_id: user.user_id,
            profile: user.current_profile,
            tos_bypass,
        },
    ))
}

/// Pipeline for `GET /authenticated/{org}/events`: the
/// same identity resolution as `authenticate`, but the format check is
/// `Accept: text/event-stream` instead of `Content-Type: application/msgpack`
/// — there is no request body to speak of.
pub fn authenticate_sse(
    store: &Store,
    headers: &HeaderMap,
    org_path: &str,
) -> Result<(SettledApiVersion, ClientContext), (SettledApiVersion, AuthError)> {
    let version = negotiate_api_version(headers).map_err(|e| {
        (SettledApiVersion { major: API_VERSION_MAJOR, minor: API_VERSION_MINOR }, e)
    })?;
    let wrap = |e: AuthError| (version, e);

    let organization_id = resolve_organization(store, org_path).map_err(wrap)?;
    check_sse_accept(headers).map_err(wrap)?;
    let token = bearer_token(headers).map_err(wrap)?;
    let parsed = parse_device_token(token).map_err(wrap)?;

    let org = store
        .get_org(&organization_id)
        .ok_or_else(|| wrap(AuthError::IdentityNotFoundOrInvalid))?;
    let device = org
        .get_device(parsed.device_id)
        .ok_or_else(|| wrap(AuthError::IdentityNotFoundOrInvalid))?;
    let user = org
        .get_user(device.user_id)
        .ok_or_else(|| wrap(AuthError::IdentityNotFoundOrInvalid))?;
    verify_signature(&device.verify_key, &parsed.signed_message, &parsed.signature)
        .map_err(|_| wrap(AuthError::IdentityNotFoundOrInvalid))?;

    let organization = org.organization();
    if organization.is_expired {
        return Err(wrap(AuthError::OrganizationExpired));
    }
    if user.is_revoked() {
        return Err(wrap(AuthError::UserRevoked));
    }
    if user.frozen {
        return Err(wrap(AuthError::UserFrozen));
    }
    if let Some(tos) = &organization.tos {
        let accepted_current = user
            .tos_accepted_on
            .map(|accepted| accepted >= tos.updated_on)
            .unwrap_or(false);
        if !accepted_current {
            return Err(wrap(AuthError::TosNotAccepted));
        }
    }
    check_ballpark(
        parsed.timestamp,
        chrono::Utc::now(),
        TOKEN_BALLPARK_OFFSET_SECS,
        TOKEN_BALLPARK_OFFSET_SECS,
    )
    .map_err(|_| wrap(AuthError::TokenOutOfBallpark))?;
    if organization.allowed_client_agent == ClientAgentPolicy::NativeOnly && is_web_client(headers) {
        return Err(wrap(AuthError::ClientAgentNotAllowed));
    }

    Ok((
        version,
        ClientContext::Authenticated {
            organization_id,
            device_id: parsed.device_id,
            user_id: user.user_id,
            profile: user.current_profile,
            tos_bypass: false,
        },
    ))
}

/// Pipeline for the `anonymous` scope: only version negotiation, org
/// resolution, and content-type apply — there is no identity yet.
pub fn anonymous_context(
    store: &Store,
    headers: &HeaderMap,
    org_path: &str,
) -> Result<(SettledApiVersion, ClientContext), (SettledApiVersion, AuthError)> {
    let version = negotiate_api_version(headers).map_err(|e| {
        (SettledApiVersion { major: API_VERSION_MAJOR, minor: API_VERSION_MINOR }, e)
    })?;
    let wrap = |e: AuthError| (version, e);
    let organization_id = resolve_organization(store, org_path).map_err(wrap)?;
    check_msgpack_content_type(headers).map_err(wrap)?;
    Ok((version, ClientContext::Anonymous { organization_id }))
}

/// Pipeline for the `invited` scope: the bearer is the raw invitation token
/// (hex UUID), resolved against the organization's live invitations.
pub fn invited_context(
    store: &Store,
    headers: &HeaderMap,
    org_path: &str,
) -> Result<(SettledApiVersion, ClientContext), (SettledApiVersion, AuthError)> {
    let version = negotiate_api_version(headers).map_err(|e| {
        (SettledApiVersion { major: API_VERSION_MAJOR, minor: API_VERSION_MINOR }, e)
    })?;
    let wrap = |e: AuthError| (version, e);
    let organization_id = resolve_organization(store, org_path).map_err(wrap)?;
    check_msgpack_content_type(headers).map_err(wrap)?;
    let token_str = bearer_token(headers).map_err(wrap)?;
    let invitation_token =
        InvitationToken::from_hex(token_str).map_err(|_| wrap(AuthError::MissingOrMalformedToken))?;

    let org = store
        .get_org(&organization_id)
        .ok_or_else(|| wrap(AuthError::IdentityNotFoundOrInvalid))?;
    let invitation = org
        .get_invitation(invitation_token)
        .ok_or_else(|| wrap(AuthError::IdentityNotFoundOrInvalid))?;
    if !invitation.is_usable() {
        warn!(token = %invitation_token, "invited scope hit on a deleted invitation");
        return Err(wrap(AuthError::IdentityNotFoundOrInvalid));
    }
    if org.organization().is_expired {
        return Err(wrap(AuthError::OrganizationExpired));
    }

    Ok((
        version,
        ClientContext::Invited {
            organization_id,
            invitation_token,
        },
    ))
}

/// Builds the bearer token a native client would send for `device_id`,
/// signing it with `sign`. Exported for integration tests and as the
/// reference a client SDK would mirror.
pub fn build_device_token(
    device_id: DeviceId,
    timestamp: Timestamp,
    sign: impl Fn(&[u8]) -> Signature,
) -> String {
    let device_hex = device_id.hex();
    let ts_str = timestamp.to_rfc3339();
    let message = format!("{device_hex}.{ts_str}");
    let signature = sign(message.as_bytes());
    format!("{device_hex}.{ts_str}.{}", hex::encode(signature.0))
}
