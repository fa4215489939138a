//! The RPC Dispatcher: routes a decoded `Request` to the
//! component method bound to its variant, translating outcomes into the
//! typed `Reply`. Scope enforcement (which variants a context may submit)
//! lives here, not in `parsec-codec`, per that crate's own doc comment.

use parsec_codec::{CertificateEntry, ErrorOutcome, Reply, Request, VlobReadItem};
use parsec_core::types::Timestamp;
use parsec_events::EventBus;
use parsec_organization::OrganizationComponent;
use parsec_realm::RealmComponent;
use parsec_store::Store;
use parsec_user::{RevokeOutcome, UserComponent};
use parsec_vlob::VlobComponent;

use crate::context::ClientContext;

/// Dispatches a decoded request under an already-authenticated context.
/// Panics are not caught here: a handler that panics is a bug, and the
/// server binary's task boundary turns it into an HTTP 500.
pub fn dispatch_authenticated(
    ctx: &ClientContext,
    store: &Store,
    events: &EventBus,
    request: Request,
    server_now: Timestamp,
) -> Reply {
    let ClientContext::Authenticated {
        organization_id,
        device_id,
        user_id,
        profile,
        tos_bypass,
    } = ctx
    else {
        return unexpected_scope();
    };

    let Some(org) = store.get_org(organization_id) else {
        return ErrorOutcome::OrganizationNotFound.into();
    };
    let org_component = OrganizationComponent { store, events };
    let user_component = UserComponent { org: &org, events };
    let realm_component = RealmComponent { org: &org, events };
    let vlob_component = VlobComponent { org: &org, events };

    match request {
        Request::Ping { ping } => Reply::Pong { pong: ping },

        Request::OrganizationConfig => {
            let organization = org.organization();
            Reply::OrganizationConfigOk {
                is_expired: organization.is_expired,
                active_users_limit: match organization.active_users_limit {
                    parsec_core::types::ActiveUsersLimit::Unbounded => None,
                    parsec_core::types::ActiveUsersLimit::Limited(n) => Some(n),
                },
                tos_per_locale_urls: organization.tos.map(|tos| tos.per_locale_urls),
            }
        }
        Request::OrganizationStats { at } => {
            match org_component.stats(organization_id, at) {
                Ok(stats) => Reply::OrganizationStatsOk(stats),
                Err(e) => e.into(),
            }
        }

        Request::UserCreate {
            user_certificate,
            device_certificate,
            redacted_user_certificate,
            redacted_device_certificate,
        } => match user_component.create_user(
            *device_id,
            user_certificate,
            redacted_user_certificate,
            device_certificate,
            redacted_device_certificate,
            server_now,
        ) {
            Ok(()) => Reply::UserCreateOk,
            Err(e) => e.into(),
        },
        Request::DeviceCreate {
            device_certificate,
            redacted_device_certificate,
        } => match user_component.create_device(
            *device_id,
            device_certificate,
            redacted_device_certificate,
            server_now,
        ) {
            Ok(()) => Reply::DeviceCreateOk,
            Err(e) => e.into(),
        },
        Request::UserRevoke {
            revoked_user_certificate,
        } => match user_component.revoke_user(*device_id, revoked_user_certificate, server_now) {
            Ok(RevokeOutcome::Committed) => Reply::UserRevokeOk,
            Ok(RevokeOutcome::Idempotent { certificate_timestamp }) => {
                Reply::UserRevokeIdempotent { certificate_timestamp }
            }
            Err(e) => e.into(),
        },
        Request::UserUpdate {
            user_update_certificate,
        } => match user_component.update_user(*device_id, user_update_certificate, server_now) {
            Ok(()) => Reply::UserUpdateOk,
            Err(e) => e.into(),
        },
        Request::UserGetCertificates {
            common_after,
            sequester_after,
            realm_after,
            shamir_recovery_after,
        } => match user_component.get_certificates_as_user(
            *user_id,
            common_after,
            sequester_after,
            &realm_after,
            shamir_recovery_after,
        ) {
            Ok(bundle) => Reply::UserGetCertificatesOk {
                common_certificates: as_entries(&bundle.common, *profile),
                sequester_certificates: as_entries(&bundle.sequester, *profile),
                realm_certificates: bundle
                    .realms
                    .into_iter()
                    .map(|(realm_id, certs)| (realm_id, as_entries(&certs, *profile)))
                    .collect(),
                shamir_recovery_certificates: as_entries(&bundle.shamir_recovery, *profile),
            },
            Err(e) => e.into(),
        },

        Request::RealmCreate {
            realm_role_certificate,
        } => match realm_component.create_realm(*device_id, realm_role_certificate, server_now) {
            Ok(()) => Reply::RealmCreateOk,
            Err(e) => e.into(),
        },
        Request::RealmShare {
            realm_role_certificate,
            recipient_keys_bundle_access,
        } => match realm_component.share(
            *device_id,
            realm_role_certificate,
            recipient_keys_bundle_access,
            server_now,
        ) {
            Ok(()) => Reply::RealmShareOk,
            Err(e) => e.into(),
        },
        Request::RealmRotateKey {
            realm_key_rotation_certificate,
            per_participant_keys_bundle_access,
        } => match realm_component.rotate_key(
            *device_id,
            realm_key_rotation_certificate,
            per_participant_keys_bundle_access,
            server_now,
        ) {
            Ok(()) => Reply::RealmRotateKeyOk,
            Err(e) => e.into(),
        },
        Request::RealmRename {
            realm_name_certificate,
        } => match realm_component.rename(*device_id, realm_name_certificate, server_now) {
            Ok(()) => Reply::RealmRenameOk,
            Err(e) => e.into(),
        },

        Request::VlobCreate {
            realm_id,
            vlob_id,
            key_index,
            timestamp,
            blob,
            sequester_blob,
        } => match vlob_component.create(
            *device_id,
            realm_id,
            vlob_id,
            key_index,
            timestamp,
            blob,
            sequester_blob,
            server_now,
        ) {
            Ok(()) => Reply::VlobCreateOk,
            Err(e) => e.into(),
        },
        Request::VlobUpdate {
            vlob_id,
            version,
            key_index,
            timestamp,
            blob,
            sequester_blob,
        } => match vlob_component.update(
            *device_id,
            vlob_id,
            version,
            key_index,
            timestamp,
            blob,
            sequester_blob,
            server_now,
        ) {
            Ok(()) => Reply::VlobUpdateOk,
            Err(e) => e.into(),
        },
        Request::VlobReadVersions { realm_id, items } => {
            match vlob_component.read_versions(*device_id, realm_id, items) {
                Ok(outcome) => Reply::VlobReadVersionsOk {
                    items: outcome
                        .items
                        .into_iter()
                        .map(|e| VlobReadItem {
                            vlob_id: e.vlob_id,
                            key_index: e.key_index,
                            author: e.author,
                            version: e.version,
                            created_on: e.created_on,
                            blob: e.blob,
                        })
                        .collect(),
                    needed_common_certificate_timestamp: outcome.needed_common_certificate_timestamp,
                    needed_realm_certificate_timestamp: outcome.needed_realm_certificate_timestamp,
                },
                Err(e) => e.into(),
            }
        }

        Request::TosAccept { tos_updated_on } => {
            if !*tos_bypass {
                return unexpected_scope();
            }
            accept_tos(&org, *user_id, tos_updated_on)
        }

        Request::OrganizationBootstrap { .. } | Request::InvitationInfo => unexpected_scope(),
    }
}

fn accept_tos(org: &parsec_store::OrgState, user_id: parsec_core::types::UserId, tos_updated_on: Timestamp) -> Reply {
    let organization = org.organization();
    let Some(tos) = organization.tos else {
        return ErrorOutcome::Internal {
            reason: "organization has no terms of service configured".into(),
        }
        .into();
    };
    if tos_updated_on != tos.updated_on {
        return ErrorOutcome::Internal {
            reason: "tos_updated_on does not match the organization's current terms".into(),
        }
        .into();
    }
    let Some(mut user) = org.get_user(user_id) else {
        return ErrorOutcome::UserNotFound.into();
    };
    user.tos_accepted_on = Some(tos_updated_on);
    org.put_user(user);
    Reply::TosAcceptOk
}

fn as_entries(
    certs: &[parsec_core::certificate::SignedCertificate],
    profile: parsec_core::types::UserProfile,
) -> Vec<CertificateEntry> {
    certs
        .iter()
        .map(|c| CertificateEntry {
            raw: c.bytes_for_profile(profile).to_vec(),
        })
        .collect()
}

/// Dispatches the single `anonymous`-scope operation this store recognizes.
/// Needs `events` because `bootstrap` publishes `CommonCertificate` (and,
/// when a sequester authority is present, `SequesterCertificate`) on success.
pub fn dispatch_anonymous(
    ctx: &ClientContext,
    store: &Store,
    events: &EventBus,
    request: Request,
    server_now: Timestamp,
) -> Reply {
    let ClientContext::Anonymous { organization_id } = ctx else {
        return unexpected_scope();
    };
    match request {
        Request::OrganizationBootstrap {
            bootstrap_token,
            root_verify_key,
            user_certificate,
            device_certificate,
            redacted_user_certificate,
            redacted_device_certificate,
            sequester_authority_certificate,
            timestamp: _,
        } => {
            let component = OrganizationComponent { store, events };
            match component.bootstrap(
                organization_id,
                bootstrap_token,
                root_verify_key,
                user_certificate,
                redacted_user_certificate,
                device_certificate,
                redacted_device_certificate,
                sequester_authority_certificate,
                server_now,
            ) {
                Ok(()) => Reply::OrganizationBootstrapOk,
                Err(e) => e.into(),
            }
        }
        _ => unexpected_scope(),
    }
}

/// Dispatches the single `invited`-scope operation this store recognizes.
pub fn dispatch_invited(ctx: &ClientContext, request: Request) -> Reply {
    let ClientContext::Invited { .. } = ctx else {
        return unexpected_scope();
    };
    match request {
        Request::InvitationInfo => Reply::Ok,
        _ => unexpected_scope(),
    }
}

/// A request variant submitted outside the scope it belongs to. The Auth
/// Pipeline's routing (one axum route per scope) should make this
/// unreachable in practice; kept as a typed fallback rather than a panic so
/// a routing bug degrades to a wrong-looking reply instead of a crash.
fn unexpected_scope() -> Reply {
    ErrorOutcome::Internal {
        reason: "command not valid for this scope".into(),
    }
    .into()
}
