//! Scoped token issuance for container access.
//!
//! Turns an account key into a time-bounded, read/list-only token and the
//! fully qualified container URL downstream clients are handed. The grant is
//! returned as an explicit value; nothing here touches process-wide state.

use crate::config::StorageCredentials;
use crate::constants::{SERVICE_HOST, SIGNED_SERVICE_VERSION};
use crate::errors::{AppError, AppResult};
use crate::models::{AccessGrant, Permissions};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{error, info};
use url::form_urlencoded;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Issues a read/list-limited access grant for one container.
///
/// The expiry is `now (UTC) + duration`; permissions are always restricted
/// to read and list, never write or delete. The resulting grant carries a
/// container URL of the form
/// `https://{account}.{service-host}/{container}?{token}`.
///
/// # Errors
///
/// Returns `CredentialError` for empty identifiers, a non-positive duration,
/// or a key the signer cannot use. The failure is logged here so callers can
/// simply decide whether to abort.
pub fn issue(
    account_name: &str,
    account_key: &str,
    container_name: &str,
    duration: Duration,
) -> AppResult<AccessGrant> {
    let result = issue_inner(account_name, account_key, container_name, duration);
    if let Err(e) = &result {
        error!(container = container_name, error = %e, "Failed to issue access grant");
    }
    result
}

/// Issues a grant from environment-sourced credentials with an hour budget.
pub fn issue_for(credentials: &StorageCredentials, hours: i64) -> AppResult<AccessGrant> {
    issue(
        &credentials.account,
        &credentials.key,
        &credentials.container,
        Duration::hours(hours),
    )
}

fn issue_inner(
    account_name: &str,
    account_key: &str,
    container_name: &str,
    duration: Duration,
) -> AppResult<AccessGrant> {
    if account_name.trim().is_empty() {
        return Err(AppError::CredentialError(
            "Account name must not be empty".into(),
        ));
    }
    if container_name.trim().is_empty() {
        return Err(AppError::CredentialError(
            "Container name must not be empty".into(),
        ));
    }
    if account_key.trim().is_empty() {
        return Err(AppError::CredentialError(
            "Account key must not be empty".into(),
        ));
    }
    if duration <= Duration::zero() {
        return Err(AppError::CredentialError(
            "Grant duration must be positive".into(),
        ));
    }

    let issued_at = Utc::now();
    let expires_at = issued_at + duration;
    let permissions = Permissions::read_list();

    let token = sign_container_token(
        account_name,
        account_key,
        container_name,
        permissions,
        issued_at,
        expires_at,
    )?;

    let container_url = Url::parse(&format!(
        "https://{account_name}.{SERVICE_HOST}/{container_name}?{token}"
    ))?;

    info!(
        container = container_name,
        expires_at = %signed_timestamp(expires_at),
        "Issued scoped access grant"
    );

    Ok(AccessGrant {
        issued_at,
        expires_at,
        permissions,
        container_url,
    })
}

/// Computes the service signature and assembles the token query string.
fn sign_container_token(
    account_name: &str,
    account_key: &str,
    container_name: &str,
    permissions: Permissions,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> AppResult<String> {
    let key = BASE64.decode(account_key).map_err(|e| {
        AppError::CredentialError(format!("Account key is not valid base64: {e}"))
    })?;

    let sp = permissions.as_signed_string();
    let st = signed_timestamp(issued_at);
    let se = signed_timestamp(expires_at);
    let canonicalized_resource = format!("/blob/{account_name}/{container_name}");

    // Field order is fixed by the signing protocol: permissions, start,
    // expiry, resource, identifier, IP, protocol, version, resource type,
    // snapshot time, encryption scope, then the five response-header
    // overrides (all unused here).
    let string_to_sign = format!(
        "{sp}\n{st}\n{se}\n{canonicalized_resource}\n\n\nhttps\n{SIGNED_SERVICE_VERSION}\nc\n\n\n\n\n\n\n"
    );

    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| AppError::CredentialError(format!("Signing failed: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    let token = form_urlencoded::Serializer::new(String::new())
        .append_pair("sp", &sp)
        .append_pair("st", &st)
        .append_pair("se", &se)
        .append_pair("spr", "https")
        .append_pair("sv", SIGNED_SERVICE_VERSION)
        .append_pair("sr", "c")
        .append_pair("sig", &signature)
        .finish();

    Ok(token)
}

fn signed_timestamp(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
