//! Shared HTTP response helpers for the service clients.
//!
//! Centralizes status-code checks (rate limiting, rejected credentials,
//! non-success → [`SourceError::Api`]) and JSON body parsing so each client
//! module stays focused on request construction and response mapping.

use serde::de::DeserializeOwned;

use crate::error::SourceError;

const FALLBACK_RETRY_SECS: u64 = 60;

/// Check an HTTP response for common error conditions.
///
/// Returns the response unchanged on success. Handles:
/// - **429 Too Many Requests**, or **403** with `x-ratelimit-remaining: 0`
///   (GitHub's exhausted quota) → [`SourceError::RateLimited`]. The wait is
///   read from `Retry-After`, then `x-ratelimit-reset`, falling back to 60 s.
/// - **401 / other 403** → [`SourceError::Auth`].
/// - **Non-success status** → [`SourceError::Api`] with status and body.
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, SourceError> {
    let status = resp.status().as_u16();
    if status == 429 || (status == 403 && quota_exhausted(&resp)) {
        return Err(SourceError::RateLimited {
            retry_after_secs: retry_after_secs(&resp, unix_now()),
        });
    }
    if status == 401 || status == 403 {
        return Err(SourceError::Auth {
            status,
            message: resp.text().await.unwrap_or_default(),
        });
    }
    if !resp.status().is_success() {
        return Err(SourceError::Api {
            status,
            message: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(resp)
}

/// Read a checked response body as JSON.
///
/// Body decode failures are [`SourceError::Parse`], not transport errors.
pub async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, SourceError> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| SourceError::Parse(e.to_string()))
}

fn header_u64(resp: &reqwest::Response, name: &str) -> Option<u64> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

fn quota_exhausted(resp: &reqwest::Response) -> bool {
    header_u64(resp, "x-ratelimit-remaining") == Some(0)
}

fn retry_after_secs(resp: &reqwest::Response, now_secs: u64) -> u64 {
    if let Some(secs) = header_u64(resp, reqwest::header::RETRY_AFTER.as_str()) {
        return secs;
    }
    header_u64(resp, "x-ratelimit-reset")
        .map_or(FALLBACK_RETRY_SECS, |reset| reset.saturating_sub(now_secs))
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
