use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::config::{FailPolicy, RateScope};
use crate::error::ApiError;
use crate::metrics::{RATE_LIMITED_TOTAL, REQUEST_LATENCY, REQUEST_TOTAL, STORE_ERRORS_TOTAL};
use crate::rate_limit::{AdmissionError, Decision};
use crate::state::AppState;

// Admission gate - runs before every note handler. Denied requests
// short-circuit with 429 and a Retry-After derived from the window reset.
pub async fn admission_gate(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();

    let key = identity_key(&req, state.rate_scope);

    let response = match state.admission.check_and_consume(&key).await {
        Ok(Decision::Allowed { .. }) => next.run(req).await,
        Ok(Decision::Denied { reset_at_ms }) => {
            RATE_LIMITED_TOTAL.inc();
            warn!(key = %key, "rate limit exceeded");
            ApiError::RateLimitExceeded {
                retry_after_secs: retry_after_secs(reset_at_ms),
            }
            .into_response()
        }
        Err(AdmissionError::Storage(err)) => {
            STORE_ERRORS_TOTAL.inc();
            match state.fail_policy {
                FailPolicy::Open => {
                    warn!(error = %err, "budget store unavailable, admitting request");
                    next.run(req).await
                }
                FailPolicy::Closed => {
                    warn!(error = %err, "budget store unavailable, denying request");
                    ApiError::StorageUnavailable(err).into_response()
                }
            }
        }
        Err(AdmissionError::InvalidIdentityKey) => ApiError::InvalidIdentityKey.into_response(),
    };

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    response
}

// Budget key for this request. Client addresses are hashed so raw
// addresses never land in a shared budget store.
fn identity_key(req: &Request, scope: RateScope) -> String {
    match scope {
        RateScope::Global => "global".to_string(),
        RateScope::Ip => {
            let ip = client_ip(req).unwrap_or_else(|| "unknown".to_string());
            let mut hasher = Sha256::new();
            hasher.update(ip.as_bytes());
            format!("ip:{:x}", hasher.finalize())
        }
    }
}

// Client address: proxy headers first, then the socket peer address
fn client_ip(req: &Request) -> Option<String> {
    if let Some(forwarded) = req.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return Some(first.to_string());
                }
            }
        }
    }

    if let Some(real_ip) = req.headers().get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            return Some(value.to_string());
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
}

fn retry_after_secs(reset_at_ms: i64) -> u64 {
    let now_ms = Utc::now().timestamp_millis();
    let wait_ms = (reset_at_ms - now_ms).max(0) as u64;
    (wait_ms.div_ceil(1000)).max(1)
}
