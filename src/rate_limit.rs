use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::store::{BudgetStore, StoreError};

// Rate budget record - tracks remaining tokens per identity key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetRecord {
    pub remaining: u32,
    // absolute unix-millisecond timestamp at which the budget refills
    pub reset_at_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Denied { reset_at_ms: i64 },
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_tokens: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    fn window_ms(&self) -> i64 {
        self.window.as_millis() as i64
    }
}

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("identity key must not be empty")]
    InvalidIdentityKey,
    #[error(transparent)]
    Storage(#[from] StoreError),
}

// A lost CAS means another writer progressed on the same key, so a small
// bound is enough; running out is treated as a storage fault.
const CAS_MAX_RETRIES: usize = 16;

// Gates every inbound request against a per-identity request budget
pub struct AdmissionController {
    store: Arc<dyn BudgetStore>,
    config: RateLimitConfig,
}

impl AdmissionController {
    pub fn new(store: Arc<dyn BudgetStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    // Look up (or lazily create) the budget for `key`, refill it if the
    // window has passed, and consume one token if any remain.
    pub async fn check_and_consume(&self, key: &str) -> Result<Decision, AdmissionError> {
        if key.is_empty() {
            return Err(AdmissionError::InvalidIdentityKey);
        }

        for _ in 0..CAS_MAX_RETRIES {
            let now_ms = Utc::now().timestamp_millis();
            let found = self.store.get(key).await?;
            let current = found.as_ref().map(|(record, _)| record);

            let (write, decision) = next_state(current, now_ms, &self.config);

            // a deny inside the window changes nothing, so skip the write
            let Some(next) = write else {
                return Ok(decision);
            };

            let version = found.as_ref().map(|(_, version)| *version);
            if self.store.put_if(key, version, &next).await? {
                return Ok(decision);
            }
        }

        Err(AdmissionError::Storage(StoreError::Unavailable(
            "budget update lost too many races".to_string(),
        )))
    }
}

// State transition for one budget record. Refill re-bases the window to
// now + window_length, so the reset time only ever moves forward, and any
// number of elapsed windows produces exactly one refill.
fn next_state(
    current: Option<&BudgetRecord>,
    now_ms: i64,
    config: &RateLimitConfig,
) -> (Option<BudgetRecord>, Decision) {
    match current {
        Some(record) if now_ms < record.reset_at_ms => {
            if record.remaining > 0 {
                let next = BudgetRecord {
                    remaining: record.remaining - 1,
                    reset_at_ms: record.reset_at_ms,
                };
                let decision = Decision::Allowed {
                    remaining: next.remaining,
                };
                (Some(next), decision)
            } else {
                (
                    None,
                    Decision::Denied {
                        reset_at_ms: record.reset_at_ms,
                    },
                )
            }
        }
        // unseen key, or the window has expired: full budget minus this request
        _ => {
            let next = BudgetRecord {
                remaining: config.max_tokens.saturating_sub(1),
                reset_at_ms: now_ms + config.window_ms(),
            };
            let decision = Decision::Allowed {
                remaining: next.remaining,
            };
            (Some(next), decision)
        }
    }
}
