use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use reqwest::StatusCode;
use reqwest::header::{IF_MATCH, IF_NONE_MATCH};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::rate_limit::BudgetRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("budget store unavailable: {0}")]
    Unavailable(String),
}

// Version of a stored record, bumped on every successful write
pub type Version = u64;

// Key-value storage for rate budget records. Writes are compare-and-swap
// on the version returned by `get`, so concurrent updates to one key
// cannot both land.
#[async_trait]
pub trait BudgetStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<(BudgetRecord, Version)>, StoreError>;

    // Write `next` only if the stored version still matches `expected`;
    // `None` means the key must be absent. Returns false on a lost race.
    async fn put_if(
        &self,
        key: &str,
        expected: Option<Version>,
        next: &BudgetRecord,
    ) -> Result<bool, StoreError>;
}

// In-process budget table
pub struct MemoryBudgetStore {
    records: DashMap<String, (BudgetRecord, Version)>,
}

impl MemoryBudgetStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}

impl Default for MemoryBudgetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BudgetStore for MemoryBudgetStore {
    async fn get(&self, key: &str) -> Result<Option<(BudgetRecord, Version)>, StoreError> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    async fn put_if(
        &self,
        key: &str,
        expected: Option<Version>,
        next: &BudgetRecord,
    ) -> Result<bool, StoreError> {
        // the entry holds the shard lock, so check-then-write is atomic per key
        match self.records.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get().1;
                if expected == Some(current) {
                    occupied.insert((next.clone(), current + 1));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                if expected.is_none() {
                    vacant.insert((next.clone(), 1));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }
}

#[derive(Serialize)]
struct WireRecord {
    remaining: u32,
    reset_at_ms: i64,
}

#[derive(Deserialize)]
struct WireRecordWithVersion {
    remaining: u32,
    reset_at_ms: i64,
    version: Version,
}

// HTTP key-value client for an external budget store. Conditional PUTs
// carry the last seen version as If-Match, so the CAS contract holds
// across processes sharing one store.
pub struct RemoteBudgetStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RemoteBudgetStore {
    pub fn new(base_url: String, token: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn record_url(&self, key: &str) -> String {
        format!("{}/records/{}", self.base_url, key)
    }
}

#[async_trait]
impl BudgetStore for RemoteBudgetStore {
    async fn get(&self, key: &str) -> Result<Option<(BudgetRecord, Version)>, StoreError> {
        let mut request = self.client.get(self.record_url(key));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StoreError::Unavailable(format!(
                "get returned {}",
                response.status()
            )));
        }

        let body: WireRecordWithVersion = response
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Some((
            BudgetRecord {
                remaining: body.remaining,
                reset_at_ms: body.reset_at_ms,
            },
            body.version,
        )))
    }

    async fn put_if(
        &self,
        key: &str,
        expected: Option<Version>,
        next: &BudgetRecord,
    ) -> Result<bool, StoreError> {
        let mut request = self.client.put(self.record_url(key)).json(&WireRecord {
            remaining: next.remaining,
            reset_at_ms: next.reset_at_ms,
        });

        request = match expected {
            Some(version) => request.header(IF_MATCH, format!("\"{}\"", version)),
            None => request.header(IF_NONE_MATCH, "*"),
        };
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status == StatusCode::PRECONDITION_FAILED {
            Ok(false)
        } else {
            Err(StoreError::Unavailable(format!("put returned {}", status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(remaining: u32) -> BudgetRecord {
        BudgetRecord {
            remaining,
            reset_at_ms: 1_000,
        }
    }

    #[tokio::test]
    async fn get_missing_key_returns_none() {
        let store = MemoryBudgetStore::new();
        assert!(store.get("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_if_creates_only_when_absent() {
        let store = MemoryBudgetStore::new();

        assert!(store.put_if("k", None, &record(5)).await.unwrap());
        // second create must lose: the key exists now
        assert!(!store.put_if("k", None, &record(5)).await.unwrap());

        let (stored, version) = store.get("k").await.unwrap().unwrap();
        assert_eq!(stored.remaining, 5);
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn put_if_rejects_stale_version() {
        let store = MemoryBudgetStore::new();
        store.put_if("k", None, &record(5)).await.unwrap();

        let (_, version) = store.get("k").await.unwrap().unwrap();
        assert!(store.put_if("k", Some(version), &record(4)).await.unwrap());

        // the old version is stale after that write
        assert!(!store.put_if("k", Some(version), &record(3)).await.unwrap());

        let (stored, _) = store.get("k").await.unwrap().unwrap();
        assert_eq!(stored.remaining, 4);
    }

    #[tokio::test]
    async fn version_advances_on_every_write() {
        let store = MemoryBudgetStore::new();
        store.put_if("k", None, &record(5)).await.unwrap();

        for expected in 1u64..4 {
            let (_, version) = store.get("k").await.unwrap().unwrap();
            assert_eq!(version, expected);
            assert!(store.put_if("k", Some(version), &record(5)).await.unwrap());
        }
    }

    #[tokio::test]
    async fn keys_are_stored_independently() {
        let store = MemoryBudgetStore::new();
        store.put_if("a", None, &record(1)).await.unwrap();
        store.put_if("b", None, &record(7)).await.unwrap();

        let (a, _) = store.get("a").await.unwrap().unwrap();
        let (b, _) = store.get("b").await.unwrap().unwrap();
        assert_eq!(a.remaining, 1);
        assert_eq!(b.remaining, 7);
    }
}
