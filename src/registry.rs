//! Presence registry: which agents exist, and which are currently alive.
//!
//! Liveness is never stored. Each record carries a `last_seen` timestamp,
//! bumped on registration, heartbeat, and frame push; readers derive
//! `online` from time since last contact at query time. A membership index
//! at a well-known key (`active_targets`) makes the fleet enumerable without
//! a store-side scan primitive.

use serde::{Deserialize, Serialize};

use crate::clock::now_ms;
use crate::store::{Store, StoreError};

/// An agent is reported online while its last contact is strictly newer
/// than this window.
pub const PRESENCE_WINDOW_MS: u64 = 120_000;

const ACTIVE_INDEX_KEY: &str = "active_targets";

fn target_key(id: &str) -> String {
    format!("target:{id}")
}

/// Stored per-target record. `online` is deliberately absent: it is derived
/// on every read, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub id: String,
    pub username: String,
    pub hostname: String,
    pub os: String,
    pub ip: String,
    /// Milliseconds since epoch of the first registration. Preserved across
    /// re-registration.
    pub first_seen: u64,
    /// Milliseconds since epoch of the most recent contact of any kind.
    pub last_seen: u64,
}

/// A target record as reported to the controller, with liveness derived.
#[derive(Debug, Clone, Serialize)]
pub struct TargetView {
    #[serde(flatten)]
    pub record: TargetRecord,
    pub online: bool,
}

/// Registration payload sent by an agent. Identity fields it cannot or does
/// not report default to `"Unknown"`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterInfo {
    #[serde(default)]
    pub target_id: String,
    pub username: Option<String>,
    pub hostname: Option<String>,
    pub os: Option<String>,
    pub ip: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("target_id must not be empty")]
    EmptyTargetId,

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn online_at(last_seen: u64, now: u64) -> bool {
    now.saturating_sub(last_seen) < PRESENCE_WINDOW_MS
}

fn unknown() -> String {
    "Unknown".to_string()
}

/// Target records plus the active-target index, over the shared store.
#[derive(Clone)]
pub struct PresenceRegistry {
    store: Store,
}

impl PresenceRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Upsert a target record and ensure it is indexed. Returns the id.
    ///
    /// Re-registration overwrites the identity fields but preserves
    /// `first_seen`. The index append is membership-checked under the index
    /// key lock, so concurrent registrations can neither duplicate an entry
    /// nor drop each other's.
    pub async fn register(&self, info: RegisterInfo) -> Result<String, RegistryError> {
        if info.target_id.is_empty() {
            return Err(RegistryError::EmptyTargetId);
        }

        let now = now_ms();
        let key = target_key(&info.target_id);
        {
            let _slot = self.store.lock(&key).await;
            let first_seen = self
                .store
                .get_json::<TargetRecord>(&key)
                .await?
                .map(|existing| existing.first_seen)
                .unwrap_or(now);
            let record = TargetRecord {
                id: info.target_id.clone(),
                username: info.username.unwrap_or_else(unknown),
                hostname: info.hostname.unwrap_or_else(unknown),
                os: info.os.unwrap_or_else(unknown),
                ip: info.ip.unwrap_or_else(unknown),
                first_seen,
                last_seen: now,
            };
            self.store.put_json(&key, &record).await?;
        }

        {
            let _index = self.store.lock(ACTIVE_INDEX_KEY).await;
            let mut ids: Vec<String> = self
                .store
                .get_json(ACTIVE_INDEX_KEY)
                .await?
                .unwrap_or_default();
            if !ids.iter().any(|id| id == &info.target_id) {
                ids.push(info.target_id.clone());
                self.store.put_json(ACTIVE_INDEX_KEY, &ids).await?;
            }
        }

        tracing::debug!(target_id = %info.target_id, "target registered");
        Ok(info.target_id)
    }

    /// Bump `last_seen` for `id`. Returns `true` if a record existed.
    ///
    /// A heartbeat for an unknown id is a successful no-op, not an error;
    /// the returned flag lets the HTTP layer report it without failing the
    /// agent's polling loop.
    pub async fn heartbeat(&self, id: &str) -> Result<bool, StoreError> {
        let key = target_key(id);
        let _slot = self.store.lock(&key).await;
        match self.store.get_json::<TargetRecord>(&key).await? {
            Some(mut record) => {
                record.last_seen = now_ms();
                self.store.put_json(&key, &record).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// All indexed targets that still resolve to a record, liveness derived,
    /// newest contact first. Ties break by id so the ordering is
    /// deterministic.
    ///
    /// An index entry without a record ("unknown target") is skipped, not an
    /// error: the index is append-only and may outlive records.
    pub async fn list(&self) -> Result<Vec<TargetView>, StoreError> {
        let ids: Vec<String> = self
            .store
            .get_json(ACTIVE_INDEX_KEY)
            .await?
            .unwrap_or_default();

        let now = now_ms();
        let mut targets = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.store.get_json::<TargetRecord>(&target_key(&id)).await? {
                let online = online_at(record.last_seen, now);
                targets.push(TargetView { record, online });
            }
        }

        targets.sort_by(|a, b| {
            b.record
                .last_seen
                .cmp(&a.record.last_seen)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        Ok(targets)
    }
}
