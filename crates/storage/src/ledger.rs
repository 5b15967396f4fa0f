use chrono::{DateTime, Utc};
use patrol_core::{Error, Paths, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VisitOutcome {
    InProgress,
    Success,
    Failed,
}

impl VisitOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VisitOutcome::InProgress)
    }
}

/// One row per account. `last_completed_at_ms` only moves on success, so
/// the delay computation always counts from the last *successful* visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitRecord {
    pub account: String,
    pub last_attempted_at_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_completed_at_ms: Option<i64>,
    pub outcome: VisitOutcome,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerStore {
    pub version: u32,
    pub records: Vec<VisitRecord>,
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self {
            version: 1,
            records: Vec::new(),
        }
    }
}

/// Durable record of visit attempts and completions, one record per
/// account. Mutations hold the write lock across the disk write, so
/// `begin`/`complete` are atomic with respect to each other.
pub struct VisitLedger {
    paths: Paths,
    stale_after_ms: i64,
    records: Arc<RwLock<HashMap<String, VisitRecord>>>,
}

impl VisitLedger {
    pub fn new(paths: Paths, stale_after: chrono::Duration) -> Self {
        Self {
            paths,
            stale_after_ms: stale_after.num_milliseconds(),
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn load(&self) -> Result<()> {
        let path = self.paths.ledger_file();
        if !path.exists() {
            return Ok(());
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let store: LedgerStore = serde_json::from_str(&content)?;

        let mut records = self.records.write().await;
        *records = store
            .records
            .into_iter()
            .map(|r| (r.account.clone(), r))
            .collect();

        debug!(count = records.len(), "Loaded visit ledger");
        Ok(())
    }

    async fn persist(&self, records: &HashMap<String, VisitRecord>) -> Result<()> {
        let path = self.paths.ledger_file();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut rows: Vec<VisitRecord> = records.values().cloned().collect();
        rows.sort_by(|a, b| a.account.cmp(&b.account));
        let store = LedgerStore {
            version: 1,
            records: rows,
        };

        let content = serde_json::to_string_pretty(&store)?;
        tokio::fs::write(&path, content).await?;
        Ok(())
    }

    pub async fn get(&self, account: &str) -> Option<VisitRecord> {
        self.records.read().await.get(account).cloned()
    }

    pub async fn snapshot(&self) -> HashMap<String, VisitRecord> {
        self.records.read().await.clone()
    }

    /// Marks a visit as started. An account already mid-visit is a
    /// conflict unless its record has outlived the staleness threshold,
    /// in which case the crashed attempt is overwritten.
    pub async fn begin(&self, account: &str, now: DateTime<Utc>) -> Result<()> {
        let now_ms = now.timestamp_millis();
        let mut records = self.records.write().await;

        let prior_completed = match records.get(account) {
            Some(rec) if rec.outcome == VisitOutcome::InProgress => {
                let age_ms = now_ms - rec.last_attempted_at_ms;
                if age_ms < self.stale_after_ms {
                    return Err(Error::Conflict(format!(
                        "account '{}' already has a visit in progress",
                        account
                    )));
                }
                warn!(
                    account = %account,
                    age_secs = age_ms / 1000,
                    "overwriting stale in-progress record"
                );
                rec.last_completed_at_ms
            }
            Some(rec) => rec.last_completed_at_ms,
            None => None,
        };

        records.insert(
            account.to_string(),
            VisitRecord {
                account: account.to_string(),
                last_attempted_at_ms: now_ms,
                last_completed_at_ms: prior_completed,
                outcome: VisitOutcome::InProgress,
            },
        );

        self.persist(&records).await
    }

    /// Records the terminal outcome of a visit. `last_completed_at_ms`
    /// advances only on success. Completing an already-terminal record is
    /// a no-op, so a duplicate call cannot corrupt the ledger.
    pub async fn complete(
        &self,
        account: &str,
        now: DateTime<Utc>,
        outcome: VisitOutcome,
    ) -> Result<()> {
        if !outcome.is_terminal() {
            return Err(Error::Ledger(
                "complete requires a terminal outcome".to_string(),
            ));
        }

        let mut records = self.records.write().await;
        let rec = records.get_mut(account).ok_or_else(|| {
            Error::Ledger(format!("no visit record for account '{}'", account))
        })?;

        if rec.outcome.is_terminal() {
            debug!(account = %account, "visit already completed, ignoring");
            return Ok(());
        }

        rec.outcome = outcome;
        if outcome == VisitOutcome::Success {
            rec.last_completed_at_ms = Some(now.timestamp_millis());
        }

        self.persist(&records).await
    }

    /// Drops an account's record entirely. External escape hatch for a
    /// stuck in-progress row left behind by a crash.
    pub async fn reset(&self, account: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        let removed = records.remove(account).is_some();
        if removed {
            self.persist(&records).await?;
        }
        Ok(removed)
    }
}
