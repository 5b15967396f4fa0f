use chrono::{DateTime, Duration, Utc};
use patrol_core::CredentialSet;
use patrol_storage::{VisitOutcome, VisitRecord};
use std::collections::HashMap;

/// When an account may next run. Computed fresh each cycle from the
/// ledger; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulePlan {
    pub account: String,
    pub eligible_at_ms: i64,
}

impl SchedulePlan {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.eligible_at_ms <= now.timestamp_millis()
    }
}

/// Orders the account pool by earliest permissible next visit.
///
/// An account with a completed visit becomes eligible `min_delay` after its
/// last success; one that has never completed is eligible immediately
/// (failures neither shorten nor extend the wait). An account mid-visit is
/// excluded until its in-progress record outlives `stale_after`, after
/// which it is presumed crashed and scheduled as if that attempt failed.
/// Ties are broken by account id, so the ordering is reproducible.
pub fn next_eligible(
    credentials: &CredentialSet,
    records: &HashMap<String, VisitRecord>,
    now: DateTime<Utc>,
    min_delay: Duration,
    stale_after: Duration,
) -> Vec<SchedulePlan> {
    let now_ms = now.timestamp_millis();
    let mut plans = Vec::with_capacity(credentials.len());

    for cred in credentials.iter() {
        let record = records.get(&cred.id);

        if let Some(rec) = record {
            if rec.outcome == VisitOutcome::InProgress
                && now_ms - rec.last_attempted_at_ms < stale_after.num_milliseconds()
            {
                continue;
            }
        }

        let eligible_at_ms = match record.and_then(|r| r.last_completed_at_ms) {
            Some(done_ms) => done_ms + min_delay.num_milliseconds(),
            None => now_ms,
        };

        plans.push(SchedulePlan {
            account: cred.id.clone(),
            eligible_at_ms,
        });
    }

    plans.sort_by(|a, b| {
        a.eligible_at_ms
            .cmp(&b.eligible_at_ms)
            .then_with(|| a.account.cmp(&b.account))
    });
    plans
}
