use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use patrol_core::{Config, CredentialSet, Error, Result};
use patrol_session::{BrowserCapability, SessionRunner, VisitResult};
use patrol_storage::VisitLedger;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, error, info, warn};

use crate::plan::next_eligible;

/// How long to nap when every account is mid-visit and nothing can be
/// scheduled (only possible after a crash left in-progress records).
const RESELECT_NAP: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct DriverTiming {
    pub min_delay: chrono::Duration,
    pub stale_after: chrono::Duration,
    pub min_dwell: Duration,
    pub step_timeout: Duration,
}

impl From<&Config> for DriverTiming {
    fn from(config: &Config) -> Self {
        Self {
            min_delay: config.min_delay(),
            stale_after: config.stale_after(),
            min_dwell: config.min_dwell(),
            step_timeout: config.step_timeout(),
        }
    }
}

/// Long-running coordinator: pick the next eligible account, wait until it
/// is due, run one visit, repeat. One account's failure never stops the
/// rotation; shutdown lets an in-flight visit finish first.
pub struct DriverService {
    credentials: CredentialSet,
    ledger: Arc<VisitLedger>,
    capability: Arc<dyn BrowserCapability>,
    runner: SessionRunner,
    timing: DriverTiming,
}

impl DriverService {
    pub fn new(
        credentials: CredentialSet,
        ledger: Arc<VisitLedger>,
        capability: Arc<dyn BrowserCapability>,
        timing: DriverTiming,
    ) -> Result<Self> {
        if credentials.is_empty() {
            return Err(Error::Config("no accounts configured".to_string()));
        }
        let runner = SessionRunner::new(ledger.clone(), timing.min_dwell, timing.step_timeout);
        Ok(Self {
            credentials,
            ledger,
            capability,
            runner,
            timing,
        })
    }

    pub async fn run_loop(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(accounts = self.credentials.len(), "DriverService started");

        loop {
            let records = self.ledger.snapshot().await;
            let plans = next_eligible(
                &self.credentials,
                &records,
                Utc::now(),
                self.timing.min_delay,
                self.timing.stale_after,
            );

            let head = match plans.into_iter().next() {
                Some(head) => head,
                None => {
                    debug!("every account is mid-visit, napping");
                    tokio::select! {
                        _ = tokio::time::sleep(RESELECT_NAP) => {}
                        _ = shutdown.recv() => {
                            info!("DriverService shutting down");
                            break;
                        }
                    }
                    continue;
                }
            };

            let now_ms = Utc::now().timestamp_millis();
            if head.eligible_at_ms > now_ms {
                let wait = Duration::from_millis((head.eligible_at_ms - now_ms) as u64);
                info!(
                    account = %head.account,
                    wait_secs = wait.as_secs(),
                    "waiting for next eligible account"
                );
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = shutdown.recv() => {
                        info!("DriverService shutting down");
                        break;
                    }
                }
            }

            let Some(credential) = self.credentials.get(&head.account) else {
                error!(account = %head.account, "planned account missing from pool");
                continue;
            };

            debug!(account = %credential.id, "starting visit");
            match self.runner.run(credential, self.capability.as_ref()).await {
                Ok(VisitResult::Success) => {}
                Ok(VisitResult::Failed(reason)) => {
                    warn!(account = %credential.id, reason = %reason, "visit failed, rotation continues");
                }
                Err(e) => {
                    error!(account = %credential.id, error = %e, "visit bookkeeping failed");
                }
            }

            // A shutdown requested mid-visit is honored here, after the
            // ledger has reached a terminal state.
            match shutdown.try_recv() {
                Err(TryRecvError::Empty) => {}
                _ => {
                    info!("DriverService shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use patrol_core::Paths;
    use patrol_session::ScopedSession;
    use patrol_storage::VisitOutcome;
    use std::sync::Mutex;
    use tokio::time::Instant;

    struct RecordingBrowser {
        visits: Arc<Mutex<Vec<(String, Instant)>>>,
    }

    struct RecordingSession {
        visits: Arc<Mutex<Vec<(String, Instant)>>>,
    }

    #[async_trait]
    impl BrowserCapability for RecordingBrowser {
        async fn open_session(&self) -> Result<Box<dyn ScopedSession>> {
            Ok(Box::new(RecordingSession {
                visits: self.visits.clone(),
            }))
        }
    }

    #[async_trait]
    impl ScopedSession for RecordingSession {
        async fn authenticate(&mut self, secret: &str) -> Result<()> {
            self.visits
                .lock()
                .unwrap()
                .push((secret.to_string(), Instant::now()));
            Ok(())
        }

        async fn perform_visit(&mut self) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(())
        }

        async fn close(&mut self) {}
    }

    // Real-clock test with small durations: the plan computation reads the
    // wall clock, so a paused runtime would never move eligibility forward.
    #[tokio::test]
    async fn test_rotation_spaces_visits_per_account() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(VisitLedger::new(
            Paths::with_base(dir.path().to_path_buf()),
            chrono::Duration::seconds(60),
        ));
        let credentials = CredentialSet::load(vec![
            ("a".to_string(), "secret_a".to_string()),
            ("b".to_string(), "secret_b".to_string()),
        ])
        .unwrap();

        let visits = Arc::new(Mutex::new(Vec::new()));
        let capability = Arc::new(RecordingBrowser {
            visits: visits.clone(),
        });

        let timing = DriverTiming {
            min_delay: chrono::Duration::milliseconds(300),
            stale_after: chrono::Duration::seconds(60),
            min_dwell: Duration::from_millis(20),
            step_timeout: Duration::from_secs(5),
        };

        let driver = Arc::new(
            DriverService::new(credentials, ledger.clone(), capability, timing).unwrap(),
        );

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(driver.run_loop(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(900)).await;
        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("driver loop did not stop")
            .unwrap();

        let visits = visits.lock().unwrap();
        assert!(visits.len() >= 2, "expected at least one full rotation");

        // First pass walks the pool in id order.
        assert_eq!(visits[0].0, "secret_a");
        assert_eq!(visits[1].0, "secret_b");

        // Per-account spacing holds across the whole run.
        for secret in ["secret_a", "secret_b"] {
            let times: Vec<Instant> = visits
                .iter()
                .filter(|(s, _)| s == secret)
                .map(|(_, t)| *t)
                .collect();
            for pair in times.windows(2) {
                assert!(pair[1] - pair[0] >= Duration::from_millis(300));
            }
        }

        // Nothing is left mid-visit after the drain.
        for rec in ledger.snapshot().await.values() {
            assert_eq!(rec.outcome, VisitOutcome::Success);
        }
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_long_wait() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(VisitLedger::new(
            Paths::with_base(dir.path().to_path_buf()),
            chrono::Duration::seconds(60),
        ));
        // Seed a completed visit so the loop parks in a long wait.
        ledger.begin("a", Utc::now()).await.unwrap();
        ledger
            .complete("a", Utc::now(), VisitOutcome::Success)
            .await
            .unwrap();

        let credentials =
            CredentialSet::load(vec![("a".to_string(), "pw".to_string())]).unwrap();
        let capability = Arc::new(RecordingBrowser {
            visits: Arc::new(Mutex::new(Vec::new())),
        });
        let timing = DriverTiming {
            min_delay: chrono::Duration::hours(48),
            stale_after: chrono::Duration::seconds(60),
            min_dwell: Duration::from_millis(20),
            step_timeout: Duration::from_secs(5),
        };

        let driver = Arc::new(
            DriverService::new(credentials, ledger, capability, timing).unwrap(),
        );
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(driver.run_loop(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("driver loop did not stop")
            .unwrap();
    }
}
