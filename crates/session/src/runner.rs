use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use patrol_core::{Credential, Error, Result};
use patrol_storage::{VisitLedger, VisitOutcome};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::browser::{BrowserCapability, ScopedSession};
use crate::dwell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    AuthFailure,
    NavigationFailure,
    Timeout,
    Unknown,
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailReason::AuthFailure => "auth_failure",
            FailReason::NavigationFailure => "navigation_failure",
            FailReason::Timeout => "timeout",
            FailReason::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitResult {
    Success,
    Failed(FailReason),
}

/// Orchestrates one visit end-to-end for one account: ledger begin, scoped
/// browser session, authentication, dwell-controlled page interaction,
/// ledger complete. The ledger sees exactly one InProgress -> terminal
/// transition per call; per-visit failures come back as data, not errors.
pub struct SessionRunner {
    ledger: Arc<VisitLedger>,
    min_dwell: Duration,
    step_timeout: Duration,
}

impl SessionRunner {
    pub fn new(ledger: Arc<VisitLedger>, min_dwell: Duration, step_timeout: Duration) -> Self {
        Self {
            ledger,
            min_dwell,
            step_timeout,
        }
    }

    pub async fn run(
        &self,
        credential: &Credential,
        capability: &dyn BrowserCapability,
    ) -> Result<VisitResult> {
        self.ledger.begin(&credential.id, Utc::now()).await?;

        let result = self.attempt(credential, capability).await;

        let outcome = match result {
            Ok(()) => VisitOutcome::Success,
            Err(_) => VisitOutcome::Failed,
        };
        self.ledger
            .complete(&credential.id, Utc::now(), outcome)
            .await?;

        match result {
            Ok(()) => {
                info!(account = %credential.id, "visit completed");
                Ok(VisitResult::Success)
            }
            Err(reason) => {
                warn!(account = %credential.id, reason = %reason, "visit failed");
                Ok(VisitResult::Failed(reason))
            }
        }
    }

    async fn attempt(
        &self,
        credential: &Credential,
        capability: &dyn BrowserCapability,
    ) -> std::result::Result<(), FailReason> {
        let session_start = Instant::now();

        let mut session = match timeout(self.step_timeout, capability.open_session()).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                debug!(account = %credential.id, error = %e, "could not open browser session");
                return Err(FailReason::Unknown);
            }
            Err(_) => return Err(FailReason::Timeout),
        };

        let result = self.drive(session.as_mut(), credential, session_start).await;

        // The session is released on every path, success or not.
        session.close().await;
        result
    }

    async fn drive(
        &self,
        session: &mut dyn ScopedSession,
        credential: &Credential,
        session_start: Instant,
    ) -> std::result::Result<(), FailReason> {
        match timeout(self.step_timeout, session.authenticate(credential.secret())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(account = %credential.id, error = %e, "authentication failed");
                return Err(classify(e, FailReason::AuthFailure));
            }
            Err(_) => return Err(FailReason::Timeout),
        }

        let step_timeout = self.step_timeout;
        let visit = async {
            match timeout(step_timeout, session.perform_visit()).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    debug!(account = %credential.id, error = %e, "page interaction failed");
                    Err(classify(e, FailReason::NavigationFailure))
                }
                Err(_) => Err(FailReason::Timeout),
            }
        };
        dwell::enforce_minimum(session_start, self.min_dwell, visit).await
    }
}

fn classify(err: Error, step_default: FailReason) -> FailReason {
    match err {
        Error::Timeout(_) => FailReason::Timeout,
        _ => step_default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use patrol_core::Paths;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::time::sleep;

    #[derive(Clone, Copy)]
    enum Script {
        VisitOk { visit_time: Duration },
        AuthFail,
        VisitFail { after: Duration },
        VisitHang,
    }

    struct FakeBrowser {
        script: Script,
        closed: Arc<AtomicBool>,
    }

    struct FakeSession {
        script: Script,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl BrowserCapability for FakeBrowser {
        async fn open_session(&self) -> Result<Box<dyn ScopedSession>> {
            Ok(Box::new(FakeSession {
                script: self.script,
                closed: self.closed.clone(),
            }))
        }
    }

    #[async_trait]
    impl ScopedSession for FakeSession {
        async fn authenticate(&mut self, _secret: &str) -> Result<()> {
            match self.script {
                Script::AuthFail => Err(Error::Session("bad credentials".to_string())),
                _ => Ok(()),
            }
        }

        async fn perform_visit(&mut self) -> Result<()> {
            match self.script {
                Script::VisitOk { visit_time } => {
                    sleep(visit_time).await;
                    Ok(())
                }
                Script::VisitFail { after } => {
                    sleep(after).await;
                    Err(Error::Session("interaction broke".to_string()))
                }
                Script::VisitHang => {
                    sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
                Script::AuthFail => Ok(()),
            }
        }

        async fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn fixture(dir: &tempfile::TempDir, script: Script) -> (Arc<VisitLedger>, SessionRunner, FakeBrowser, Credential) {
        let ledger = Arc::new(VisitLedger::new(
            Paths::with_base(dir.path().to_path_buf()),
            chrono::Duration::hours(1),
        ));
        let runner = SessionRunner::new(
            ledger.clone(),
            Duration::from_secs(6),
            Duration::from_secs(30),
        );
        let closed = Arc::new(AtomicBool::new(false));
        let browser = FakeBrowser {
            script,
            closed: closed.clone(),
        };
        let credential = patrol_core::CredentialSet::load(vec![(
            "a".to_string(),
            "pw".to_string(),
        )])
        .unwrap()
        .get("a")
        .unwrap()
        .clone();
        (ledger, runner, browser, credential)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_visit_holds_min_dwell() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, runner, browser, cred) = fixture(
            &dir,
            Script::VisitOk {
                visit_time: Duration::from_secs(1),
            },
        );

        let start = Instant::now();
        let result = runner.run(&cred, &browser).await.unwrap();

        assert_eq!(result, VisitResult::Success);
        assert!(start.elapsed() >= Duration::from_secs(6));
        assert!(browser.closed.load(Ordering::SeqCst));
        assert_eq!(
            ledger.get("a").await.unwrap().outcome,
            VisitOutcome::Success
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_visit_skips_dwell_padding() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, runner, browser, cred) = fixture(
            &dir,
            Script::VisitFail {
                after: Duration::from_secs(1),
            },
        );

        let start = Instant::now();
        let result = runner.run(&cred, &browser).await.unwrap();

        assert_eq!(result, VisitResult::Failed(FailReason::NavigationFailure));
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(browser.closed.load(Ordering::SeqCst));
        assert_eq!(ledger.get("a").await.unwrap().outcome, VisitOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_releases_session() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, runner, browser, cred) = fixture(&dir, Script::AuthFail);

        let result = runner.run(&cred, &browser).await.unwrap();

        assert_eq!(result, VisitResult::Failed(FailReason::AuthFailure));
        assert!(browser.closed.load(Ordering::SeqCst));
        assert_eq!(ledger.get("a").await.unwrap().outcome, VisitOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_interaction_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, runner, browser, cred) = fixture(&dir, Script::VisitHang);

        let result = runner.run(&cred, &browser).await.unwrap();

        assert_eq!(result, VisitResult::Failed(FailReason::Timeout));
        assert!(browser.closed.load(Ordering::SeqCst));
        assert_eq!(ledger.get("a").await.unwrap().outcome, VisitOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_is_terminal_after_every_run() {
        let dir = tempfile::tempdir().unwrap();
        let (_ledger, runner, browser, cred) = fixture(&dir, Script::AuthFail);

        runner.run(&cred, &browser).await.unwrap();
        // A second run books the account again without a conflict, so the
        // first run cannot have left the record in progress.
        let result = runner.run(&cred, &browser).await.unwrap();
        assert_eq!(result, VisitResult::Failed(FailReason::AuthFailure));
    }
}
