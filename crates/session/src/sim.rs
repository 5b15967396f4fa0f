use std::time::Duration;

use async_trait::async_trait;
use patrol_core::Result;
use tokio::time::sleep;
use tracing::debug;

use crate::browser::{BrowserCapability, ScopedSession};

/// Stand-in browser: every step succeeds after a short pause. This is what
/// `patrol run` drives until a real browser backend is wired in, and it
/// keeps the scheduler and ledger exercisable end-to-end.
pub struct SimulatedBrowser {
    interaction_time: Duration,
}

impl SimulatedBrowser {
    pub fn new(interaction_time: Duration) -> Self {
        Self { interaction_time }
    }
}

#[async_trait]
impl BrowserCapability for SimulatedBrowser {
    async fn open_session(&self) -> Result<Box<dyn ScopedSession>> {
        debug!("opening simulated browser session");
        Ok(Box::new(SimulatedSession {
            interaction_time: self.interaction_time,
            closed: false,
        }))
    }
}

struct SimulatedSession {
    interaction_time: Duration,
    closed: bool,
}

#[async_trait]
impl ScopedSession for SimulatedSession {
    async fn authenticate(&mut self, _secret: &str) -> Result<()> {
        sleep(Duration::from_millis(200)).await;
        Ok(())
    }

    async fn perform_visit(&mut self) -> Result<()> {
        sleep(self.interaction_time).await;
        Ok(())
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            debug!("simulated session closed");
        }
    }
}
