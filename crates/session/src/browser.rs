use async_trait::async_trait;
use patrol_core::Result;

/// Browser-driving collaborator. The engine never looks inside it; it only
/// needs a way to open a session, log in, and run one page interaction.
#[async_trait]
pub trait BrowserCapability: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn ScopedSession>>;
}

/// One live browser session, exclusively owned by the runner that opened
/// it for the duration of one visit.
#[async_trait]
pub trait ScopedSession: Send {
    /// Log in with the account's secret material.
    async fn authenticate(&mut self, secret: &str) -> Result<()>;

    /// Drive the page interaction for one visit.
    async fn perform_visit(&mut self) -> Result<()>;

    /// Release the underlying session. Always callable, idempotent.
    async fn close(&mut self);
}
