pub mod browser;
pub mod dwell;
pub mod runner;
pub mod sim;

pub use browser::{BrowserCapability, ScopedSession};
pub use runner::{FailReason, SessionRunner, VisitResult};
pub use sim::SimulatedBrowser;
