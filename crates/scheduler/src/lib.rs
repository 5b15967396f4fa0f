pub mod driver;
pub mod plan;

pub use driver::{DriverService, DriverTiming};
pub use plan::{next_eligible, SchedulePlan};
