pub mod ledger;

pub use ledger::{LedgerStore, VisitLedger, VisitOutcome, VisitRecord};
