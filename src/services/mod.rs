pub mod lifecycle;
pub mod recovery;
pub mod stats;

pub use lifecycle::TransactionLifecycle;
pub use recovery::{RecoveryScheduler, SweepOutcome};
pub use stats::{OldestPending, PendingStats, StatsReporter};
