pub mod artifacts;
pub mod executor;
pub mod plan;
pub mod runner;
pub mod transcode;

pub use executor::{CommandOutcome, Executor, ProcessExecutor};
pub use plan::MigrationPlan;
pub use runner::{MigrationRunner, MigrationSummary};
