pub mod cli;
pub mod config;
pub mod error;
pub mod service;
pub mod types;

pub use config::Config;
pub use error::MigrateError;
pub use service::{MigrationPlan, MigrationRunner, ProcessExecutor};
