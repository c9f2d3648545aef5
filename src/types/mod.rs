//! Plain data types shared by the migration services.
//!
//! - `command.rs`: external command lines and their renderings
//! - `stage.rs`: migration steps and the linear stage progression

pub mod command;
pub mod stage;

pub use command::{Arg, CommandLine, Quote};
pub use stage::{MigrationStage, Step};
