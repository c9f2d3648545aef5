use crate::types::stage::{MigrationStage, Step};
use std::io;
use std::path::PathBuf;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum MigrateError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` exited with {}: {stderr}", exit_label(*code))]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("cannot run the {step} step from stage {stage}")]
    OutOfOrder { step: Step, stage: MigrationStage },

    #[error("{step} step failed (last completed stage: {reached}): {source}")]
    Step {
        step: Step,
        reached: MigrationStage,
        #[source]
        source: Box<MigrateError>,
    },
}

impl From<figment::Error> for MigrateError {
    fn from(e: figment::Error) -> Self {
        MigrateError::Config(Box::new(e))
    }
}

impl MigrateError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MigrateError::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap an error raised inside a step with where the migration stopped.
    pub fn in_step(self, step: Step, reached: MigrationStage) -> Self {
        MigrateError::Step {
            step,
            reached,
            source: Box::new(self),
        }
    }

    /// Stage the migration had completed when it aborted, if known.
    pub fn stage_reached(&self) -> Option<MigrationStage> {
        match self {
            MigrateError::Step { reached, .. } => Some(*reached),
            _ => None,
        }
    }
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "no status (terminated by signal)".to_string(),
    }
}
