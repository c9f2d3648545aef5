use std::fmt;

/// One of the four migration steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Dump,
    Transcode,
    Recreate,
    Reload,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Dump, Step::Transcode, Step::Recreate, Step::Reload];

    /// Stage the migration is in once this step has completed.
    pub fn completes(self) -> MigrationStage {
        match self {
            Step::Dump => MigrationStage::Dumped,
            Step::Transcode => MigrationStage::Transcoded,
            Step::Recreate => MigrationStage::Recreated,
            Step::Reload => MigrationStage::Reloaded,
        }
    }

    /// Operator-facing progress line printed before the step runs.
    pub fn progress_label(self) -> &'static str {
        match self {
            Step::Dump => "Dumping database",
            Step::Transcode => "Converting dump to UTF8",
            Step::Recreate => "Recreating database",
            Step::Reload => "Importing UTF8 dump",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Dump => "dump",
            Step::Transcode => "transcode",
            Step::Recreate => "recreate",
            Step::Reload => "reload",
        };
        f.write_str(name)
    }
}

/// Linear progress of a migration: Start -> Dumped -> Transcoded -> Recreated -> Reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum MigrationStage {
    #[default]
    Start,
    Dumped,
    Transcoded,
    Recreated,
    Reloaded,
}

impl MigrationStage {
    /// The step that moves the migration out of this stage, if any.
    pub fn next_step(self) -> Option<Step> {
        match self {
            MigrationStage::Start => Some(Step::Dump),
            MigrationStage::Dumped => Some(Step::Transcode),
            MigrationStage::Transcoded => Some(Step::Recreate),
            MigrationStage::Recreated => Some(Step::Reload),
            MigrationStage::Reloaded => None,
        }
    }
}

impl fmt::Display for MigrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationStage::Start => "start",
            MigrationStage::Dumped => "dumped",
            MigrationStage::Transcoded => "transcoded",
            MigrationStage::Recreated => "recreated",
            MigrationStage::Reloaded => "reloaded",
        };
        f.write_str(name)
    }
}
