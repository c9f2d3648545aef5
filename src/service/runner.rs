use crate::config::Config;
use crate::error::MigrateError;
use crate::service::artifacts::DumpFiles;
use crate::service::executor::{CommandOutcome, Executor};
use crate::service::plan::{MigrationPlan, TranscodePlan};
use crate::service::transcode::{self, TranscodeReport};
use crate::types::command::CommandLine;
use crate::types::stage::{MigrationStage, Step};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Result of a completed migration.
#[derive(Debug, Clone)]
pub struct MigrationSummary {
    /// Present when the builtin transcoder ran.
    pub transcode: Option<TranscodeReport>,
    /// Dump files left on disk for the operator to delete.
    pub retained: Option<DumpFiles>,
    pub elapsed: Duration,
}

/// Runs dump -> transcode -> recreate -> reload, aborting on the first failure.
pub struct MigrationRunner<E> {
    plan: MigrationPlan,
    files: DumpFiles,
    keep_dumps: bool,
    database: String,
    executor: E,
    stage: MigrationStage,
}

impl<E: Executor> MigrationRunner<E> {
    pub fn new(cfg: &Config, executor: E) -> Self {
        Self {
            plan: MigrationPlan::from_config(cfg),
            files: DumpFiles::from_config(cfg),
            keep_dumps: cfg.keep_dumps,
            database: cfg.database.clone(),
            executor,
            stage: MigrationStage::Start,
        }
    }

    pub fn stage(&self) -> MigrationStage {
        self.stage
    }

    pub fn plan(&self) -> &MigrationPlan {
        &self.plan
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run all four steps, then retain or delete the dump files.
    pub async fn run(&mut self) -> Result<MigrationSummary, MigrateError> {
        let started = Instant::now();
        self.dump().await?;
        let report = self.transcode().await?;
        self.recreate().await?;
        self.reload().await?;

        let retained = if self.keep_dumps {
            Some(self.files.clone())
        } else {
            self.files.remove().await?;
            None
        };

        Ok(MigrationSummary {
            transcode: report,
            retained,
            elapsed: started.elapsed(),
        })
    }

    /// Export the source database as Latin-1 into the first dump file.
    pub async fn dump(&mut self) -> Result<CommandOutcome, MigrateError> {
        self.begin(Step::Dump)?;
        let cmd = self.plan.dump.clone();
        let outcome = self.exec(Step::Dump, &cmd).await?;
        self.finish(Step::Dump);
        Ok(outcome)
    }

    /// Produce the UTF-8 dump. Returns counters when the builtin transcoder ran.
    pub async fn transcode(&mut self) -> Result<Option<TranscodeReport>, MigrateError> {
        self.begin(Step::Transcode)?;
        let report = match self.plan.transcode.clone() {
            TranscodePlan::Builtin { src, dst, fixup } => {
                let report = transcode::transcode_file(&src, &dst, fixup)
                    .await
                    .map_err(|e| e.in_step(Step::Transcode, self.stage))?;
                info!(
                    lines = report.lines,
                    bytes_in = report.bytes_in,
                    bytes_out = report.bytes_out,
                    rewritten = report.lines_rewritten,
                    "transcoded dump"
                );
                Some(report)
            }
            TranscodePlan::External(cmd) => {
                self.exec(Step::Transcode, &cmd).await?;
                None
            }
        };
        self.finish(Step::Transcode);
        Ok(report)
    }

    /// Drop the database and create it empty with a UTF-8 charset.
    pub async fn recreate(&mut self) -> Result<(), MigrateError> {
        self.begin(Step::Recreate)?;
        let [drop_db, create_db] = self.plan.recreate.clone();
        warn!(database = %self.database, "dropping database");
        self.exec(Step::Recreate, &drop_db).await?;
        if let Err(e) = self.exec(Step::Recreate, &create_db).await {
            error!(
                database = %self.database,
                "database was dropped but could not be created; reload {} manually",
                self.files.utf8.display()
            );
            return Err(e);
        }
        self.finish(Step::Recreate);
        Ok(())
    }

    /// Import the UTF-8 dump into the recreated database.
    pub async fn reload(&mut self) -> Result<CommandOutcome, MigrateError> {
        self.begin(Step::Reload)?;
        let cmd = self.plan.reload.clone();
        let outcome = self.exec(Step::Reload, &cmd).await?;
        self.finish(Step::Reload);
        Ok(outcome)
    }

    fn begin(&self, step: Step) -> Result<(), MigrateError> {
        if self.stage.next_step() != Some(step) {
            return Err(MigrateError::OutOfOrder {
                step,
                stage: self.stage,
            });
        }
        info!("{}...", step.progress_label());
        Ok(())
    }

    fn finish(&mut self, step: Step) {
        self.stage = step.completes();
        info!(stage = %self.stage, "{}... done", step.progress_label());
    }

    async fn exec(&self, step: Step, cmd: &CommandLine) -> Result<CommandOutcome, MigrateError> {
        let outcome = self
            .executor
            .run(cmd)
            .await
            .and_then(CommandOutcome::into_result)
            .map_err(|e| e.in_step(step, self.stage))?;
        info!(
            program = %outcome.program,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "command finished"
        );
        if !outcome.stderr.is_empty() {
            warn!(program = %outcome.program, stderr = %outcome.stderr, "command wrote to stderr");
        }
        Ok(outcome)
    }
}
