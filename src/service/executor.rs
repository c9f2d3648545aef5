use crate::error::MigrateError;
use crate::types::command::CommandLine;
use std::future::Future;
use std::io;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::debug;

/// What an external command (or pipeline) did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Program whose status is reported; the first failing stage of a pipeline.
    pub program: String,
    pub code: Option<i32>,
    pub stderr: String,
    pub elapsed: Duration,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into [`MigrateError::CommandFailed`].
    pub fn into_result(self) -> Result<Self, MigrateError> {
        if self.success() {
            Ok(self)
        } else {
            Err(MigrateError::CommandFailed {
                program: self.program,
                code: self.code,
                stderr: self.stderr,
            })
        }
    }
}

/// Runs external commands for the migration steps.
pub trait Executor: Send + Sync {
    /// Run `cmd` to completion. A process that starts and exits non-zero is
    /// still `Ok`; only failing to start it is an error.
    fn run(
        &self,
        cmd: &CommandLine,
    ) -> impl Future<Output = Result<CommandOutcome, MigrateError>> + Send;
}

/// [`Executor`] backed by `tokio::process`. Never goes through a shell.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

type StageWait = (String, JoinHandle<io::Result<Output>>);

impl Executor for ProcessExecutor {
    async fn run(&self, cmd: &CommandLine) -> Result<CommandOutcome, MigrateError> {
        let started = Instant::now();

        // Children stay owned here until every stage has started, so an early
        // return drops them and `kill_on_drop` reaps the ones already running.
        let (head, mut upstream) = spawn_stage(cmd, None).await?;
        let mut tail: Vec<(String, Child)> = Vec::new();
        let mut next = cmd.pipe_to.as_deref();
        while let Some(stage) = next {
            let (child, out) = spawn_stage(stage, upstream.take()).await?;
            tail.push(child);
            upstream = out;
            next = stage.pipe_to.as_deref();
        }

        let head = wait_in_background(head);
        let tail: Vec<StageWait> = tail.into_iter().map(wait_in_background).collect();

        let mut reported = match join_stage(head).await {
            Ok(done) => done,
            Err(e) => {
                abort_all(tail);
                return Err(e);
            }
        };
        let mut tail = tail.into_iter();
        while let Some(wait) = tail.next() {
            let done = match join_stage(wait).await {
                Ok(done) => done,
                Err(e) => {
                    abort_all(tail);
                    return Err(e);
                }
            };
            // The first failing stage wins; otherwise report the last one.
            if reported.1.status.success() {
                reported = done;
            }
        }

        let (program, output) = reported;
        Ok(CommandOutcome {
            program,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            elapsed: started.elapsed(),
        })
    }
}

/// Start one pipeline stage. Returns its stdout when it feeds the next stage.
async fn spawn_stage(
    stage: &CommandLine,
    upstream: Option<ChildStdout>,
) -> Result<((String, Child), Option<ChildStdout>), MigrateError> {
    let spawn_err = |source: io::Error| MigrateError::Spawn {
        program: stage.program.clone(),
        source,
    };

    let stdin = match (upstream, &stage.stdin) {
        (Some(pipe), _) => {
            let stdio: Stdio = pipe.try_into().map_err(spawn_err)?;
            stdio
        }
        (None, Some(path)) => Stdio::from(open_for_read(path).await?),
        (None, None) => Stdio::null(),
    };
    let piped_out = stage.pipe_to.is_some() && stage.stdout.is_none();
    let stdout = match &stage.stdout {
        Some(path) => Stdio::from(create_for_write(path).await?),
        None if piped_out => Stdio::piped(),
        None => Stdio::null(),
    };

    debug!(program = %stage.program, args = stage.args.len(), "spawning");
    let mut child = Command::new(&stage.program)
        .args(stage.argv())
        .stdin(stdin)
        .stdout(stdout)
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(spawn_err)?;

    let out = if piped_out { child.stdout.take() } else { None };
    Ok(((stage.program.clone(), child), out))
}

fn wait_in_background((program, child): (String, Child)) -> StageWait {
    (program, tokio::spawn(child.wait_with_output()))
}

async fn join_stage((program, handle): StageWait) -> Result<(String, Output), MigrateError> {
    match handle.await.map_err(io::Error::other).and_then(|r| r) {
        Ok(output) => Ok((program, output)),
        Err(source) => Err(MigrateError::Spawn { program, source }),
    }
}

/// Cancelling a wait task drops its `Child`, which kills the process.
fn abort_all(waits: impl IntoIterator<Item = StageWait>) {
    for (_, handle) in waits {
        handle.abort();
    }
}

async fn open_for_read(path: &Path) -> Result<std::fs::File, MigrateError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| MigrateError::io(path, e))?;
    Ok(file.into_std().await)
}

async fn create_for_write(path: &Path) -> Result<std::fs::File, MigrateError> {
    let file = tokio::fs::File::create(path)
        .await
        .map_err(|e| MigrateError::io(path, e))?;
    Ok(file.into_std().await)
}
