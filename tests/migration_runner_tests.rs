use mysql_charset_migrate::config::{CharsetFixup, Config, Transcoder};
use mysql_charset_migrate::service::executor::{CommandOutcome, Executor};
use mysql_charset_migrate::types::{CommandLine, MigrationStage, Step};
use mysql_charset_migrate::{MigrateError, MigrationRunner};
use std::{
    fs,
    path::PathBuf,
    sync::Mutex,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Records every command and fakes mysqldump output when stdout goes to a file.
struct RecordingExecutor {
    calls: Mutex<Vec<String>>,
    dump_body: Vec<u8>,
    fail_on: Option<(usize, i32)>,
}

impl RecordingExecutor {
    fn new(dump_body: &[u8]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            dump_body: dump_body.to_vec(),
            fail_on: None,
        }
    }

    fn failing_at(mut self, call: usize, code: i32) -> Self {
        self.fail_on = Some((call, code));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }
}

impl Executor for RecordingExecutor {
    async fn run(&self, cmd: &CommandLine) -> Result<CommandOutcome, MigrateError> {
        let index = {
            let mut calls = self.calls.lock().expect("calls lock poisoned");
            calls.push(cmd.render());
            calls.len() - 1
        };
        if let Some(out) = &cmd.stdout {
            fs::write(out, &self.dump_body).expect("failed to write fake dump");
        }
        let code = match self.fail_on {
            Some((at, code)) if at == index => code,
            _ => 0,
        };
        Ok(CommandOutcome {
            program: cmd.program.clone(),
            code: Some(code),
            stderr: if code == 0 {
                String::new()
            } else {
                "ERROR 1007 (HY000): Can't create database".to_string()
            },
            elapsed: Duration::from_millis(1),
        })
    }
}

fn temp_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut dir = std::env::temp_dir();
    dir.push(format!(
        "mysql-charset-migrate-{tag}-{}-{}",
        std::process::id(),
        nanos
    ));
    fs::create_dir_all(&dir).expect("failed to create temp dir");
    dir
}

fn shop_config(dir: &PathBuf) -> Config {
    Config {
        database: "shop_db".to_string(),
        user: "admin".to_string(),
        password: "secret".to_string(),
        latin1_dump: dir.join("latin1_dump.sql"),
        utf8_dump: dir.join("utf8_dump.sql"),
        ..Default::default()
    }
}

#[tokio::test]
async fn runs_steps_in_fixed_order_and_transcodes_dump() {
    let dir = temp_dir("order");
    let cfg = shop_config(&dir);
    let dump = b"/*!40101 SET NAMES latin1 */;\nINSERT IGNORE INTO `t` VALUES (1,'caf\xe9');\n";
    let mut runner = MigrationRunner::new(&cfg, RecordingExecutor::new(dump));

    let summary = runner.run().await.expect("migration should succeed");
    assert_eq!(runner.stage(), MigrationStage::Reloaded);

    let calls = runner.executor().calls();
    assert_eq!(calls.len(), 4);
    assert!(calls[0].starts_with(
        "mysqldump --user=admin --password='secret' --add-drop-table \
         --default-character-set=latin1 --insert-ignore --skip-set-charset shop_db > "
    ));
    assert!(calls[1].ends_with("--execute=\"DROP DATABASE shop_db;\""));
    assert!(calls[2].ends_with(
        "--execute=\"CREATE DATABASE shop_db CHARACTER SET utf8 COLLATE utf8_unicode_ci;\""
    ));
    assert!(calls[3].contains("--default-character-set=utf8 shop_db < "));

    let utf8 = fs::read_to_string(&cfg.utf8_dump).expect("utf8 dump missing");
    assert_eq!(
        utf8,
        "/*!40101 SET NAMES utf8 */;\nINSERT IGNORE INTO `t` VALUES (1,'café');\n"
    );
    let report = summary.transcode.expect("builtin transcoder report");
    assert_eq!(report.lines, 2);
    assert_eq!(report.lines_rewritten, 1);

    let retained = summary.retained.expect("dumps kept by default");
    assert!(retained.latin1.exists());
    assert!(retained.utf8.exists());

    let _ = fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn aborts_on_first_failure_without_running_later_steps() {
    let dir = temp_dir("abort");
    let cfg = shop_config(&dir);
    // Call 2 is CREATE DATABASE.
    let exec = RecordingExecutor::new(b"SET NAMES latin1;\n").failing_at(2, 1);
    let mut runner = MigrationRunner::new(&cfg, exec);

    let err = runner.run().await.expect_err("create failure must abort");
    assert_eq!(err.stage_reached(), Some(MigrationStage::Transcoded));
    match &err {
        MigrateError::Step { step, source, .. } => {
            assert_eq!(*step, Step::Recreate);
            assert!(matches!(
                **source,
                MigrateError::CommandFailed { code: Some(1), .. }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(runner.stage(), MigrationStage::Transcoded);
    assert_eq!(runner.executor().calls().len(), 3);
    assert!(cfg.latin1_dump.exists(), "dumps are kept after a failure");

    let _ = fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn delete_dumps_removes_both_files_after_reload() {
    let dir = temp_dir("cleanup");
    let cfg = Config {
        keep_dumps: false,
        ..shop_config(&dir)
    };
    let mut runner = MigrationRunner::new(&cfg, RecordingExecutor::new(b"-- empty\n"));

    let summary = runner.run().await.expect("migration should succeed");
    assert!(summary.retained.is_none());
    assert!(!cfg.latin1_dump.exists());
    assert!(!cfg.utf8_dump.exists());

    let _ = fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn steps_cannot_run_out_of_order() {
    let dir = temp_dir("out-of-order");
    let cfg = shop_config(&dir);
    let mut runner = MigrationRunner::new(&cfg, RecordingExecutor::new(b""));

    let err = runner.recreate().await.expect_err("recreate before dump");
    assert!(matches!(
        err,
        MigrateError::OutOfOrder {
            step: Step::Recreate,
            stage: MigrationStage::Start
        }
    ));
    assert!(runner.executor().calls().is_empty());

    let _ = fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn external_transcoder_goes_through_executor() {
    let dir = temp_dir("external");
    let cfg = Config {
        transcoder: Transcoder::External,
        charset_fixup: CharsetFixup::Every,
        ..shop_config(&dir)
    };
    let mut runner = MigrationRunner::new(&cfg, RecordingExecutor::new(b"SET NAMES latin1;\n"));

    runner.dump().await.expect("dump");
    let report = runner.transcode().await.expect("transcode");
    assert!(report.is_none());

    let calls = runner.executor().calls();
    assert_eq!(
        calls[1],
        format!(
            "iconv -f ISO-8859-1 -t UTF-8 {} | sed 's/latin1/utf8/g' > {}",
            cfg.latin1_dump.display(),
            cfg.utf8_dump.display()
        )
    );
    assert_eq!(runner.stage(), MigrationStage::Transcoded);

    let _ = fs::remove_dir_all(&dir);
}
