use clap::Parser;
use mimalloc::MiMalloc;
use mysql_charset_migrate::{
    Config, MigrationPlan, MigrationRunner, ProcessExecutor, cli::Cli,
};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let cfg = match Config::load(cli.config.as_deref(), cli.overrides()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database = %cfg.database,
        user = %cfg.user,
        latin1_dump = %cfg.latin1_dump.display(),
        utf8_dump = %cfg.utf8_dump.display(),
        transcoder = ?cfg.transcoder,
        charset_fixup = ?cfg.charset_fixup,
        keep_dumps = cfg.keep_dumps
    );

    if cli.dry_run {
        for (step, line) in MigrationPlan::from_config(&cfg).describe(!cli.show_secrets) {
            println!("[{step}] {line}");
        }
        return ExitCode::SUCCESS;
    }

    let mut runner = MigrationRunner::new(&cfg, ProcessExecutor);
    match runner.run().await {
        Ok(summary) => {
            info!(elapsed_ms = summary.elapsed.as_millis() as u64, "migration complete");
            if let Some(files) = summary.retained {
                println!("{}", files.reminder());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(stage = %runner.stage(), error = %e, "migration aborted");
            ExitCode::FAILURE
        }
    }
}
