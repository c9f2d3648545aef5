use crate::config::{CharsetFixup, ConfigOverrides, Transcoder};
use clap::Parser;
use std::path::PathBuf;

/// Convert a Latin-1 MySQL database to UTF-8: dump, transcode, recreate, reload.
#[derive(Debug, Parser)]
#[command(name = "mysql-charset-migrate", version, about)]
pub struct Cli {
    /// TOML config file (defaults to ./migrate.toml when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Database to migrate
    #[arg(short = 'd', long)]
    pub database: Option<String>,

    /// MySQL user
    #[arg(short = 'u', long)]
    pub user: Option<String>,

    /// MySQL password (prefer MIGRATE_PASSWORD to keep it out of shell history)
    #[arg(short = 'p', long)]
    pub password: Option<String>,

    /// Where the Latin-1 dump is written
    #[arg(long, value_name = "PATH")]
    pub latin1_dump: Option<PathBuf>,

    /// Where the transcoded UTF-8 dump is written
    #[arg(long, value_name = "PATH")]
    pub utf8_dump: Option<PathBuf>,

    /// How the Latin-1 dump is converted to UTF-8
    #[arg(long, value_enum)]
    pub transcoder: Option<Transcoder>,

    /// Which `latin1` references are rewritten to `utf8`
    #[arg(long, value_enum)]
    pub charset_fixup: Option<CharsetFixup>,

    /// Delete both dump files after a successful reload
    #[arg(long)]
    pub delete_dumps: bool,

    /// Print the planned commands without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Show the password in --dry-run output
    #[arg(long, requires = "dry_run")]
    pub show_secrets: bool,

    /// Default log filter when RUST_LOG is unset
    #[arg(long)]
    pub loglevel: Option<String>,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            database: self.database.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            latin1_dump: self.latin1_dump.clone(),
            utf8_dump: self.utf8_dump.clone(),
            transcoder: self.transcoder,
            charset_fixup: self.charset_fixup,
            keep_dumps: self.delete_dumps.then_some(false),
            loglevel: self.loglevel.clone(),
        }
    }
}
