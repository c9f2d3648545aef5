use crate::config::{CharsetFixup, Config, Transcoder};
use crate::types::command::{Arg, CommandLine, Quote};
use crate::types::stage::Step;
use std::path::PathBuf;

pub const SOURCE_CHARSET: &str = "latin1";
pub const TARGET_CHARSET: &str = "utf8";
pub const TARGET_COLLATION: &str = "utf8_unicode_ci";

/// How the transcode step is carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodePlan {
    Builtin {
        src: PathBuf,
        dst: PathBuf,
        fixup: CharsetFixup,
    },
    External(CommandLine),
}

/// Every command the migration will run, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    pub dump: CommandLine,
    pub transcode: TranscodePlan,
    /// DROP then CREATE, as two separate client invocations.
    pub recreate: [CommandLine; 2],
    pub reload: CommandLine,
}

impl MigrationPlan {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            dump: dump_command(cfg),
            transcode: transcode_plan(cfg),
            recreate: [drop_command(cfg), create_command(cfg)],
            reload: reload_command(cfg),
        }
    }

    /// Shell-equivalent lines for each step, in execution order.
    pub fn describe(&self, redact: bool) -> Vec<(Step, String)> {
        let show = |c: &CommandLine| if redact { c.redacted() } else { c.render() };
        let transcode = match &self.transcode {
            TranscodePlan::Builtin { src, dst, fixup } => format!(
                "<builtin> ISO-8859-1 -> UTF-8 {} > {} (charset fixup: {fixup:?})",
                src.display(),
                dst.display()
            ),
            TranscodePlan::External(cmd) => show(cmd),
        };
        vec![
            (Step::Dump, show(&self.dump)),
            (Step::Transcode, transcode),
            (Step::Recreate, show(&self.recreate[0])),
            (Step::Recreate, show(&self.recreate[1])),
            (Step::Reload, show(&self.reload)),
        ]
    }
}

fn client(program: &str, cfg: &Config) -> CommandLine {
    CommandLine::new(program)
        .arg(Arg::flag("--user", cfg.user.as_str()))
        .arg(Arg::secret("--password", cfg.password.as_str()))
}

fn dump_command(cfg: &Config) -> CommandLine {
    client(&cfg.mysqldump_bin, cfg)
        .arg(Arg::word("--add-drop-table"))
        .arg(Arg::flag("--default-character-set", SOURCE_CHARSET))
        .arg(Arg::word("--insert-ignore"))
        .arg(Arg::word("--skip-set-charset"))
        .arg(Arg::word(cfg.database.as_str()))
        .stdout_to(&cfg.latin1_dump)
}

fn transcode_plan(cfg: &Config) -> TranscodePlan {
    match cfg.transcoder {
        Transcoder::Builtin => TranscodePlan::Builtin {
            src: cfg.latin1_dump.clone(),
            dst: cfg.utf8_dump.clone(),
            fixup: cfg.charset_fixup,
        },
        Transcoder::External => {
            let script = match cfg.charset_fixup {
                CharsetFixup::Every => format!("s/{SOURCE_CHARSET}/{TARGET_CHARSET}/g"),
                _ => format!("s/{SOURCE_CHARSET}/{TARGET_CHARSET}/"),
            };
            let iconv = CommandLine::new(cfg.iconv_bin.as_str())
                .arg(Arg::word("-f"))
                .arg(Arg::word("ISO-8859-1"))
                .arg(Arg::word("-t"))
                .arg(Arg::word("UTF-8"))
                .arg(Arg::word(cfg.latin1_dump.display().to_string()));
            let sed = CommandLine::new(cfg.sed_bin.as_str())
                .arg(Arg::quoted(script))
                .stdout_to(&cfg.utf8_dump);
            TranscodePlan::External(iconv.pipe(sed))
        }
    }
}

fn execute(cfg: &Config, sql: String) -> CommandLine {
    client(&cfg.mysql_bin, cfg).arg(Arg::flag("--execute", sql).with_quote(Quote::Double))
}

fn drop_command(cfg: &Config) -> CommandLine {
    execute(cfg, format!("DROP DATABASE {};", cfg.database))
}

fn create_command(cfg: &Config) -> CommandLine {
    execute(
        cfg,
        format!(
            "CREATE DATABASE {} CHARACTER SET {TARGET_CHARSET} COLLATE {TARGET_COLLATION};",
            cfg.database
        ),
    )
}

fn reload_command(cfg: &Config) -> CommandLine {
    client(&cfg.mysql_bin, cfg)
        .arg(Arg::flag("--default-character-set", TARGET_CHARSET))
        .arg(Arg::word(cfg.database.as_str()))
        .stdin_from(&cfg.utf8_dump)
}
