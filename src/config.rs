use crate::error::MigrateError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file consulted when `--config` is not given. Missing is fine.
pub const CONFIG_FILE: &str = "migrate.toml";
/// Prefix for environment overrides, e.g. `MIGRATE_PASSWORD`.
pub const ENV_PREFIX: &str = "MIGRATE_";
/// Keys read from the environment verbatim. Figment's `Env` provider would
/// parse `007` or `[pw]` into numbers and arrays.
const VERBATIM_ENV_KEYS: [&str; 3] = ["database", "user", "password"];

/// How the Latin-1 dump is turned into UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Transcoder {
    /// In-process ISO-8859-1 -> UTF-8 conversion.
    #[default]
    Builtin,
    /// `iconv | sed` pipeline.
    External,
}

/// Which occurrences of `latin1` get rewritten to `utf8` during transcoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CharsetFixup {
    /// Only lines that declare a charset or collation.
    #[default]
    Declarations,
    /// Every occurrence anywhere in the dump, data included.
    Every,
    /// First occurrence on each line, like `sed 's/latin1/utf8/'`.
    FirstPerLine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: String,
    pub user: String,
    pub password: String,

    pub latin1_dump: PathBuf,
    pub utf8_dump: PathBuf,

    pub mysqldump_bin: String,
    pub mysql_bin: String,
    pub iconv_bin: String,
    pub sed_bin: String,

    pub transcoder: Transcoder,
    pub charset_fixup: CharsetFixup,
    pub keep_dumps: bool,

    pub loglevel: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: String::new(),
            user: String::new(),
            password: String::new(),
            latin1_dump: PathBuf::from("latin1_dump.sql"),
            utf8_dump: PathBuf::from("utf8_dump.sql"),
            mysqldump_bin: "mysqldump".to_string(),
            mysql_bin: "mysql".to_string(),
            iconv_bin: "iconv".to_string(),
            sed_bin: "sed".to_string(),
            transcoder: Transcoder::default(),
            charset_fixup: CharsetFixup::default(),
            keep_dumps: true,
            loglevel: "info".to_string(),
        }
    }
}

/// A partial layer (command line or verbatim env). Unset fields do not override lower layers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latin1_dump: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utf8_dump: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcoder: Option<Transcoder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charset_fixup: Option<CharsetFixup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_dumps: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loglevel: Option<String>,
}

impl ConfigOverrides {
    /// Credentials and database name taken from the environment as raw strings.
    fn from_verbatim_env() -> Self {
        let var = |key: &str| std::env::var(format!("{ENV_PREFIX}{}", key.to_uppercase())).ok();
        Self {
            database: var(VERBATIM_ENV_KEYS[0]),
            user: var(VERBATIM_ENV_KEYS[1]),
            password: var(VERBATIM_ENV_KEYS[2]),
            ..Default::default()
        }
    }
}

impl Config {
    /// Defaults, then the TOML file, then `MIGRATE_*` environment variables.
    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&VERBATIM_ENV_KEYS))
            .merge(Serialized::defaults(ConfigOverrides::from_verbatim_env()))
    }

    /// Resolve the full layered configuration and validate it.
    ///
    /// An explicitly named config file must exist; the default one is optional.
    pub fn load(file: Option<&Path>, overrides: ConfigOverrides) -> Result<Self, MigrateError> {
        let file = match file {
            Some(path) if !path.exists() => {
                return Err(MigrateError::InvalidConfig(format!(
                    "config file {} not found",
                    path.display()
                )));
            }
            Some(path) => path,
            None => Path::new(CONFIG_FILE),
        };
        let cfg: Config = Self::figment(file)
            .merge(Serialized::defaults(overrides))
            .extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), MigrateError> {
        if self.database.trim().is_empty() {
            return Err(MigrateError::InvalidConfig(
                "database name is required (--database or MIGRATE_DATABASE)".to_string(),
            ));
        }
        if self.database.starts_with('-') {
            return Err(MigrateError::InvalidConfig(format!(
                "database name `{}` would be read as a client option",
                self.database
            )));
        }
        if self.latin1_dump == self.utf8_dump {
            return Err(MigrateError::InvalidConfig(format!(
                "latin1_dump and utf8_dump must be different files (both are {})",
                self.latin1_dump.display()
            )));
        }
        if self.transcoder == Transcoder::External
            && self.charset_fixup == CharsetFixup::Declarations
        {
            return Err(MigrateError::InvalidConfig(
                "charset_fixup `declarations` needs the builtin transcoder; use `every` or `first-per-line` with `external`"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_match_legacy_file_names() {
        let cfg = Config::default();
        assert_eq!(cfg.latin1_dump, PathBuf::from("latin1_dump.sql"));
        assert_eq!(cfg.utf8_dump, PathBuf::from("utf8_dump.sql"));
        assert!(cfg.keep_dumps);
        assert_eq!(cfg.charset_fixup, CharsetFixup::Declarations);
    }

    #[test]
    fn layers_merge_file_env_then_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "migrate.toml",
                r#"
                database = "from_file"
                user = "file_user"
                utf8_dump = "/tmp/out.sql"
                charset_fixup = "first-per-line"
                "#,
            )?;
            jail.set_env("MIGRATE_USER", "env_user");
            jail.set_env("MIGRATE_PASSWORD", "1234");

            let overrides = ConfigOverrides {
                database: Some("shop_db".to_string()),
                ..Default::default()
            };
            let cfg = Config::load(None, overrides).map_err(|e| e.to_string())?;

            assert_eq!(cfg.database, "shop_db");
            assert_eq!(cfg.user, "env_user");
            assert_eq!(cfg.password, "1234");
            assert_eq!(cfg.utf8_dump, PathBuf::from("/tmp/out.sql"));
            assert_eq!(cfg.latin1_dump, PathBuf::from("latin1_dump.sql"));
            assert_eq!(cfg.charset_fixup, CharsetFixup::FirstPerLine);
            Ok(())
        });
    }

    #[test]
    fn credentials_from_env_are_kept_verbatim() {
        for raw in ["007", "1.50", "[pw]", "true"] {
            Jail::expect_with(|jail| {
                jail.set_env("MIGRATE_DATABASE", "0123");
                jail.set_env("MIGRATE_USER", "00");
                jail.set_env("MIGRATE_PASSWORD", raw);

                let cfg = Config::load(None, ConfigOverrides::default())
                    .map_err(|e| e.to_string())?;

                assert_eq!(cfg.database, "0123");
                assert_eq!(cfg.user, "00");
                assert_eq!(cfg.password, raw);
                Ok(())
            });
        }
    }

    #[test]
    fn cli_password_beats_env_password() {
        Jail::expect_with(|jail| {
            jail.set_env("MIGRATE_DATABASE", "shop_db");
            jail.set_env("MIGRATE_PASSWORD", "from_env");
            let overrides = ConfigOverrides {
                password: Some("from_cli".to_string()),
                ..Default::default()
            };
            let cfg = Config::load(None, overrides).map_err(|e| e.to_string())?;
            assert_eq!(cfg.password, "from_cli");
            Ok(())
        });
    }

    #[test]
    fn missing_database_is_rejected() {
        Jail::expect_with(|_jail| {
            let err = Config::load(None, ConfigOverrides::default()).unwrap_err();
            assert!(matches!(err, MigrateError::InvalidConfig(_)));
            Ok(())
        });
    }

    #[test]
    fn explicit_config_file_must_exist() {
        Jail::expect_with(|_jail| {
            let err = Config::load(Some(Path::new("nope.toml")), ConfigOverrides::default())
                .unwrap_err();
            assert!(err.to_string().contains("nope.toml"));
            Ok(())
        });
    }

    #[test]
    fn external_transcoder_rejects_declaration_fixup() {
        let cfg = Config {
            database: "db".to_string(),
            transcoder: Transcoder::External,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            charset_fixup: CharsetFixup::FirstPerLine,
            ..cfg
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn identical_dump_paths_are_rejected() {
        let cfg = Config {
            database: "db".to_string(),
            utf8_dump: PathBuf::from("latin1_dump.sql"),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
