use crate::config::Config;
use crate::error::MigrateError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

/// The two intermediate dump files a migration leaves on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpFiles {
    pub latin1: PathBuf,
    pub utf8: PathBuf,
}

impl DumpFiles {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            latin1: cfg.latin1_dump.clone(),
            utf8: cfg.utf8_dump.clone(),
        }
    }

    /// Operator reminder printed when the files are retained.
    pub fn reminder(&self) -> String {
        format!(
            " *** don't forget to delete temp files {} and {}",
            self.latin1.display(),
            self.utf8.display()
        )
    }

    /// Delete both files. Already-missing files are not an error.
    pub async fn remove(&self) -> Result<(), MigrateError> {
        remove_if_present(&self.latin1).await?;
        remove_if_present(&self.utf8).await
    }
}

async fn remove_if_present(path: &Path) -> Result<(), MigrateError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            info!(path = %path.display(), "removed dump file");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MigrateError::io(path, e)),
    }
}
