use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::UpgradeConfig;
use crate::error::UpgradeError;
use crate::version_store::VersionStore;

/// Moves installs around and carries config/start files across an upgrade.
pub struct Deployer<'a> {
    config: &'a UpgradeConfig,
    store: &'a VersionStore,
}

impl<'a> Deployer<'a> {
    pub fn new(config: &'a UpgradeConfig, store: &'a VersionStore) -> Self {
        Self { config, store }
    }

    /// Renames the live install to `<install>-v<installed>`.
    pub fn move_current_install(&self, installed: &str) -> Result<PathBuf, UpgradeError> {
        let current = self.config.install_dir();
        let archived = self.config.archived_install_dir(installed);
        fs::rename(&current, &archived).map_err(UpgradeError::fs("rename", &current))?;
        tracing::info!(from = %current.display(), to = %archived.display(), "moved current install");
        Ok(archived)
    }

    /// Creates the empty directory the new release is unpacked into.
    pub fn make_install_dir(&self) -> Result<PathBuf, UpgradeError> {
        let dir = self.config.install_dir();
        fs::create_dir(&dir).map_err(UpgradeError::fs("create", &dir))?;
        Ok(dir)
    }

    /// Redeploys config and start files into the fresh install and records
    /// `latest` as installed. Returns the version now on record.
    pub fn deploy_start_files(&self, installed: &str, latest: &str) -> Result<String, UpgradeError> {
        for path in &self.config.move_files {
            move_aside(path)?;
        }

        let install_dir = self.config.install_dir();
        for template in &self.config.copy_files {
            let source = template.render_path(installed);
            let file_name = source.file_name().ok_or_else(|| {
                UpgradeError::parse(
                    "copy_files entry",
                    format!("{} has no file name", template.as_str()),
                )
            })?;
            let dest = install_dir.join(file_name);
            fs::copy(&source, &dest).map_err(UpgradeError::fs("copy", &source))?;
            tracing::debug!(from = %source.display(), to = %dest.display(), "copied start file");
        }

        let scripts = mark_scripts_executable(&install_dir)?;
        tracing::debug!(count = scripts.len(), "scripts marked executable");

        self.store.write(latest)?;
        Ok(latest.to_string())
    }
}

/// Renames `path` to `<path>.orig`.
fn move_aside(path: &Path) -> Result<PathBuf, UpgradeError> {
    let mut aside = OsString::from(path.as_os_str());
    aside.push(".orig");
    let aside = PathBuf::from(aside);
    fs::rename(path, &aside).map_err(UpgradeError::fs("move aside", path))?;
    Ok(aside)
}

/// Sets `0755` on every `*.sh` directly inside `dir`.
fn mark_scripts_executable(dir: &Path) -> Result<Vec<PathBuf>, UpgradeError> {
    let pattern = Path::new(&glob::Pattern::escape(&dir.to_string_lossy()))
        .join("*.sh")
        .to_string_lossy()
        .into_owned();
    let paths = glob::glob(&pattern)
        .map_err(|err| UpgradeError::parse("script pattern", err.to_string()))?;

    let mut scripts = Vec::new();
    for path in paths {
        let path = path.map_err(|err| {
            let path = err.path().to_path_buf();
            UpgradeError::fs("list", &path)(io::Error::from(err))
        })?;
        set_executable(&path)?;
        scripts.push(path);
    }
    Ok(scripts)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), UpgradeError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(UpgradeError::fs("chmod", path))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), UpgradeError> {
    Ok(())
}
