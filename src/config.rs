use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an optional TOML file that overrides the defaults.
pub const CONFIG_ENV: &str = "VU_CONFIG";

const DEFAULT_ROOT_DIR: &str = "/root";
const DEFAULT_INSTALL_NAME: &str = "tModLoader";
const DEFAULT_DATA_DIR: &str = ".local/share/Terraria";
const DEFAULT_BACKUP_PREFIX: &str = "tMod";
const DEFAULT_RELEASE_URL: &str = "https://github.com/tModLoader/tModLoader/releases/latest";
const DEFAULT_DOWNLOAD_URL: &str =
    "https://github.com/tModLoader/tModLoader/releases/download/v{version}/tModLoader.zip";
const DEFAULT_START_FILES: [&str; 3] = ["boot_start.sh", "start.sh", "serverconfig.txt"];
const DEFAULT_MOVED_FILES: [&str; 1] = ["serverconfig.txt"];

#[derive(Debug, Error, PartialEq)]
#[error("'{template}' must contain the {} placeholder exactly once", VersionTemplate::PLACEHOLDER)]
pub struct TemplateError {
    template: String,
}

/// A path or URL with a single `{version}` slot, checked when config is loaded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct VersionTemplate(String);

impl VersionTemplate {
    pub const PLACEHOLDER: &'static str = "{version}";

    pub fn parse(raw: impl Into<String>) -> std::result::Result<Self, TemplateError> {
        let raw = raw.into();
        if raw.matches(Self::PLACEHOLDER).count() != 1 {
            return Err(TemplateError { template: raw });
        }
        Ok(Self(raw))
    }

    pub fn render(&self, version: &str) -> String {
        self.0.replace(Self::PLACEHOLDER, version)
    }

    pub fn render_path(&self, version: &str) -> PathBuf {
        PathBuf::from(self.render(version))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VersionTemplate {
    type Error = TemplateError;

    fn try_from(raw: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

/// Config file for overriding the built-in layout - all fields optional
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialConfigFile {
    pub root_dir: Option<PathBuf>,
    pub install_name: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    pub backup_prefix: Option<String>,
    pub release_url: Option<String>,
    pub download_url: Option<VersionTemplate>,
    pub log_file: Option<PathBuf>,
    pub version_file: Option<PathBuf>,
    pub copy_files: Option<Vec<VersionTemplate>>,
    pub move_files: Option<Vec<PathBuf>>,
}

/// Resolved, read-only settings for one run.
#[derive(Debug, Clone)]
pub struct UpgradeConfig {
    pub root_dir: PathBuf,
    pub install_name: String,
    /// Data directory, relative to `root_dir` unless absolute.
    pub data_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub backup_prefix: String,
    pub release_url: String,
    pub download_url: VersionTemplate,
    pub log_file: PathBuf,
    pub version_file: PathBuf,
    /// Start files inside the moved-aside install, copied into the new one.
    pub copy_files: Vec<VersionTemplate>,
    /// Files in the new install renamed to `<path>.orig` before the copy.
    pub move_files: Vec<PathBuf>,
}

impl PartialConfigFile {
    pub fn resolve(self) -> Result<UpgradeConfig> {
        let root_dir = self
            .root_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT_DIR));
        let install_name = self
            .install_name
            .unwrap_or_else(|| DEFAULT_INSTALL_NAME.to_string());
        let install_dir = root_dir.join(&install_name);

        let download_url = match self.download_url {
            Some(template) => template,
            None => VersionTemplate::parse(DEFAULT_DOWNLOAD_URL)?,
        };

        let copy_files = match self.copy_files {
            Some(templates) => templates,
            None => {
                let archived = root_dir.join(format!(
                    "{}-v{}",
                    install_name,
                    VersionTemplate::PLACEHOLDER
                ));
                DEFAULT_START_FILES
                    .iter()
                    .map(|name| VersionTemplate::parse(archived.join(name).to_string_lossy()))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        let move_files = self.move_files.unwrap_or_else(|| {
            DEFAULT_MOVED_FILES
                .iter()
                .map(|name| install_dir.join(name))
                .collect()
        });

        Ok(UpgradeConfig {
            data_dir: self
                .data_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            backup_dir: self.backup_dir.unwrap_or_else(|| root_dir.join("backup")),
            backup_prefix: self
                .backup_prefix
                .unwrap_or_else(|| DEFAULT_BACKUP_PREFIX.to_string()),
            release_url: self
                .release_url
                .unwrap_or_else(|| DEFAULT_RELEASE_URL.to_string()),
            download_url,
            log_file: self
                .log_file
                .unwrap_or_else(|| install_dir.join("tModLoader-Logs").join("server.log")),
            version_file: self
                .version_file
                .unwrap_or_else(|| install_dir.join("version_update.json")),
            copy_files,
            move_files,
            root_dir,
            install_name,
        })
    }
}

impl UpgradeConfig {
    /// Load the config named by `$VU_CONFIG`, or the built-in layout when unset.
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => PartialConfigFile::default().resolve(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .context(format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let partial: PartialConfigFile = toml::from_str(content)?;
        partial.resolve()
    }

    /// Built-in layout rooted at `root_dir`.
    #[cfg(test)]
    pub fn with_root(root_dir: &Path) -> Result<Self> {
        PartialConfigFile {
            root_dir: Some(root_dir.to_path_buf()),
            ..Default::default()
        }
        .resolve()
    }

    pub fn install_dir(&self) -> PathBuf {
        self.root_dir.join(&self.install_name)
    }

    /// Where the current install is moved before the new one is unpacked.
    pub fn archived_install_dir(&self, version: &str) -> PathBuf {
        self.root_dir
            .join(format!("{}-v{}", self.install_name, version))
    }

    pub fn data_path(&self) -> PathBuf {
        self.root_dir.join(&self.data_dir)
    }

    pub fn exec_backup_path(&self, version: &str) -> PathBuf {
        self.backup_dir
            .join(format!("{}-execs-{}.tar.gz", self.backup_prefix, version))
    }

    pub fn data_backup_path(&self, version: &str) -> PathBuf {
        self.backup_dir
            .join(format!("{}-datafiles-{}.tar.gz", self.backup_prefix, version))
    }

    pub fn download_path(&self, version: &str) -> PathBuf {
        self.install_dir()
            .join(format!("{}-v{}.zip", self.install_name, version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stock_layout() {
        let config = PartialConfigFile::default().resolve().unwrap();
        assert_eq!(config.install_dir(), PathBuf::from("/root/tModLoader"));
        assert_eq!(
            config.log_file,
            PathBuf::from("/root/tModLoader/tModLoader-Logs/server.log")
        );
        assert_eq!(
            config.version_file,
            PathBuf::from("/root/tModLoader/version_update.json")
        );
        assert_eq!(config.backup_dir, PathBuf::from("/root/backup"));
        assert_eq!(
            config.data_path(),
            PathBuf::from("/root/.local/share/Terraria")
        );
        assert_eq!(
            config.move_files,
            vec![PathBuf::from("/root/tModLoader/serverconfig.txt")]
        );
        assert_eq!(config.copy_files.len(), 3);
        assert_eq!(
            config.copy_files[1].render_path("1.4.4.9"),
            PathBuf::from("/root/tModLoader-v1.4.4.9/start.sh")
        );
    }

    #[test]
    fn test_derived_paths() {
        let config = UpgradeConfig::with_root(Path::new("/srv")).unwrap();
        assert_eq!(
            config.archived_install_dir("1.4.4.8"),
            PathBuf::from("/srv/tModLoader-v1.4.4.8")
        );
        assert_eq!(
            config.exec_backup_path("1.4.4.8"),
            PathBuf::from("/srv/backup/tMod-execs-1.4.4.8.tar.gz")
        );
        assert_eq!(
            config.data_backup_path("1.4.4.8"),
            PathBuf::from("/srv/backup/tMod-datafiles-1.4.4.8.tar.gz")
        );
        assert_eq!(
            config.download_path("1.4.4.9"),
            PathBuf::from("/srv/tModLoader/tModLoader-v1.4.4.9.zip")
        );
        assert_eq!(
            config.download_url.render("1.4.4.9"),
            "https://github.com/tModLoader/tModLoader/releases/download/v1.4.4.9/tModLoader.zip"
        );
    }

    #[test]
    fn test_toml_overrides() {
        let toml_str = r#"
root_dir = "/opt/game"
install_name = "server"
backup_prefix = "srv"
release_url = "https://example.com/latest"
download_url = "https://example.com/v{version}/server.zip"
copy_files = ["/opt/game/server-v{version}/run.sh"]
move_files = ["/opt/game/server/settings.txt"]
"#;
        let config = UpgradeConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.install_dir(), PathBuf::from("/opt/game/server"));
        assert_eq!(
            config.version_file,
            PathBuf::from("/opt/game/server/version_update.json")
        );
        assert_eq!(config.release_url, "https://example.com/latest");
        assert_eq!(
            config.exec_backup_path("2"),
            PathBuf::from("/opt/game/backup/srv-execs-2.tar.gz")
        );
        assert_eq!(config.copy_files.len(), 1);
        assert_eq!(
            config.move_files,
            vec![PathBuf::from("/opt/game/server/settings.txt")]
        );
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        let toml_str = r#"copy_files = ["/root/tModLoader-old/start.sh"]"#;
        let err = UpgradeConfig::from_toml(toml_str).unwrap_err();
        assert!(format!("{err:#}").contains("{version}"), "{err:#}");
    }

    #[test]
    fn test_template_with_two_placeholders_rejected() {
        assert!(VersionTemplate::parse("/a-{version}/{version}").is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(UpgradeConfig::from_toml("rot_dir = \"/root\"").is_err());
    }

    #[test]
    fn test_from_file_missing() {
        let err = UpgradeConfig::from_file(Path::new("/nonexistent/vu.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vu.toml");
        std::fs::write(&path, "root_dir = \"/data\"\n").unwrap();
        let config = UpgradeConfig::from_file(&path).unwrap();
        assert_eq!(config.install_dir(), PathBuf::from("/data/tModLoader"));
    }
}
