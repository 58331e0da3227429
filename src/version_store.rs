use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use crate::config::UpgradeConfig;
use crate::error::UpgradeError;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct VersionRecord {
    pub version: String,
}

/// Persisted record of the installed release, with the server log as fallback.
#[derive(Debug, Clone)]
pub struct VersionStore {
    record_path: PathBuf,
    log_file: PathBuf,
}

impl VersionStore {
    pub fn new(config: &UpgradeConfig) -> Self {
        Self {
            record_path: config.version_file.clone(),
            log_file: config.log_file.clone(),
        }
    }

    /// Reads the version record. Absent, unreadable and empty records all
    /// come back as `None`.
    pub fn read_installed(&self) -> Option<String> {
        let file = match File::open(&self.record_path) {
            Ok(file) => file,
            Err(err) => {
                tracing::debug!(path = %self.record_path.display(), %err, "no version record");
                return None;
            }
        };
        match serde_json::from_reader::<_, VersionRecord>(BufReader::new(file)) {
            Ok(record) if !record.version.trim().is_empty() => Some(record.version),
            Ok(_) => {
                tracing::debug!(path = %self.record_path.display(), "version record is empty");
                None
            }
            Err(err) => {
                tracing::debug!(path = %self.record_path.display(), %err, "unreadable version record");
                None
            }
        }
    }

    /// Extracts the version from the first line of the server log.
    pub fn read_from_log(&self) -> Result<String, UpgradeError> {
        let file = File::open(&self.log_file).map_err(UpgradeError::fs("open", &self.log_file))?;
        let first_line = BufReader::new(file)
            .lines()
            .next()
            .transpose()
            .map_err(|err| match err.kind() {
                io::ErrorKind::InvalidData => {
                    UpgradeError::parse("server log", "first line is not valid UTF-8")
                }
                _ => UpgradeError::fs("read", &self.log_file)(err),
            })?
            .ok_or_else(|| UpgradeError::parse("server log", "log file is empty"))?;
        parse_log_line(&first_line)
    }

    pub fn write(&self, version: &str) -> Result<(), UpgradeError> {
        let file =
            File::create(&self.record_path).map_err(UpgradeError::fs("create", &self.record_path))?;
        let mut writer = BufWriter::new(file);
        let record = VersionRecord {
            version: version.to_string(),
        };
        serde_json::to_writer(&mut writer, &record)
            .map_err(|err| UpgradeError::fs("write", &self.record_path)(err.into()))?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(UpgradeError::fs("write", &self.record_path))?;
        tracing::debug!(path = %self.record_path.display(), version, "wrote version record");
        Ok(())
    }

    /// The installed version, backfilling the record from the log on first use.
    pub fn get_installed(&self) -> Result<String, UpgradeError> {
        if let Some(version) = self.read_installed() {
            return Ok(version);
        }
        let version = self.read_from_log()?;
        tracing::info!(version, "recovered installed version from server log");
        self.write(&version)?;
        Ok(version)
    }
}

/// The version sits between the first `+` and the following `|`.
pub fn parse_log_line(line: &str) -> Result<String, UpgradeError> {
    let (_, rest) = line
        .split_once('+')
        .ok_or_else(|| UpgradeError::parse("server log", "first line has no '+' marker"))?;
    let (version, _) = rest
        .split_once('|')
        .ok_or_else(|| UpgradeError::parse("server log", "first line has no '|' after '+'"))?;
    let version = version.trim();
    if version.is_empty() {
        return Err(UpgradeError::parse(
            "server log",
            "empty version between '+' and '|'",
        ));
    }
    Ok(version.to_string())
}
