use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::upgrade::Step;

/// Every failure an update run can hit. All of them are fatal to the current
/// invocation; the binary maps them to exit status [`UpgradeError::EXIT_CODE`].
#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("failed to {action} {}: {source}", path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed {what}: {detail}")]
    Parse { what: String, detail: String },

    #[error("archive {}: {detail}", path.display())]
    Archive { path: PathBuf, detail: String },

    #[error("{step} failed: {source}")]
    Step {
        step: Step,
        #[source]
        source: Box<UpgradeError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Filesystem,
    Parse,
    Archive,
}

impl UpgradeError {
    pub const EXIT_CODE: u8 = 1;

    pub fn network(url: &str, source: ureq::Error) -> Self {
        Self::Network {
            url: url.to_string(),
            source: Box::new(source),
        }
    }

    /// Builds a `map_err` adapter for an I/O failure on `path`.
    pub fn fs(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Filesystem {
            action,
            path,
            source,
        }
    }

    pub fn parse(what: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            detail: detail.into(),
        }
    }

    pub fn archive(path: &Path, detail: impl ToString) -> Self {
        Self::Archive {
            path: path.to_path_buf(),
            detail: detail.to_string(),
        }
    }

    pub fn in_step(self, step: Step) -> Self {
        Self::Step {
            step,
            source: Box::new(self),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Filesystem { .. } => ErrorKind::Filesystem,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Archive { .. } => ErrorKind::Archive,
            Self::Step { source, .. } => source.kind(),
        }
    }

    /// The pipeline step the error surfaced in, if it came from an upgrade.
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Step { step, .. } => Some(*step),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_wrapper_keeps_inner_kind() {
        let err = UpgradeError::parse("log line", "missing '+'").in_step(Step::Deploy);
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(err.step(), Some(Step::Deploy));
    }

    #[test]
    fn test_step_wrapper_message_names_step() {
        let inner = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err = UpgradeError::fs("rename", Path::new("/srv/game"))(inner).in_step(Step::MoveCurrent);
        let message = err.to_string();
        assert!(message.starts_with("Move Current Inst. failed"), "{message}");
        assert!(message.contains("rename /srv/game"), "{message}");
    }

    #[test]
    fn test_unwrapped_error_has_no_step() {
        let err = UpgradeError::archive(Path::new("a.zip"), "bad header");
        assert_eq!(err.kind(), ErrorKind::Archive);
        assert_eq!(err.step(), None);
        assert_eq!(err.to_string(), "archive a.zip: bad header");
    }
}
