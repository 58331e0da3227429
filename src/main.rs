use clap::Parser;
use clap::error::ErrorKind;
use std::ffi::OsString;
use std::process::ExitCode;

mod archive;
mod commands;
mod config;
mod deploy;
mod error;
mod fetch;
mod http;
mod logging;
mod release;
mod reporter;
mod styles;
mod upgrade;
mod version_store;

use config::UpgradeConfig;
use error::UpgradeError;
use http::{Transport, UreqTransport};
use reporter::Reporter;

const USAGE_EXIT_CODE: u8 = 2;

#[derive(Parser)]
#[command(
    name = "vu",
    version,
    about = "Check for and install new tModLoader server releases"
)]
enum Cli {
    /// Report whether a newer release is available (exit 42 if so, 0 if not)
    Check,
    /// Same as check, with timings for each lookup
    Pcheck,
    /// Back up the current install and replace it with the latest release (exit 88)
    Upgrade,
}

fn main() -> ExitCode {
    let cli = match parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(code) => return code,
    };

    logging::init();

    let config = match UpgradeConfig::load() {
        Ok(config) => config,
        Err(err) => {
            Reporter::failure(format!("{err:#}"));
            return ExitCode::from(UpgradeError::EXIT_CODE);
        }
    };

    dispatch(cli, &config, &UreqTransport::new())
}

/// Help and version exit 0; any other parse failure prints usage and exits 2.
fn parse_args<I, T>(args: I) -> Result<Cli, ExitCode>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(cli),
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            Err(ExitCode::SUCCESS)
        }
        Err(_) => {
            Reporter::usage(&bin_name());
            Err(ExitCode::from(USAGE_EXIT_CODE))
        }
    }
}

fn dispatch<T: Transport>(cli: Cli, config: &UpgradeConfig, transport: &T) -> ExitCode {
    let result = match cli {
        Cli::Check => commands::check_command(config, transport, false),
        Cli::Pcheck => commands::check_command(config, transport, true),
        Cli::Upgrade => commands::upgrade_command(config, transport),
    };

    match result {
        Ok(status) => status.into(),
        Err(err) => {
            tracing::debug!(kind = ?err.kind(), step = ?err.step(), "run failed");
            Reporter::failure(&err);
            ExitCode::from(UpgradeError::EXIT_CODE)
        }
    }
}

fn bin_name() -> String {
    std::env::args()
        .next()
        .unwrap_or_else(|| "vu".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::FakeTransport;
    use crate::version_store::VersionStore;

    fn usage_error(args: &[&str]) -> ExitCode {
        match parse_args(args.iter().copied()) {
            Ok(_) => panic!("{args:?} should not parse"),
            Err(code) => code,
        }
    }

    fn config_with(root: &std::path::Path, installed: &str) -> UpgradeConfig {
        let config = UpgradeConfig::with_root(root).unwrap();
        std::fs::create_dir_all(config.install_dir()).unwrap();
        VersionStore::new(&config).write(installed).unwrap();
        config
    }

    fn release_at(config: &UpgradeConfig, latest: &str) -> FakeTransport {
        FakeTransport::default().redirect(
            &config.release_url,
            &format!("https://github.com/tModLoader/tModLoader/releases/tag/v{latest}"),
        )
    }

    #[test]
    fn test_missing_subcommand_exits_2() {
        assert_eq!(usage_error(&[]), ExitCode::from(2));
        assert_eq!(usage_error(&["vu"]), ExitCode::from(2));
    }

    #[test]
    fn test_unknown_subcommand_exits_2() {
        assert_eq!(usage_error(&["vu", "foo"]), ExitCode::from(2));
    }

    #[test]
    fn test_extra_argument_exits_2() {
        assert_eq!(usage_error(&["vu", "check", "extra"]), ExitCode::from(2));
    }

    #[test]
    fn test_subcommands_parse() {
        assert!(matches!(parse_args(["vu", "check"]), Ok(Cli::Check)));
        assert!(matches!(parse_args(["vu", "pcheck"]), Ok(Cli::Pcheck)));
        assert!(matches!(parse_args(["vu", "upgrade"]), Ok(Cli::Upgrade)));
    }

    #[test]
    fn test_help_exits_0() {
        assert_eq!(usage_error(&["vu", "--help"]), ExitCode::SUCCESS);
    }

    #[test]
    fn test_check_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with(dir.path(), "1.4.4.8");

        let code = dispatch(Cli::Check, &config, &release_at(&config, "1.4.4.9"));
        assert_eq!(code, ExitCode::from(42));

        let code = dispatch(Cli::Pcheck, &config, &release_at(&config, "1.4.4.8"));
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn test_upgrade_without_update_exits_0() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with(dir.path(), "1.4.4.9");
        let code = dispatch(Cli::Upgrade, &config, &release_at(&config, "1.4.4.9"));
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[test]
    fn test_unreachable_release_exits_1() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with(dir.path(), "1.4.4.8");
        let code = dispatch(Cli::Check, &config, &FakeTransport::default());
        assert_eq!(code, ExitCode::from(1));
    }
}
