use std::time::{Duration, Instant};

use crate::config::UpgradeConfig;
use crate::error::UpgradeError;
use crate::http::Transport;
use crate::reporter::Reporter;
use crate::upgrade::{ExitStatus, UpgradeRun, Upgrader};

/// `check` and `pcheck`: report whether a newer release exists. With
/// `profile` set each resolution phase is timed and printed.
pub fn check_command<T: Transport>(
    config: &UpgradeConfig,
    transport: &T,
    profile: bool,
) -> Result<ExitStatus, UpgradeError> {
    let upgrader = Upgrader::new(config, transport);
    let _span = tracing::info_span!("check", profile).entered();

    let (installed, installed_took) = timed(|| upgrader.installed_version())?;
    let (latest, latest_took) = timed(|| upgrader.latest_version())?;
    let run = UpgradeRun::new(installed, latest)?;

    Reporter::check_summary(&run);
    if profile {
        Reporter::profile(&[
            ("Installed lookup", installed_took),
            ("Latest lookup", latest_took),
            ("Total", installed_took + latest_took),
        ]);
    }
    tracing::debug!(installed = %run.installed, latest = %run.latest, "check finished");
    Ok(run.check_status())
}

fn timed<R>(f: impl FnOnce() -> Result<R, UpgradeError>) -> Result<(R, Duration), UpgradeError> {
    let started = Instant::now();
    let value = f()?;
    Ok((value, started.elapsed()))
}
