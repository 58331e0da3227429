use std::fmt;

use crate::archive;
use crate::config::UpgradeConfig;
use crate::deploy::Deployer;
use crate::error::UpgradeError;
use crate::fetch::Fetcher;
use crate::http::Transport;
use crate::release::ReleaseResolver;
use crate::reporter::Reporter;
use crate::version_store::VersionStore;

/// One stage of an upgrade. [`Step::PIPELINE`] is the order they run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    BackupExecs,
    BackupData,
    MoveCurrent,
    MakeNewDir,
    Fetch,
    Extract,
    Deploy,
}

impl Step {
    pub const PIPELINE: [Step; 7] = [
        Step::BackupExecs,
        Step::BackupData,
        Step::MoveCurrent,
        Step::MakeNewDir,
        Step::Fetch,
        Step::Extract,
        Step::Deploy,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Step::BackupExecs => "Backup Executables",
            Step::BackupData => "Backup Data Files",
            Step::MoveCurrent => "Move Current Inst.",
            Step::MakeNewDir => "Prepare Directory",
            Step::Fetch => "Retrieve File",
            Step::Extract => "Unzip New Server",
            Step::Deploy => "Deploy Start Files",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Process exit statuses for a completed (non-failing) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    NoUpdate,
    UpdateAvailable,
    Upgraded,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::NoUpdate => 0,
            ExitStatus::UpdateAvailable => 42,
            ExitStatus::Upgraded => 88,
        }
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        std::process::ExitCode::from(status.code())
    }
}

/// State of a single invocation. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeRun {
    pub installed: String,
    pub latest: String,
    pub completed: Vec<Step>,
}

impl UpgradeRun {
    pub fn new(installed: String, latest: String) -> Result<Self, UpgradeError> {
        if installed.trim().is_empty() {
            return Err(UpgradeError::parse("installed version", "empty release tag"));
        }
        if latest.trim().is_empty() {
            return Err(UpgradeError::parse("latest version", "empty release tag"));
        }
        Ok(Self {
            installed,
            latest,
            completed: Vec::new(),
        })
    }

    pub fn update_available(&self) -> bool {
        self.installed != self.latest
    }

    /// Exit status for the read-only check modes.
    pub fn check_status(&self) -> ExitStatus {
        if self.update_available() {
            ExitStatus::UpdateAvailable
        } else {
            ExitStatus::NoUpdate
        }
    }
}

/// Drives version resolution and the upgrade pipeline.
pub struct Upgrader<'a, T: Transport> {
    config: &'a UpgradeConfig,
    transport: &'a T,
    store: VersionStore,
}

impl<'a, T: Transport> Upgrader<'a, T> {
    pub fn new(config: &'a UpgradeConfig, transport: &'a T) -> Self {
        Self {
            config,
            transport,
            store: VersionStore::new(config),
        }
    }

    pub fn latest_version(&self) -> Result<String, UpgradeError> {
        ReleaseResolver::new(&self.config.release_url, self.transport).get_latest()
    }

    pub fn installed_version(&self) -> Result<String, UpgradeError> {
        self.store.get_installed()
    }

    /// Resolves both versions. Touches nothing but the version record backfill.
    pub fn resolve(&self) -> Result<UpgradeRun, UpgradeError> {
        let latest = self.latest_version()?;
        let installed = self.installed_version()?;
        UpgradeRun::new(installed, latest)
    }

    /// Resolves versions and, if they differ, runs every step in order,
    /// stopping at the first failure.
    pub fn upgrade(&self) -> Result<ExitStatus, UpgradeError> {
        let mut run = self.resolve()?;
        Reporter::release_status(&run.latest, &run.installed, run.update_available());

        if !run.update_available() {
            Reporter::no_update(&run.installed);
            return Ok(ExitStatus::NoUpdate);
        }

        Reporter::starting_upgrade(&run.installed, &run.latest);
        self.run_pipeline(&mut run)?;
        tracing::info!(steps = run.completed.len(), installed = %run.installed, "upgrade complete");
        Reporter::reboot_notice();
        Ok(ExitStatus::Upgraded)
    }

    pub fn run_pipeline(&self, run: &mut UpgradeRun) -> Result<(), UpgradeError> {
        for step in Step::PIPELINE {
            let _span = tracing::info_span!("step", step = step.label()).entered();
            self.execute(step, run).map_err(|err| err.in_step(step))?;
            run.completed.push(step);
            Reporter::step_ok(step);
        }
        Ok(())
    }

    /// Performs a single step against the current run state.
    pub fn execute(&self, step: Step, run: &mut UpgradeRun) -> Result<(), UpgradeError> {
        let config = self.config;
        let deployer = Deployer::new(config, &self.store);
        match step {
            Step::BackupExecs => archive::backup(
                &config.exec_backup_path(&run.installed),
                &config.install_dir(),
            ),
            Step::BackupData => archive::backup(
                &config.data_backup_path(&run.installed),
                &config.data_path(),
            ),
            Step::MoveCurrent => deployer.move_current_install(&run.installed).map(drop),
            Step::MakeNewDir => deployer.make_install_dir().map(drop),
            Step::Fetch => {
                let url = config.download_url.render(&run.latest);
                Fetcher::new(self.transport)
                    .download(&config.download_path(&run.latest), &url)
                    .map(drop)
            }
            Step::Extract => archive::extract(
                &config.download_path(&run.latest),
                &config.install_dir(),
            )
            .map(drop),
            Step::Deploy => {
                run.installed = deployer.deploy_start_files(&run.installed, &run.latest)?;
                Ok(())
            }
        }
    }
}
