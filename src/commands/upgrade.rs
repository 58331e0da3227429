use crate::config::UpgradeConfig;
use crate::error::UpgradeError;
use crate::http::Transport;
use crate::upgrade::{ExitStatus, Upgrader};

pub fn upgrade_command<T: Transport>(
    config: &UpgradeConfig,
    transport: &T,
) -> Result<ExitStatus, UpgradeError> {
    let _span = tracing::info_span!("upgrade", install = %config.install_dir().display()).entered();
    let status = Upgrader::new(config, transport).upgrade()?;
    tracing::info!(code = status.code(), "upgrade finished");
    Ok(status)
}
