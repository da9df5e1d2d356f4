use crate::bridge::{has_ready_device, CommandRunner};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::metadata::{MediaCandidate, OriginKind};
use crate::sources::{device::DeviceSource, filesystem::LocalSource};
use chrono::NaiveDate;
use std::path::Path;

/// Where the candidate files of one run come from.
pub trait MediaSource {
    fn kind(&self) -> OriginKind;
    fn list_candidates(&self) -> Result<Vec<MediaCandidate>, AppError>;
    /// Copies the candidate to `dest`, a path inside the temporary working area.
    fn materialize(&self, candidate: &MediaCandidate, dest: &Path) -> Result<(), AppError>;
    /// Last-modified date as reported by the origin.
    fn modified_date(&self, candidate: &MediaCandidate) -> Option<NaiveDate>;
}

pub fn device_available(runner: &dyn CommandRunner) -> bool {
    match runner.run(&["devices"]) {
        Ok(output) => has_ready_device(&output),
        Err(e) => {
            log::debug!("Device probe failed: {}", e);
            false
        }
    }
}

/// Picks the origin for the whole run: the device when one is ready, else the staging directory.
pub fn select_source<'a>(
    config: &'a AppConfig,
    runner: &'a dyn CommandRunner,
    local_only: bool,
) -> Result<Box<dyn MediaSource + 'a>, AppError> {
    if !local_only && device_available(runner) {
        log::info!("Device ready, reading from {}", config.device_path);
        return Ok(Box::new(DeviceSource::new(config, runner)));
    }

    if config.staging_directory.is_dir() {
        log::info!(
            "No device in use, reading from staging directory {:?}",
            config.staging_directory
        );
        return Ok(Box::new(LocalSource::new(config)));
    }

    let device = if local_only {
        "device probe disabled"
    } else {
        "no device in ready state"
    };
    Err(AppError::OriginUnavailable(format!(
        "{} and staging directory {:?} does not exist",
        device, config.staging_directory
    )))
}
