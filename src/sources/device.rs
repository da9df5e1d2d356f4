use crate::bridge::{parse_listing, parse_stat_date, CommandRunner};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::metadata::{MediaCandidate, OriginKind};
use crate::source::MediaSource;
use chrono::NaiveDate;
use std::path::Path;

pub struct DeviceSource<'a> {
    config: &'a AppConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> DeviceSource<'a> {
    pub fn new(config: &'a AppConfig, runner: &'a dyn CommandRunner) -> Self {
        log::debug!("Initializing device source at {}", config.device_path);
        Self { config, runner }
    }

    fn remote_path(&self, name: &str) -> String {
        format!("{}/{}", self.config.device_path.trim_end_matches('/'), name)
    }
}

impl MediaSource for DeviceSource<'_> {
    fn kind(&self) -> OriginKind {
        OriginKind::Device
    }

    fn list_candidates(&self) -> Result<Vec<MediaCandidate>, AppError> {
        let command = format!("ls {}", self.config.device_path);
        let output = self.runner.run(&["shell", command.as_str()])?;

        let candidates: Vec<MediaCandidate> = parse_listing(&output)
            .into_iter()
            .filter(|name| {
                let keep = self.config.is_allowed(name);
                if !keep {
                    log::trace!("Skipping device entry with unsupported extension: {}", name);
                }
                keep
            })
            .map(|name| MediaCandidate {
                source_path: self.remote_path(&name),
                name,
                origin: OriginKind::Device,
            })
            .collect();

        log::info!("Device lists {} media files.", candidates.len());
        Ok(candidates)
    }

    fn materialize(&self, candidate: &MediaCandidate, dest: &Path) -> Result<(), AppError> {
        let local = dest.to_string_lossy();
        self.runner
            .run(&["pull", candidate.source_path.as_str(), &*local])?;
        if !dest.is_file() {
            return Err(AppError::NotFound(format!(
                "pull of {} produced no local file",
                candidate.source_path
            )));
        }
        Ok(())
    }

    fn modified_date(&self, candidate: &MediaCandidate) -> Option<NaiveDate> {
        let command = format!("stat -c %y {}", candidate.source_path);
        let output = self
            .runner
            .run(&["shell", command.as_str()])
            .map_err(|e| log::debug!("stat failed for {}: {}", candidate.source_path, e))
            .ok()?;
        parse_stat_date(&output)
    }
}
