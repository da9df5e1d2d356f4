use crate::bridge::CommandRunner;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::extractor;
use crate::geocoder::LocationResolver;
use crate::hasher::hash_file;
use crate::ledger::{Ledger, LedgerEntry};
use crate::metadata::{folder_key, MediaCandidate, OriginKind};
use crate::source::{select_source, MediaSource};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Accepted { folder: String },
    Duplicate,
    Deleted,
    Failed(String),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub origin: Option<OriginKind>,
    pub listed: usize,
    pub processed: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub deleted: usize,
    pub failed: usize,
    pub quarantined: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &FileOutcome) {
        self.processed += 1;
        match outcome {
            FileOutcome::Accepted { .. } => self.accepted += 1,
            FileOutcome::Duplicate => self.duplicates += 1,
            FileOutcome::Deleted => self.deleted += 1,
            FileOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Temporary working area; removed when dropped, whichever way the run ends.
struct TempArea {
    path: PathBuf,
}

impl TempArea {
    fn create(path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(path)?;
        log::debug!("Temporary working area ready at {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArea {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => log::debug!("Removed temporary working area {:?}", self.path),
            Err(e) => log::error!("Could not remove temporary working area {:?}: {}", self.path, e),
        }
    }
}

/// Drives one ingestion run: enumerate, then classify, hash and place each candidate.
pub struct Processor<'a> {
    config: &'a AppConfig,
    bridge: &'a dyn CommandRunner,
    resolver: &'a LocationResolver,
    local_only: bool,
}

impl<'a> Processor<'a> {
    pub fn new(
        config: &'a AppConfig,
        bridge: &'a dyn CommandRunner,
        resolver: &'a LocationResolver,
        local_only: bool,
    ) -> Self {
        Self {
            config,
            bridge,
            resolver,
            local_only,
        }
    }

    /// Origin and ledger failures abort the run; per-file failures are logged and skipped.
    pub fn run(&self) -> Result<RunSummary, AppError> {
        // The temp area is removed on exit, so it must not share a tree with real files.
        self.config.validate()?;
        let temp = TempArea::create(&self.config.temp_directory)?;
        let mut ledger = Ledger::load(&self.config.duplicates_file, &self.config.deleted_file)?;

        let source = select_source(self.config, self.bridge, self.local_only)?;
        let mut candidates = source.list_candidates()?;

        let mut summary = RunSummary {
            origin: Some(source.kind()),
            listed: candidates.len(),
            quarantined: ledger.quarantined().len(),
            ..RunSummary::default()
        };
        if candidates.len() > self.config.max_files_per_run {
            log::info!(
                "{} candidates listed, processing the first {} this run.",
                candidates.len(),
                self.config.max_files_per_run
            );
            candidates.truncate(self.config.max_files_per_run);
        }

        for candidate in &candidates {
            log::debug!("Processing started for: {} ({})", candidate.name, candidate.origin);
            let outcome = self
                .process_candidate(candidate, source.as_ref(), temp.path(), &mut ledger)
                .unwrap_or_else(|e| FileOutcome::Failed(e.to_string()));
            report(candidate, &outcome);
            summary.record(&outcome);
        }

        ledger.flush()?;
        log::debug!("Ledger now holds {} entries.", ledger.entries().len());
        log::info!(
            "Run finished: {} accepted, {} duplicates, {} deleted, {} failed ({} of {} listed).",
            summary.accepted,
            summary.duplicates,
            summary.deleted,
            summary.failed,
            summary.processed,
            summary.listed
        );
        Ok(summary)
    }

    fn process_candidate(
        &self,
        candidate: &MediaCandidate,
        source: &dyn MediaSource,
        temp_dir: &Path,
        ledger: &mut Ledger,
    ) -> Result<FileOutcome, AppError> {
        let local = temp_dir.join(&candidate.name);
        source.materialize(candidate, &local)?;

        let metadata = extractor::extract(&local, candidate, source);
        let place = self.resolver.resolve(metadata.coordinates);
        let date_label = metadata.date_label();
        let folder = folder_key(&place, &date_label);
        log::debug!(
            "{} classified: video={}, date={}, place={}",
            candidate.name,
            metadata.is_video,
            date_label,
            place
        );
        let dest_dir = self.config.destination_directory.join(&folder);
        std::fs::create_dir_all(&dest_dir)?;

        let hash = hash_file(self.config.hash_algorithm, &local)?;
        let outcome = if !ledger.is_new_hash(&hash) {
            FileOutcome::Duplicate
        } else if ledger.is_deleted(&hash) {
            FileOutcome::Deleted
        } else {
            let target = dest_dir.join(&candidate.name);
            if target.exists() {
                return Err(AppError::DestinationExists(target));
            }
            std::fs::copy(&local, &target)?;
            ledger.append(LedgerEntry {
                hash,
                destination_path: target.to_string_lossy().into_owned(),
                place_label: place.as_str().to_string(),
                date_label,
                latitude: metadata.coordinates.map(|c| c.latitude),
                longitude: metadata.coordinates.map(|c| c.longitude),
            });
            FileOutcome::Accepted { folder }
        };

        if let Err(e) = std::fs::remove_file(&local) {
            log::trace!("Could not remove {:?} early: {}", local, e);
        }
        Ok(outcome)
    }
}

fn report(candidate: &MediaCandidate, outcome: &FileOutcome) {
    match outcome {
        FileOutcome::Accepted { folder } => log::info!("{} -> {}", candidate.name, folder),
        FileOutcome::Duplicate => {
            log::info!("Duplicate detected: {} - not copied", candidate.name)
        }
        FileOutcome::Deleted => {
            log::info!("Previously deleted: {} - not copied", candidate.name)
        }
        FileOutcome::Failed(reason) => log::warn!("Skipping {}: {}", candidate.name, reason),
    }
}
