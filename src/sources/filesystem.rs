use crate::config::AppConfig;
use crate::error::AppError;
use crate::metadata::{MediaCandidate, OriginKind};
use crate::source::MediaSource;
use crate::walker::list_media_files;
use chrono::{DateTime, Local, NaiveDate};
use std::path::Path;

/// Staging directory on the local disk, used when no device is ready.
pub struct LocalSource<'a> {
    config: &'a AppConfig,
}

impl<'a> LocalSource<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        log::debug!(
            "Initializing local source at {:?}",
            config.staging_directory
        );
        Self { config }
    }
}

impl MediaSource for LocalSource<'_> {
    fn kind(&self) -> OriginKind {
        OriginKind::LocalFilesystem
    }

    fn list_candidates(&self) -> Result<Vec<MediaCandidate>, AppError> {
        let files = list_media_files(
            &self.config.staging_directory,
            &self.config.allowed_extensions,
        )?;
        Ok(files
            .into_iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_string_lossy().into_owned();
                Some(MediaCandidate {
                    name,
                    origin: OriginKind::LocalFilesystem,
                    source_path: path.to_string_lossy().into_owned(),
                })
            })
            .collect())
    }

    fn materialize(&self, candidate: &MediaCandidate, dest: &Path) -> Result<(), AppError> {
        let source = Path::new(&candidate.source_path);
        if !source.is_file() {
            return Err(AppError::NotFound(candidate.source_path.clone()));
        }
        std::fs::copy(source, dest)?;
        Ok(())
    }

    fn modified_date(&self, candidate: &MediaCandidate) -> Option<NaiveDate> {
        let modified = std::fs::metadata(&candidate.source_path)
            .and_then(|m| m.modified())
            .map_err(|e| log::debug!("No modification time for {}: {}", candidate.source_path, e))
            .ok()?;
        Some(DateTime::<Local>::from(modified).date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::config_in;
    use tempfile::TempDir;

    fn staged(dir: &TempDir, names: &[&str]) -> AppConfig {
        let config = config_in(dir.path());
        std::fs::create_dir_all(&config.staging_directory).unwrap();
        for name in names {
            std::fs::write(config.staging_directory.join(name), name.as_bytes()).unwrap();
        }
        config
    }

    #[test]
    fn lists_staged_media() {
        let dir = TempDir::new().unwrap();
        let config = staged(&dir, &["IMG_2.jpg", "IMG_1.jpeg", "doc.pdf"]);
        let source = LocalSource::new(&config);
        let names: Vec<String> = source
            .list_candidates()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["IMG_1.jpeg", "IMG_2.jpg"]);
    }

    #[test]
    fn copies_into_destination() {
        let dir = TempDir::new().unwrap();
        let config = staged(&dir, &["IMG_1.jpg"]);
        let source = LocalSource::new(&config);
        let candidate = source.list_candidates().unwrap().remove(0);

        let dest = dir.path().join("copy.jpg");
        source.materialize(&candidate, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"IMG_1.jpg");
        assert!(Path::new(&candidate.source_path).exists());
    }

    #[test]
    fn vanished_source_is_not_found() {
        let dir = TempDir::new().unwrap();
        let config = staged(&dir, &["IMG_1.jpg"]);
        let source = LocalSource::new(&config);
        let candidate = source.list_candidates().unwrap().remove(0);
        std::fs::remove_file(&candidate.source_path).unwrap();

        let result = source.materialize(&candidate, &dir.path().join("copy.jpg"));
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn modified_date_from_filesystem() {
        let dir = TempDir::new().unwrap();
        let config = staged(&dir, &["VID_1.mp4"]);
        let source = LocalSource::new(&config);
        let candidate = source.list_candidates().unwrap().remove(0);
        let date = source.modified_date(&candidate).unwrap();
        let age = Local::now().date_naive() - date;
        assert!(age.num_days().abs() <= 1);
    }
}
