use crate::error::AppError;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha256,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub device_path: String,
    pub bridge_program: String,
    pub bridge_timeout_secs: u64,
    pub staging_directory: PathBuf,
    pub temp_directory: PathBuf,
    pub destination_directory: PathBuf,
    pub duplicates_file: PathBuf,
    pub deleted_file: PathBuf,
    pub allowed_extensions: HashSet<String>,
    pub max_files_per_run: usize,
    pub hash_algorithm: HashAlgorithm,
    pub geocoder_url: String,
    pub geocoder_user_agent: String,
    pub geocoder_language: String,
    pub geocoder_timeout_secs: u64,
    pub geocoder_delay_ms: u64,
    pub city_component_from_end: usize,
    pub log_level: String,
}

impl AppConfig {
    /// Layers `default`, the `RUN_MODE` file, `local` and `INGEST_*` variables.
    pub fn new(config_dir: &Path) -> Result<Self, ConfigError> {
        let env = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::from(config_dir.join("default")))
            .add_source(File::from(config_dir.join(&env)).required(false))
            .add_source(File::from(config_dir.join("local")).required(false))
            .add_source(Environment::with_prefix("INGEST").try_parsing(true))
            .build()?;

        s.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_files_per_run == 0 {
            return Err(AppError::InvalidConfig(
                "max_files_per_run must be at least 1".into(),
            ));
        }
        if self.city_component_from_end < 2 {
            return Err(AppError::InvalidConfig(
                "city_component_from_end must be at least 2, the last component is the country"
                    .into(),
            ));
        }
        url::Url::parse(&self.geocoder_url)?;

        // The temporary area is deleted at the end of every run.
        let temp = resolved(&self.temp_directory)?;
        for (name, dir) in [
            ("staging_directory", &self.staging_directory),
            ("destination_directory", &self.destination_directory),
        ] {
            let other = resolved(dir)?;
            if temp.starts_with(&other) || other.starts_with(&temp) {
                return Err(AppError::InvalidConfig(format!(
                    "temp_directory {:?} overlaps {} {:?}",
                    self.temp_directory, name, dir
                )));
            }
        }
        Ok(())
    }

    pub fn bridge_timeout(&self) -> Duration {
        Duration::from_secs(self.bridge_timeout_secs)
    }

    pub fn geocoder_timeout(&self) -> Duration {
        Duration::from_secs(self.geocoder_timeout_secs)
    }

    pub fn geocoder_delay(&self) -> Duration {
        Duration::from_millis(self.geocoder_delay_ms)
    }

    pub fn is_allowed(&self, file_name: &str) -> bool {
        Path::new(file_name)
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| self.allowed_extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }
}

/// Absolute, `.`/`..`-free form of `path`, with the existing part canonicalized.
fn resolved(path: &Path) -> Result<PathBuf, AppError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut lexical = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                lexical.pop();
            }
            other => lexical.push(other),
        }
    }

    let mut existing = lexical.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return Ok(missing.iter().rev().fold(canonical, |acc, part| acc.join(part)));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(lexical),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Config rooted in `root`, with no network or device dependencies.
    pub(crate) fn config_in(root: &Path) -> AppConfig {
        AppConfig {
            device_path: "/sdcard/DCIM/Camera".into(),
            bridge_program: "adb".into(),
            bridge_timeout_secs: 5,
            staging_directory: root.join("staging"),
            temp_directory: root.join("tmp"),
            destination_directory: root.join("backup"),
            duplicates_file: root.join("duplicados.json"),
            deleted_file: root.join("eliminados.json"),
            allowed_extensions: ["jpg", "jpeg", "mp4"].iter().map(|s| s.to_string()).collect(),
            max_files_per_run: 15,
            hash_algorithm: HashAlgorithm::Md5,
            geocoder_url: "https://nominatim.openstreetmap.org/reverse".into(),
            geocoder_user_agent: "clasificador_fotos".into(),
            geocoder_language: "es".into(),
            geocoder_timeout_secs: 10,
            geocoder_delay_ms: 0,
            city_component_from_end: 4,
            log_level: "info".into(),
        }
    }

    #[test]
    fn loads_layered_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let default = std::fs::read_to_string(
            Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml"),
        )
        .unwrap();
        std::fs::write(dir.path().join("default.toml"), default).unwrap();
        std::fs::write(dir.path().join("local.toml"), "max_files_per_run = 40\n").unwrap();

        let config = AppConfig::new(dir.path()).unwrap();
        assert_eq!(config.max_files_per_run, 40);
        assert_eq!(config.hash_algorithm, HashAlgorithm::Md5);
        assert_eq!(config.device_path, "/sdcard/DCIM/Camera");
        assert!(config.allowed_extensions.contains("mp4"));
        config.validate().unwrap();
    }

    #[test]
    fn extension_filter_ignores_case() {
        let config = config_in(Path::new("/x"));
        assert!(config.is_allowed("IMG_0001.JPG"));
        assert!(config.is_allowed("clip.Mp4"));
        assert!(config.is_allowed("a.jpeg"));
        assert!(!config.is_allowed("notes.txt"));
        assert!(!config.is_allowed("README"));
    }

    #[test]
    fn rejects_zero_batch_size() {
        let mut config = config_in(Path::new("/x"));
        config.max_files_per_run = 0;
        assert!(matches!(config.validate(), Err(AppError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_city_offset_that_would_pick_the_country() {
        let mut config = config_in(Path::new("/x"));
        config.city_component_from_end = 1;
        assert!(matches!(config.validate(), Err(AppError::InvalidConfig(_))));
        config.city_component_from_end = 2;
        config.validate().unwrap();
    }

    #[test]
    fn rejects_temp_area_equal_to_staging() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        std::fs::create_dir_all(&config.staging_directory).unwrap();
        config.temp_directory = config.staging_directory.clone();
        assert!(matches!(config.validate(), Err(AppError::InvalidConfig(_))));

        config.temp_directory = config.staging_directory.join("sub/../.");
        assert!(matches!(config.validate(), Err(AppError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_temp_area_overlapping_destination() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        config.temp_directory = config.destination_directory.join("tmp");
        assert!(matches!(config.validate(), Err(AppError::InvalidConfig(_))));

        config.temp_directory = dir.path().to_path_buf();
        assert!(matches!(config.validate(), Err(AppError::InvalidConfig(_))));
    }

    #[test]
    fn accepts_separate_working_areas() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = config_in(dir.path());
        config.validate().unwrap();
    }

    #[test]
    fn rejects_bad_geocoder_url() {
        let mut config = config_in(Path::new("/x"));
        config.geocoder_url = "not a url".into();
        assert!(matches!(config.validate(), Err(AppError::Url(_))));
    }
}
