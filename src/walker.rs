use crate::error::AppError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lists the media files directly inside `directory`, sorted by file name.
pub fn list_media_files(
    directory: &Path,
    allowed_extensions: &HashSet<String>,
) -> Result<Vec<PathBuf>, AppError> {
    log::info!("Starting file discovery in {:?}", directory);
    log::debug!("Configured allowed extensions: {:?}", allowed_extensions);

    let mut files = Vec::new();
    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if entry.file_type().is_file() {
            let path = entry.path();
            log::trace!("Discovered file: {:?}", path);
            if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
                if allowed_extensions.contains(&ext.to_lowercase()) {
                    files.push(path.to_path_buf());
                } else {
                    log::trace!("Skipping file due to unsupported extension: {:?}", path);
                }
            } else {
                log::trace!("Skipping file with no extension: {:?}", path);
            }
        } else {
            log::trace!("Skipping non-file entry: {:?}", entry.path());
        }
    }

    log::info!("File discovery complete, {} media files.", files.len());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lists_one_level_filtered_and_sorted() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for name in ["b.JPG", "a.mp4", "c.txt", "noext"] {
            std::fs::write(root.join(name), name).unwrap();
        }
        std::fs::create_dir(root.join("nested")).unwrap();
        std::fs::write(root.join("nested/d.jpg"), "d").unwrap();

        let allowed = ["jpg", "jpeg", "mp4"].iter().map(|s| s.to_string()).collect();
        let files = list_media_files(root, &allowed).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.mp4", "b.JPG"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let allowed = HashSet::new();
        assert!(list_media_files(&dir.path().join("absent"), &allowed).is_err());
    }
}
