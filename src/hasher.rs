use crate::config::HashAlgorithm;
use crate::error::AppError;
use md5::Md5;
use sha2::digest::Output;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BLOCK_SIZE: usize = 4096;

/// Hex digest of a file's contents, read in fixed-size blocks.
pub fn hash_file(algorithm: HashAlgorithm, path: &Path) -> Result<String, AppError> {
    let hash = match algorithm {
        HashAlgorithm::Md5 => format!("{:x}", digest_file::<Md5>(path)?),
        HashAlgorithm::Sha256 => format!("{:x}", digest_file::<Sha256>(path)?),
    };
    log::debug!("Calculated hash for {:?}: {}", path, hash);
    Ok(hash)
}

fn digest_file<D: Digest>(path: &Path) -> Result<Output<D>, AppError> {
    log::trace!("Calculating hash for: {:?}", path);
    let mut file = File::open(path)?;
    let mut hasher = D::new();
    let mut buffer = [0; BLOCK_SIZE];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize())
}
