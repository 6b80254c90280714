//! Download and extraction of the CIFAR-10 binary archive.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::info;

use cifar_core::{Error, Result};

/// Download URL for the binary version of CIFAR-10
pub const CIFAR10_URL: &str = "https://www.cs.toronto.edu/~kriz/cifar-10-binary.tar.gz";

/// Archive file name inside the data directory
const ARCHIVE_NAME: &str = "cifar-10-binary.tar.gz";

/// Directory name produced by extracting the archive
const EXTRACTED_DIR: &str = "cifar-10-batches-bin";

/// Ensures the CIFAR-10 binary batches are present under `data_dir`.
///
/// Downloads and extracts the archive on first use; subsequent calls are
/// no-ops. Returns the path to the directory holding the `.bin` batch files.
pub fn ensure_dataset(data_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(data_dir)?;

    let extracted_dir = data_dir.join(EXTRACTED_DIR);
    if extracted_dir.join("test_batch.bin").exists() {
        info!("CIFAR-10 already present at {}", extracted_dir.display());
        return Ok(extracted_dir);
    }

    let archive_path = data_dir.join(ARCHIVE_NAME);
    if !archive_path.exists() {
        download_archive(&archive_path)?;
    } else {
        info!("CIFAR-10 archive already downloaded, skipping");
    }

    info!("Extracting {}", archive_path.display());
    extract_tar_gz(&archive_path, data_dir)?;

    if !extracted_dir.join("test_batch.bin").exists() {
        return Err(Error::Dataset(format!(
            "Archive extraction did not produce {}",
            extracted_dir.display()
        )));
    }

    Ok(extracted_dir)
}

fn download_archive(archive_path: &Path) -> Result<()> {
    info!("Downloading CIFAR-10 from {}", CIFAR10_URL);

    let response = reqwest::blocking::get(CIFAR10_URL)
        .map_err(|e| Error::Download(format!("Request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::Download(format!(
            "Server returned status {}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .map_err(|e| Error::Download(format!("Failed to read response body: {e}")))?;

    let mut file = File::create(archive_path)?;
    file.write_all(&bytes)?;

    info!("Download complete ({} bytes)", bytes.len());
    Ok(())
}

fn extract_tar_gz(archive_path: &Path, output_dir: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let decompressor = GzDecoder::new(file);
    let mut archive = tar::Archive::new(decompressor);

    archive
        .unpack(output_dir)
        .map_err(|e| Error::Dataset(format!("Failed to extract archive: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn fake_archive(dir: &Path) -> PathBuf {
        // Builds a minimal tar.gz holding an empty test_batch.bin
        let inner = dir.join("staging");
        fs::create_dir_all(inner.join(EXTRACTED_DIR)).unwrap();
        fs::write(inner.join(EXTRACTED_DIR).join("test_batch.bin"), []).unwrap();

        let archive_path = dir.join(ARCHIVE_NAME);
        let file = File::create(&archive_path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder
            .append_dir_all(EXTRACTED_DIR, inner.join(EXTRACTED_DIR))
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();
        archive_path
    }

    #[test]
    fn test_extract_existing_archive() {
        let dir = tempfile::tempdir().unwrap();
        fake_archive(dir.path());

        let extracted = ensure_dataset(dir.path()).unwrap();
        assert!(extracted.join("test_batch.bin").exists());
    }

    #[test]
    fn test_skip_when_already_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let extracted = dir.path().join(EXTRACTED_DIR);
        fs::create_dir_all(&extracted).unwrap();
        fs::write(extracted.join("test_batch.bin"), []).unwrap();

        let result = ensure_dataset(dir.path()).unwrap();
        assert_eq!(result, extracted);
    }
}
