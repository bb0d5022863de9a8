//! Extraction of the node executable from a release archive.
//!
//! Release assets are either gzip-compressed tarballs (Linux) or zip files
//! (macOS). The extractor scans every entry for a regular file whose base name
//! matches the binary name, case-insensitively, with or without a `.exe`
//! suffix. Archives are held in memory; nothing is written to disk here.

use std::io::{Cursor, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::constants::PREALLOCATION_LIMIT;
use crate::core::PiriError;

/// Container format of a downloaded asset, derived from its filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
    /// Not an archive: the asset is the executable itself.
    Raw,
}

impl ArchiveFormat {
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Self::TarGz
        } else if lower.ends_with(".zip") {
            Self::Zip
        } else {
            Self::Raw
        }
    }
}

/// Return the bytes of the `binary` entry inside `data`.
///
/// `filename` names the asset for format detection and error messages.
pub fn extract_executable(
    data: &[u8],
    filename: &str,
    binary: &str,
) -> Result<Vec<u8>, PiriError> {
    match ArchiveFormat::from_filename(filename) {
        ArchiveFormat::TarGz => extract_from_tar_gz(data, filename, binary),
        ArchiveFormat::Zip => extract_from_zip(data, filename, binary),
        ArchiveFormat::Raw => {
            debug!("{} is not an archive, using it as the executable", filename);
            Ok(data.to_vec())
        }
    }
}

fn matches_binary(entry_path: &Path, binary: &str) -> bool {
    let Some(name) = entry_path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let name = name.to_ascii_lowercase();
    let binary = binary.to_ascii_lowercase();
    name == binary || name.strip_suffix(".exe") == Some(binary.as_str())
}

fn archive_error(filename: &str, err: impl std::fmt::Display) -> PiriError {
    PiriError::ArchiveError {
        archive: filename.to_string(),
        reason: err.to_string(),
    }
}

fn extract_from_tar_gz(data: &[u8], filename: &str, binary: &str) -> Result<Vec<u8>, PiriError> {
    let mut archive = tar::Archive::new(GzDecoder::new(Cursor::new(data)));
    let entries = archive.entries().map_err(|e| archive_error(filename, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| archive_error(filename, e))?;
        let path = entry.path().map_err(|e| archive_error(filename, e))?.into_owned();

        if !matches_binary(&path, binary) {
            continue;
        }
        if !entry.header().entry_type().is_file() {
            debug!("Skipping non-regular entry {}", path.display());
            continue;
        }

        let mut contents = Vec::with_capacity(entry.size().min(PREALLOCATION_LIMIT) as usize);
        entry.read_to_end(&mut contents).map_err(|e| archive_error(filename, e))?;
        debug!("Extracted {} ({} bytes) from {}", path.display(), contents.len(), filename);
        return Ok(contents);
    }

    Err(PiriError::ExecutableNotFound {
        binary: binary.to_string(),
        archive: filename.to_string(),
    })
}

fn extract_from_zip(data: &[u8], filename: &str, binary: &str) -> Result<Vec<u8>, PiriError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(data)).map_err(|e| archive_error(filename, e))?;

    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(|e| archive_error(filename, e))?;
        let name = file.name().to_string();

        if !matches_binary(Path::new(&name), binary) {
            continue;
        }
        if !file.is_file() || file.is_symlink() {
            debug!("Skipping non-regular entry {}", name);
            continue;
        }

        let mut contents = Vec::with_capacity(file.size().min(PREALLOCATION_LIMIT) as usize);
        file.read_to_end(&mut contents).map_err(|e| archive_error(filename, e))?;
        debug!("Extracted {} ({} bytes) from {}", name, contents.len(), filename);
        return Ok(contents);
    }

    Err(PiriError::ExecutableNotFound {
        binary: binary.to_string(),
        archive: filename.to_string(),
    })
}
