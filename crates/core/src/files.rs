//! Temporary files, compression and file transfer used when saving

use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::{NamedTempFile, TempDir};

const PRIVATE_DIR_PREFIX: &str = "pdf-editor-";

/// Compression applied to a saved copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionType {
    None,
    Gzip,
    Bzip2,
}

impl CompressionType {
    /// Compression implied by the extension of `path` (`.gz` or `.bz2`,
    /// case-insensitive)
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("gz") => Self::Gzip,
            Some("bz2") => Self::Bzip2,
            _ => Self::None,
        }
    }
}

/// Read `path`, transparently decompressing `.gz` and `.bz2` files
///
/// Returns the content and whether it was decompressed.
pub fn read_decompressed(path: &Path) -> io::Result<(Vec<u8>, bool)> {
    let raw = fs::read(path)?;

    let mut bytes = Vec::new();
    match CompressionType::from_path(path) {
        CompressionType::Gzip => {
            flate2::read::GzDecoder::new(raw.as_slice()).read_to_end(&mut bytes)?;
        }
        CompressionType::Bzip2 => {
            bzip2::read::BzDecoder::new(raw.as_slice()).read_to_end(&mut bytes)?;
        }
        CompressionType::None => return Ok((raw, false)),
    }

    Ok((bytes, true))
}

/// Temporary directory owned by one set of jobs
///
/// Created on first use as a uniquely named subdirectory of a shared parent,
/// readable only by the current user, and removed with everything in it
/// when dropped.
#[derive(Debug, Default)]
pub struct PrivateTempDir {
    dir: Mutex<Option<TempDir>>,
}

impl PrivateTempDir {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the directory, creating it in `parent` if needed
    pub fn path_in(&self, parent: &Path) -> io::Result<PathBuf> {
        let mut dir = self.dir.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(dir) = dir.as_ref() {
            return Ok(dir.path().to_path_buf());
        }

        fs::create_dir_all(parent)?;
        let created = tempfile::Builder::new()
            .prefix(PRIVATE_DIR_PREFIX)
            .tempdir_in(parent)?;
        let path = created.path().to_path_buf();
        tracing::debug!(path = %path.display(), "created private temporary directory");

        *dir = Some(created);
        Ok(path)
    }
}

/// Create a uniquely named, empty file `<prefix>.XXXXXX` in `dir`
///
/// The directory is created if needed. The file is removed when the returned
/// handle is dropped, unless it was persisted.
pub fn create_temp_file(dir: &Path, prefix: &str) -> io::Result<NamedTempFile> {
    fs::create_dir_all(dir)?;
    tempfile::Builder::new()
        .prefix(&format!("{prefix}."))
        .rand_bytes(6)
        .tempfile_in(dir)
}

/// Write a compressed copy of `source` into a new temporary file in `dir`
pub fn compress_file(
    source: &Path,
    compression: CompressionType,
    dir: &Path,
) -> io::Result<NamedTempFile> {
    let mut input = BufReader::new(File::open(source)?);
    let output = create_temp_file(dir, "compressed")?;

    {
        let writer = BufWriter::new(output.as_file());
        match compression {
            CompressionType::Gzip => {
                let mut encoder = GzEncoder::new(writer, flate2::Compression::default());
                io::copy(&mut input, &mut encoder)?;
                encoder.finish()?.flush()?;
            }
            CompressionType::Bzip2 => {
                let mut encoder = BzEncoder::new(writer, bzip2::Compression::default());
                io::copy(&mut input, &mut encoder)?;
                encoder.finish()?.flush()?;
            }
            CompressionType::None => {
                let mut writer = writer;
                io::copy(&mut input, &mut writer)?;
                writer.flush()?;
            }
        }
    }

    tracing::debug!(source = %source.display(), ?compression, "compressed temporary copy");
    Ok(output)
}

/// Move `file` to `target`, replacing it
///
/// Falls back to copying when a rename is not possible, e.g. across
/// filesystems. The temporary file is removed in every case.
pub fn transfer(file: NamedTempFile, target: &Path) -> io::Result<()> {
    match file.persist(target) {
        Ok(_) => Ok(()),
        Err(err) => {
            tracing::debug!(
                target = %target.display(),
                error = %err.error,
                "rename failed, copying instead"
            );
            fs::copy(err.file.path(), target)?;
            Ok(())
        }
    }
}
