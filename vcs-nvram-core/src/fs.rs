//! Raw file persistence for non-volatile memory images.

use std::{
    fs::{create_dir_all, File},
    io::{Read, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::warn;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[must_use]
pub enum Error {
    #[error("invalid path: {0:?}")]
    InvalidPath(PathBuf),
    #[error("unexpected data length (expected {expected} bytes, found: {found})")]
    InvalidLength { expected: usize, found: usize },
    #[error("{context}: {source:?}")]
    Io {
        source: std::io::Error,
        context: String,
    },
}

impl Error {
    pub fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        Self::Io {
            source,
            context: context.into(),
        }
    }
}

fn writer_impl(path: impl AsRef<Path>) -> Result<impl Write> {
    let path = path.as_ref();
    let Some(directory) = path.parent() else {
        return Err(Error::InvalidPath(path.to_path_buf()));
    };
    if !directory.as_os_str().is_empty() && !directory.exists() {
        create_dir_all(directory)
            .map_err(|err| Error::io(err, format!("failed to create directory {directory:?}")))?;
    }
    File::create(path)
        .map_err(|source| Error::io(source, format!("failed to create file {path:?}")))
}

fn reader_impl(path: impl AsRef<Path>) -> Result<impl Read> {
    let path = path.as_ref();
    File::open(path).map_err(|source| Error::io(source, format!("failed to open file {path:?}")))
}

/// Writes `value` to `path` as-is, creating parent directories as needed.
///
/// # Errors
///
/// If the directory or file can't be created or written, then an error is returned.
pub fn save_raw(path: impl AsRef<Path>, value: &[u8]) -> Result<()> {
    let mut writer = writer_impl(path)?;
    writer
        .write_all(value)
        .map_err(|err| Error::io(err, "failed to save data"))?;
    writer
        .flush()
        .map_err(|err| Error::io(err, "failed to flush data"))
}

/// Reads the entire contents of `path`.
///
/// # Errors
///
/// If the file can't be opened or read, then an error is returned.
pub fn load_raw(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let mut reader = reader_impl(path)?;
    let mut data = vec![];
    reader
        .read_to_end(&mut data)
        .map_err(|err| Error::io(err, "failed to load data"))?;
    Ok(data)
}

/// Reads `path`, requiring it to hold exactly `len` bytes.
///
/// # Errors
///
/// If the file can't be read or its length differs from `len`, then an error is returned.
pub fn load_exact(path: impl AsRef<Path>, len: usize) -> Result<Vec<u8>> {
    let data = load_raw(path)?;
    if data.len() == len {
        Ok(data)
    } else {
        Err(Error::InvalidLength {
            expected: len,
            found: data.len(),
        })
    }
}

pub fn filename(path: &Path) -> &str {
    path.file_name()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or_else(|| {
            warn!("invalid path without file_name: {path:?}");
            "??"
        })
}
