//! A synchronous filesystem backend.

use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use thiserror::Error;

use crate::{ByteRegion, Bytes, MaybeBytes, StorageBackend, StorageError};

const CHUNKS_FILE: &str = "chunks.bin";
const METADATA_FILE: &str = "dataset.json";

/// A synchronous filesystem backend.
///
/// The backend occupies a directory containing
///  - `chunks.bin`: the chunk data region, and
///  - `dataset.json`: the metadata document.
#[derive(Debug)]
pub struct FilesystemBackend {
    base_path: PathBuf,
    file: Mutex<File>,
}

impl FilesystemBackend {
    /// Open or create a filesystem backend in the directory `base_path`.
    ///
    /// The directory is created if it does not exist.
    ///
    /// # Errors
    /// Returns a [`FilesystemBackendCreateError`] if `base_path`:
    ///   - is not valid,
    ///   - points to an existing file rather than a directory, or
    ///   - the chunk data file cannot be opened.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, FilesystemBackendCreateError> {
        let base_path = base_path.as_ref().to_path_buf();
        if base_path.to_str().is_none() {
            return Err(FilesystemBackendCreateError::InvalidBasePath(base_path));
        }
        if base_path.is_file() {
            return Err(FilesystemBackendCreateError::InvalidBasePath(base_path));
        }
        std::fs::create_dir_all(&base_path)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(base_path.join(CHUNKS_FILE))?;
        log::debug!("opened filesystem backend at {}", base_path.display());

        Ok(Self {
            base_path,
            file: Mutex::new(file),
        })
    }

    /// Return the base path of the backend.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn metadata_path(&self) -> PathBuf {
        self.base_path.join(METADATA_FILE)
    }
}

impl StorageBackend for FilesystemBackend {
    fn read_at(&self, offset: u64, length: u64) -> Result<Bytes, StorageError> {
        let mut file = self.file.lock();
        let size = file.metadata()?.len();
        let region = ByteRegion::new(offset, length);
        if region.end() > size {
            return Err(StorageError::OutOfBounds(region, size));
        }
        let length = usize::try_from(length)
            .map_err(|_| StorageError::Other(format!("{length} exceeds usize")))?;
        let mut buffer = vec![0; length];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buffer)?;
        Ok(Bytes::from(buffer))
    }

    fn write_at(&self, offset: u64, value: &[u8]) -> Result<(), StorageError> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(value)?;
        Ok(())
    }

    fn size(&self) -> Result<u64, StorageError> {
        Ok(self.file.lock().metadata()?.len())
    }

    fn truncate(&self, size: u64) -> Result<(), StorageError> {
        self.file.lock().set_len(size)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), StorageError> {
        let mut file = self.file.lock();
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    fn get_metadata(&self) -> Result<MaybeBytes, StorageError> {
        match std::fs::read(self.metadata_path()) {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set_metadata(&self, value: Bytes) -> Result<(), StorageError> {
        // write then rename, the document is replaced atomically
        let path = self.metadata_path();
        let tmp_path = path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&value)?;
            file.sync_data()?;
        }
        std::fs::rename(tmp_path, path)?;
        Ok(())
    }
}

/// A filesystem backend creation error.
#[derive(Debug, Error)]
pub enum FilesystemBackendCreateError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// The path is not valid on this system.
    #[error("base path {0} is not valid")]
    InvalidBasePath(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filesystem_backend() -> Result<(), Box<dyn std::error::Error>> {
        let path = tempfile::TempDir::new()?;
        {
            let backend = FilesystemBackend::new(path.path())?;
            backend.write_at(2, &[1, 2, 3, 4])?;
            assert_eq!(backend.size()?, 6);
            assert_eq!(backend.read_at(0, 6)?.as_ref(), &[0, 0, 1, 2, 3, 4]);
            assert!(backend.read_at(4, 4).is_err());
            assert!(backend.get_metadata()?.is_none());
            backend.set_metadata(Bytes::from_static(b"{\"a\":1}"))?;
            backend.flush()?;
        }
        let backend = FilesystemBackend::new(path.path())?;
        assert_eq!(backend.read_at(2, 4)?.as_ref(), &[1, 2, 3, 4]);
        assert_eq!(
            backend.get_metadata()?,
            Some(Bytes::from_static(b"{\"a\":1}"))
        );
        backend.truncate(3)?;
        assert_eq!(backend.size()?, 3);
        Ok(())
    }

    #[test]
    fn filesystem_backend_invalid_path() -> Result<(), Box<dyn std::error::Error>> {
        let file = tempfile::NamedTempFile::new()?;
        assert!(FilesystemBackend::new(file.path()).is_err());
        Ok(())
    }
}
