//! One collection = one JSON array file, replaced by temp-file + rename.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;

use super::error::{StoreError, StoreResult};
use super::record::{Record, ensure_unique_ids};

const FILE_EXTENSION: &str = "json";

/// Validated collection name, safe to use as a file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionName(String);

impl CollectionName {
    pub fn new(name: &str) -> StoreResult<Self> {
        let valid = !name.is_empty()
            && name.len() <= 64
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidCollection {
                name: name.to_string(),
            });
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Filesystem view of a single collection.
#[derive(Debug, Clone)]
pub struct CollectionFile {
    name: CollectionName,
    dir: PathBuf,
    path: PathBuf,
}

impl CollectionFile {
    pub fn new(dir: &Path, name: CollectionName) -> Self {
        let path = dir.join(format!("{}.{}", name.as_str(), FILE_EXTENSION));
        Self {
            name,
            dir: dir.to_path_buf(),
            path,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn collection_name(&self) -> &CollectionName {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the collection file is present. A path that exists but is not
    /// a regular file is an I/O error, the same way [`Self::read`] sees it.
    pub fn exists(&self) -> StoreResult<bool> {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.is_file() => Ok(true),
            Ok(_) => Err(StoreError::io(
                self.name(),
                &self.path,
                std::io::Error::other("collection path is not a regular file"),
            )),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StoreError::io(self.name(), &self.path, err)),
        }
    }

    /// Reads and validates the whole collection. A missing file is empty.
    pub fn read(&self) -> StoreResult<Vec<Record>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io(self.name(), &self.path, err)),
        };
        self.decode(&bytes)
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<Vec<Record>> {
        let parsed: Value = serde_json::from_slice(bytes)
            .map_err(|err| StoreError::corrupt(self.name(), format!("invalid JSON: {err}")))?;
        let Value::Array(items) = parsed else {
            return Err(StoreError::corrupt(self.name(), "top-level value is not an array"));
        };

        let records = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                Record::try_from(item).map_err(|err| {
                    StoreError::corrupt(self.name(), format!("element {index}: {err}"))
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        ensure_unique_ids(self.name(), &records)
            .map_err(|err| StoreError::corrupt(self.name(), err.to_string()))?;
        Ok(records)
    }

    /// Writes the full collection to a temp file next to the target and syncs it.
    /// Nothing is visible at the collection path until [`StagedWrite::commit`].
    pub fn stage(&self, records: &[Record]) -> StoreResult<StagedWrite> {
        fs::create_dir_all(&self.dir).map_err(|err| StoreError::io(self.name(), &self.dir, err))?;

        let temp = tempfile::Builder::new()
            .prefix(&format!(".{}.{}.", self.name(), FILE_EXTENSION))
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(|err| StoreError::io(self.name(), &self.dir, err))?;

        let temp_path = temp.path().to_path_buf();
        let mut writer = BufWriter::new(temp.as_file());
        serde_json::to_writer_pretty(&mut writer, records).map_err(|err| {
            StoreError::io(self.name(), &temp_path, std::io::Error::other(err))
        })?;
        writer
            .write_all(b"\n")
            .and_then(|()| writer.flush())
            .map_err(|err| StoreError::io(self.name(), &temp_path, err))?;
        drop(writer);

        temp.as_file()
            .sync_all()
            .map_err(|err| StoreError::io(self.name(), &temp_path, err))?;

        Ok(StagedWrite {
            temp,
            target: self.path.clone(),
            dir: self.dir.clone(),
            collection: self.name().to_string(),
        })
    }

    pub fn write(&self, records: &[Record]) -> StoreResult<()> {
        self.stage(records)?.commit()
    }
}

/// A fully written and synced temp file waiting to replace the collection file.
///
/// Dropping it without committing removes the temp file and leaves the
/// collection untouched.
#[derive(Debug)]
pub struct StagedWrite {
    temp: NamedTempFile,
    target: PathBuf,
    dir: PathBuf,
    collection: String,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Atomically renames the temp file over the collection file.
    pub fn commit(self) -> StoreResult<()> {
        let Self {
            temp,
            target,
            dir,
            collection,
        } = self;

        temp.persist(&target)
            .map_err(|err| StoreError::io(&collection, &target, err.error))?;
        sync_dir(&dir).map_err(|err| StoreError::io(&collection, &dir, err))?;
        Ok(())
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
