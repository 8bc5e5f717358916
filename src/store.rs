use std::{
    ffi::OsString,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tokio::sync::{Mutex, MutexGuard};

use crate::types::Book;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read books file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse books file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize books")]
    Serialize(#[source] serde_json::Error),
    #[error("Failed to create directory {}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write books file {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to move {} to {}", .from.display(), .to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("No id left after {max_id}")]
    IdsExhausted { max_id: u64 },
}

/// Flat-file store holding the entire collection as one pretty-printed JSON array.
///
/// Every read loads the whole file and every write replaces it. Callers that
/// read, modify and write the collection must hold the guard returned by
/// [`BookStore::lock`] for the whole cycle.
#[derive(Debug)]
pub struct BookStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl BookStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serializes read-modify-write cycles of this process.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    /// Reads the collection, treating a missing or blank file as empty.
    #[tracing::instrument(skip_all, fields(path = %self.path.display()))]
    pub async fn try_read_all(&self) -> Result<Vec<Book>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!("Books file does not exist");

                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let books: Vec<Book> =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;

        tracing::trace!(count = books.len(), "Read books");

        Ok(books)
    }

    /// Reads the collection. Any failure is logged and yields an empty collection.
    pub async fn read_all(&self) -> Vec<Book> {
        match self.try_read_all().await {
            Ok(books) => books,
            Err(err) => {
                let err = anyhow::Error::from(err);
                tracing::warn!(err = %format!("{err:#}"), "Falling back to an empty collection");

                Vec::new()
            }
        }
    }

    /// Replaces the backing file with `books`.
    ///
    /// The collection is written to a sibling `.tmp` file first and then renamed over the
    /// backing file, so readers never observe a partially written file.
    #[tracing::instrument(skip_all, fields(path = %self.path.display(), count = books.len()))]
    pub async fn try_write_all(&self, books: &[Book]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(books).map_err(StoreError::Serialize)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let tmp_path = self.tmp_path();

        tokio::fs::write(&tmp_path, bytes)
            .await
            .map_err(|source| StoreError::Write {
                path: tmp_path.clone(),
                source,
            })?;

        if let Err(source) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;

            return Err(StoreError::Rename {
                from: tmp_path,
                to: self.path.clone(),
                source,
            });
        }

        tracing::trace!("Wrote books");

        Ok(())
    }

    /// Replaces the backing file with `books`. Failures are logged, not returned.
    pub async fn write_all(&self, books: &[Book]) {
        if let Err(err) = self.try_write_all(books).await {
            let err = anyhow::Error::from(err);
            tracing::error!(err = %format!("{err:#}"), "Books were not persisted");
        }
    }

    /// Probes the backing file and returns the number of books it holds.
    pub async fn check_startup(&self) -> Result<usize, StoreError> {
        self.try_read_all().await.map(|books| books.len())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut file_name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("books.json"));
        file_name.push(".tmp");

        self.path.with_file_name(file_name)
    }
}

/// Returns the id for the next book: one more than the highest id, or `1` for an empty collection.
pub fn next_id(books: &[Book]) -> Result<u64, StoreError> {
    match books.iter().map(|book| book.id).max() {
        None => Ok(1),
        Some(max_id) => max_id
            .checked_add(1)
            .ok_or(StoreError::IdsExhausted { max_id }),
    }
}
