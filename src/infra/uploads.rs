//! Per-entry upload storage and retrieval helpers.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use flog_api_types::secure_filename;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};

/// Errors that can occur while interacting with the upload storage backend.
#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error("file name `{name}` has no usable characters")]
    InvalidName { name: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Filesystem-backed upload storage, one directory per entry slug.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Replace every file stored for `slug` with `files`.
    ///
    /// Names pass through [`secure_filename`]; the stored names are returned in
    /// input order.
    pub async fn replace_entry_files(
        &self,
        slug: &str,
        files: Vec<(String, Bytes)>,
    ) -> Result<Vec<String>, UploadStorageError> {
        let mut prepared = Vec::with_capacity(files.len());
        for (name, data) in files {
            let stored = secure_filename(&name);
            if stored.is_empty() {
                return Err(UploadStorageError::InvalidName { name });
            }
            prepared.push((stored, data));
        }

        let directory = self.resolve(slug)?;
        match fs::remove_dir_all(&directory).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(UploadStorageError::Io(err)),
        }
        fs::create_dir_all(&directory).await?;

        let mut stored_names = Vec::with_capacity(prepared.len());
        for (name, data) in prepared {
            let mut file = fs::File::create(directory.join(&name)).await?;
            file.write_all(&data).await?;
            file.flush().await?;
            stored_names.push(name);
        }
        Ok(stored_names)
    }

    /// Read one stored file into memory.
    pub async fn read(&self, slug: &str, name: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(&format!("{slug}/{name}"))?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove every file stored for `slug`. Missing directories are treated as success.
    pub async fn delete_entry_files(&self, slug: &str) -> Result<(), UploadStorageError> {
        let directory = self.resolve(slug)?;
        match fs::remove_dir_all(&directory).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative.components().any(|component| {
                matches!(
                    component,
                    Component::ParentDir | Component::Prefix(_) | Component::RootDir
                )
            })
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replace_empties_the_entry_directory_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");

        storage
            .replace_entry_files(
                "hello",
                vec![("old.png".into(), Bytes::from_static(b"old"))],
            )
            .await
            .expect("first batch");
        let stored = storage
            .replace_entry_files(
                "hello",
                vec![("../new photo.png".into(), Bytes::from_static(b"new"))],
            )
            .await
            .expect("second batch");

        assert_eq!(stored, ["new_photo.png"]);
        assert!(!dir.path().join("hello/old.png").exists());
        let data = storage.read("hello", "new_photo.png").await.expect("read");
        assert_eq!(&data[..], b"new");
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");

        assert!(matches!(
            storage.read("hello", "../../secret").await,
            Err(UploadStorageError::InvalidPath)
        ));
        assert!(matches!(
            storage.replace_entry_files("..", Vec::new()).await,
            Err(UploadStorageError::InvalidPath)
        ));
    }

    #[tokio::test]
    async fn unusable_names_fail_before_touching_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");
        storage
            .replace_entry_files("keep", vec![("a.txt".into(), Bytes::from_static(b"a"))])
            .await
            .expect("seed");

        let err = storage
            .replace_entry_files("keep", vec![("...".into(), Bytes::new())])
            .await
            .expect_err("invalid name");
        assert!(matches!(err, UploadStorageError::InvalidName { .. }));
        assert!(dir.path().join("keep/a.txt").exists());
    }

    #[tokio::test]
    async fn deleting_missing_entry_is_ok() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");
        storage.delete_entry_files("ghost").await.expect("no-op");
    }
}
