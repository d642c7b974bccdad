//! Local directory store implementation.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use unrg_models::{format_bytes, Namespace, ObjectName};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// Chunk size used when streaming objects in and out of the store.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Directory under the data root holding uploads that are still in flight.
pub const INCOMING_DIR: &str = ".incoming";

/// Two flat name -> blob mappings (`files/`, `images/`) under a data root.
///
/// Writes land in [`INCOMING_DIR`] and are renamed over the final path once
/// complete, so a reader sees either the old object or the new one. There is
/// no locking: of two concurrent writers to one name the last rename wins.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    files_dir: PathBuf,
    images_dir: PathBuf,
    incoming_dir: PathBuf,
}

impl LocalStore {
    /// Open the store, creating both namespace directories if missing.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        let files_dir = root.join(Namespace::File.dir_name());
        let images_dir = root.join(Namespace::Image.dir_name());
        let incoming_dir = root.join(INCOMING_DIR);

        tokio::fs::create_dir_all(&files_dir).await?;
        tokio::fs::create_dir_all(&images_dir).await?;
        tokio::fs::create_dir_all(&incoming_dir).await?;

        info!(root = %root.display(), "Storage initialized");

        Ok(Self {
            root,
            files_dir,
            images_dir,
            incoming_dir,
        })
    }

    /// Data root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory backing a namespace.
    pub fn namespace_dir(&self, namespace: Namespace) -> &Path {
        match namespace {
            Namespace::File => &self.files_dir,
            Namespace::Image => &self.images_dir,
        }
    }

    fn object_path(&self, namespace: Namespace, name: &str) -> StorageResult<(ObjectName, PathBuf)> {
        let name = ObjectName::parse(name)?;
        let path = self
            .namespace_dir(namespace)
            .join(namespace.to_storage_name(name.as_str()));
        Ok((name, path))
    }

    /// Store an object from a stream of chunks, replacing any previous value.
    ///
    /// Returns the number of bytes written. The previous value stays in place
    /// until the new one is complete; on failure it is left untouched.
    pub async fn put_stream<S, E>(
        &self,
        namespace: Namespace,
        name: &str,
        stream: S,
    ) -> StorageResult<u64>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        let (name, path) = self.object_path(namespace, name)?;
        let staging = self
            .incoming_dir
            .join(format!("{}-{}.part", namespace.dir_name(), Uuid::new_v4().simple()));
        debug!(namespace = %namespace, name = %name, staging = %staging.display(), "Writing object");

        let mut file = File::create(&staging).await.map_err(|e| {
            warn!(path = %staging.display(), error = %e, "Failed to create staging file");
            StorageError::Io(e)
        })?;

        let result = match write_stream(&mut file, stream).await {
            Ok(written) => {
                drop(file);
                tokio::fs::rename(&staging, &path).await.map(|()| written).map_err(|e| {
                    warn!(path = %path.display(), error = %e, "Failed to move object into place");
                    StorageError::Io(e)
                })
            }
            Err(e) => {
                drop(file);
                warn!(namespace = %namespace, name = %name, error = %e, "Object write failed");
                Err(e)
            }
        };

        match result {
            Ok(written) => {
                info!(
                    namespace = %namespace,
                    name = %name,
                    bytes = written,
                    "Stored object ({})",
                    format_bytes(written)
                );
                Ok(written)
            }
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&staging).await {
                    warn!(path = %staging.display(), error = %remove_err, "Failed to remove staging file");
                }
                Err(e)
            }
        }
    }

    /// Store an object from an async reader.
    pub async fn put_reader<R>(&self, namespace: Namespace, name: &str, reader: R) -> StorageResult<u64>
    where
        R: AsyncRead,
    {
        self.put_stream(namespace, name, ReaderStream::with_capacity(reader, READ_CHUNK_SIZE))
            .await
    }

    /// Open an object for streaming.
    pub async fn get(&self, namespace: Namespace, name: &str) -> StorageResult<StoredObject> {
        let (name, path) = self.object_path(namespace, name)?;

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::not_found(namespace, name.into_inner()));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to open object");
                return Err(e.into());
            }
        };

        let metadata = file.metadata().await?;
        if metadata.is_dir() {
            return Err(StorageError::not_found(namespace, name.into_inner()));
        }

        Ok(StoredObject {
            namespace,
            name,
            size: metadata.len(),
            file,
        })
    }

    /// Delete an object.
    pub async fn delete(&self, namespace: Namespace, name: &str) -> StorageResult<()> {
        let (name, path) = self.object_path(namespace, name)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(namespace = %namespace, name = %name, "Deleted object");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(namespace, name.into_inner()))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to delete object");
                Err(e.into())
            }
        }
    }

    /// List object names in directory-entry order.
    ///
    /// Sub-directories are skipped; in the image namespace only entries with
    /// the storage suffix are returned, with the suffix stripped.
    pub async fn list(&self, namespace: Namespace) -> StorageResult<Vec<String>> {
        let dir = self.namespace_dir(namespace);
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                continue;
            }

            let file_name = entry.file_name();
            let Some(entry_name) = file_name.to_str() else {
                warn!(namespace = %namespace, "Skipping entry with non UTF-8 name");
                continue;
            };

            if let Some(name) = namespace.from_storage_name(entry_name) {
                names.push(name);
            }
        }

        debug!(namespace = %namespace, count = names.len(), "Listed objects");
        Ok(names)
    }

    /// Check whether an object exists.
    pub async fn exists(&self, namespace: Namespace, name: &str) -> StorageResult<bool> {
        let (_, path) = self.object_path(namespace, name)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    /// Verify that both namespace directories and the staging area are present.
    pub async fn check_health(&self) -> StorageResult<()> {
        let dirs = Namespace::ALL
            .into_iter()
            .map(|ns| (ns.dir_name(), self.namespace_dir(ns)))
            .chain(std::iter::once((INCOMING_DIR, self.incoming_dir.as_path())));

        for (label, dir) in dirs {
            let metadata = tokio::fs::metadata(dir).await?;
            if !metadata.is_dir() {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("{} is not a directory", label),
                )));
            }
        }
        Ok(())
    }
}

async fn write_stream<S, E>(file: &mut File, stream: S) -> StorageResult<u64>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    futures_util::pin_mut!(stream);

    let mut written = 0u64;
    while let Some(chunk) = stream
        .try_next()
        .await
        .map_err(|e| StorageError::source_failed(e.to_string()))?
    {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

/// An open object ready to be streamed.
#[derive(Debug)]
pub struct StoredObject {
    pub namespace: Namespace,
    pub name: ObjectName,
    /// Size in bytes at open time.
    pub size: u64,
    file: File,
}

impl StoredObject {
    /// Stream the object in chunks.
    pub fn into_stream(self) -> ReaderStream<File> {
        ReaderStream::with_capacity(self.file, READ_CHUNK_SIZE)
    }

    /// Take the underlying file handle.
    pub fn into_file(self) -> File {
        self.file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tempfile::TempDir;

    async fn open_store() -> (TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    async fn read_all(object: StoredObject) -> Vec<u8> {
        let mut out = Vec::new();
        let mut stream = object.into_stream();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_open_creates_namespace_dirs() {
        let (dir, store) = open_store().await;
        assert!(dir.path().join("files").is_dir());
        assert!(dir.path().join("images").is_dir());
        assert!(dir.path().join(INCOMING_DIR).is_dir());
        store.check_health().await.unwrap();

        // Re-opening an existing root is fine.
        LocalStore::open(dir.path()).await.unwrap();
    }

    #[tokio::test]
    async fn test_round_trip_both_namespaces() {
        let (_dir, store) = open_store().await;
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

        for namespace in Namespace::ALL {
            let written = store
                .put_reader(namespace, "blob", payload.as_slice())
                .await
                .unwrap();
            assert_eq!(written, payload.len() as u64);

            let object = store.get(namespace, "blob").await.unwrap();
            assert_eq!(object.size, payload.len() as u64);
            assert_eq!(read_all(object).await, payload);
        }
    }

    #[tokio::test]
    async fn test_namespaces_are_independent() {
        let (_dir, store) = open_store().await;
        store.put_reader(Namespace::File, "x", &b"file"[..]).await.unwrap();

        assert!(store.exists(Namespace::File, "x").await.unwrap());
        assert!(!store.exists(Namespace::Image, "x").await.unwrap());

        store.put_reader(Namespace::Image, "x", &b"image"[..]).await.unwrap();
        let file = read_all(store.get(Namespace::File, "x").await.unwrap()).await;
        let image = read_all(store.get(Namespace::Image, "x").await.unwrap()).await;
        assert_eq!(file, b"file");
        assert_eq!(image, b"image");
    }

    #[tokio::test]
    async fn test_put_replaces_whole_object() {
        let (_dir, store) = open_store().await;
        store
            .put_reader(Namespace::File, "a", &b"a much longer first value"[..])
            .await
            .unwrap();
        store.put_reader(Namespace::File, "a", &b"short"[..]).await.unwrap();

        let data = read_all(store.get(Namespace::File, "a").await.unwrap()).await;
        assert_eq!(data, b"short");
    }

    #[tokio::test]
    async fn test_image_suffix_transparency() {
        let (dir, store) = open_store().await;
        store.put_reader(Namespace::Image, "foo", &b"tarball"[..]).await.unwrap();

        assert!(dir.path().join("images/foo.tar.gz").is_file());
        assert_eq!(store.list(Namespace::Image).await.unwrap(), vec!["foo".to_string()]);

        let data = read_all(store.get(Namespace::Image, "foo").await.unwrap()).await;
        assert_eq!(data, b"tarball");

        store.delete(Namespace::Image, "foo").await.unwrap();
        assert!(!dir.path().join("images/foo.tar.gz").exists());
    }

    #[tokio::test]
    async fn test_image_list_filters_foreign_entries() {
        let (dir, store) = open_store().await;
        std::fs::write(dir.path().join("images/readme.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("images/partial.gz"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("images/nested.tar.gz")).unwrap();
        store.put_reader(Namespace::Image, "app", &b"x"[..]).await.unwrap();

        assert_eq!(store.list(Namespace::Image).await.unwrap(), vec!["app".to_string()]);
    }

    #[tokio::test]
    async fn test_file_list_skips_directories() {
        let (dir, store) = open_store().await;
        std::fs::create_dir(dir.path().join("files/subdir")).unwrap();
        store.put_reader(Namespace::File, "one", &b"1"[..]).await.unwrap();
        store.put_reader(Namespace::File, "two", &b"2"[..]).await.unwrap();

        let mut names = store.list(Namespace::File).await.unwrap();
        names.sort();
        assert_eq!(names, vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_then_list_and_second_delete() {
        let (_dir, store) = open_store().await;
        store.put_reader(Namespace::File, "gone", &b"x"[..]).await.unwrap();

        store.delete(Namespace::File, "gone").await.unwrap();
        assert!(!store
            .list(Namespace::File)
            .await
            .unwrap()
            .contains(&"gone".to_string()));

        let err = store.delete(Namespace::File, "gone").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_dir, store) = open_store().await;
        let err = store.get(Namespace::Image, "nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rejects_traversal_names() {
        let (dir, store) = open_store().await;
        for name in ["", ".", "..", "../escape", "a/b", "a\\b"] {
            let err = store
                .put_reader(Namespace::File, name, &b"x"[..])
                .await
                .unwrap_err();
            assert!(matches!(err, StorageError::InvalidName(_)), "name {:?}", name);
        }
        assert!(!dir.path().join("escape").exists());
    }

    #[tokio::test]
    async fn test_failed_source_removes_partial_object() {
        let (_dir, store) = open_store().await;
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "connection reset")),
        ];

        let err = store
            .put_stream(Namespace::File, "torn", futures_util::stream::iter(chunks))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Source(_)));
        assert!(!store.exists(Namespace::File, "torn").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_previous_value() {
        let (dir, store) = open_store().await;
        store.put_reader(Namespace::File, "a", &b"old value"[..]).await.unwrap();

        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"new")),
            Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "client went away")),
        ];
        let err = store
            .put_stream(Namespace::File, "a", futures_util::stream::iter(chunks))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Source(_)));

        let data = read_all(store.get(Namespace::File, "a").await.unwrap()).await;
        assert_eq!(data, b"old value");
        assert_eq!(std::fs::read_dir(dir.path().join(INCOMING_DIR)).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_staging_files_stay_out_of_listings() {
        let (dir, store) = open_store().await;
        store.put_reader(Namespace::File, "done", &b"x"[..]).await.unwrap();
        std::fs::write(dir.path().join(INCOMING_DIR).join("files-abc.part"), b"x").unwrap();

        assert_eq!(store.list(Namespace::File).await.unwrap(), vec!["done".to_string()]);
        assert!(store.list(Namespace::Image).await.unwrap().is_empty());
    }
}
