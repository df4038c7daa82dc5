use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tempfile::Builder;

use crate::{
    sinks::data_sink::{ObjectLocation, ObjectStore},
    utils::filesystem::{ensure_parent_dir_exists, validate_relative_name},
};

/// Object store rooted at a local directory. Object names may contain `/`
/// and map to subdirectories of the root.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn connect(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create archive root {}", self.root.display()))
    }

    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<ObjectLocation> {
        validate_relative_name(name)?;
        let path = self.root.join(name);
        ensure_parent_dir_exists(&path).await?;

        let target = path.clone();
        tokio::task::spawn_blocking(move || {
            write_object(&target, |file| file.write_all(&bytes))
        })
        .await
        .map_err(|e| anyhow!("object write task panicked: {e}"))?
        .with_context(|| format!("Failed to store object {}", path.display()))?;

        let absolute = tokio::fs::canonicalize(&path).await?;
        Ok(ObjectLocation(format!("file://{}", absolute.display())))
    }
}

/// Writes into a hidden staging file beside `path` and links it into place
/// only once fully synced. Fails if `path` already exists. On any failure the
/// staging file is removed and `path` is left untouched.
fn write_object<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut std::fs::File) -> io::Result<()>,
{
    let dir = path
        .parent()
        .ok_or_else(|| anyhow!("No parent directory for {}", path.display()))?;
    let mut staged = Builder::new()
        .prefix(".staging-")
        .suffix(".partial")
        .tempfile_in(dir)?;

    fill(staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    staged.persist_noclobber(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_writes_object_under_root() {
        let temp_dir = tempdir().unwrap();
        let store = LocalObjectStore::new(temp_dir.path().join("archive"));
        store.connect().await.unwrap();

        let location = store
            .put("daily/readings.parquet", b"PAR1".to_vec())
            .await
            .unwrap();

        let path = temp_dir.path().join("archive/daily/readings.parquet");
        assert_eq!(std::fs::read(&path).unwrap(), b"PAR1");
        assert!(location.0.starts_with("file://"));
        assert!(location.0.ends_with("archive/daily/readings.parquet"));
    }

    #[tokio::test]
    async fn test_put_never_overwrites() {
        let temp_dir = tempdir().unwrap();
        let store = LocalObjectStore::new(temp_dir.path().to_path_buf());
        store.connect().await.unwrap();

        store.put("one.parquet", b"first".to_vec()).await.unwrap();
        assert!(store.put("one.parquet", b"second".to_vec()).await.is_err());
        assert_eq!(
            std::fs::read(temp_dir.path().join("one.parquet")).unwrap(),
            b"first"
        );
    }

    #[tokio::test]
    async fn test_put_rejects_escaping_names() {
        let temp_dir = tempdir().unwrap();
        let store = LocalObjectStore::new(temp_dir.path().join("root"));
        store.connect().await.unwrap();
        assert!(store.put("../outside.parquet", vec![1]).await.is_err());
        assert!(!temp_dir.path().join("outside.parquet").exists());
    }

    #[tokio::test]
    async fn test_connect_fails_when_root_is_a_file() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();
        let store = LocalObjectStore::new(file);
        assert!(store.connect().await.is_err());
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_failed_write_leaves_nothing_behind() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("readings.parquet");

        let result = write_object(&path, |file| {
            file.write_all(b"PAR1 half an obj")?;
            Err(io::Error::new(io::ErrorKind::StorageFull, "no space left"))
        });

        assert!(result.is_err());
        assert!(!path.exists());
        assert!(dir_entries(temp_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_rejected_put_leaves_no_staging_file() {
        let temp_dir = tempdir().unwrap();
        let store = LocalObjectStore::new(temp_dir.path().to_path_buf());
        store.connect().await.unwrap();

        store.put("one.parquet", b"first".to_vec()).await.unwrap();
        assert!(store.put("one.parquet", b"second".to_vec()).await.is_err());

        assert_eq!(dir_entries(temp_dir.path()), vec!["one.parquet"]);
    }
}
