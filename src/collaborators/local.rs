//! Filesystem-backed blob store.
//!
//! Buckets are directories under a root, objects are files below them:
//! `<root>/<bucket>/Participant/P123/ConsentPII__1.pdf`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::{BlobError, BlobInfo, BlobStore};

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, name: &str) -> PathBuf {
        self.root.join(bucket).join(name)
    }

    fn collect(dir: &Path, found: &mut Vec<PathBuf>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                Self::collect(&path, found)?;
            } else {
                found.push(path);
            }
        }
        Ok(())
    }
}

impl BlobStore for LocalBlobStore {
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<BlobInfo>, BlobError> {
        let bucket_dir = self.root.join(bucket);
        if !bucket_dir.is_dir() {
            return Err(BlobError::Unavailable(format!(
                "bucket directory '{}' does not exist",
                bucket_dir.display()
            )));
        }

        let mut files = Vec::new();
        Self::collect(&bucket_dir, &mut files)?;

        let mut blobs = Vec::new();
        for file in files {
            let Ok(relative) = file.strip_prefix(&bucket_dir) else {
                continue;
            };
            let name = relative
                .components()
                .map(|part| part.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !name.starts_with(prefix) {
                continue;
            }
            let updated: DateTime<Utc> = fs::metadata(&file)?.modified()?.into();
            blobs.push(BlobInfo {
                bucket: bucket.to_string(),
                name,
                updated,
            });
        }
        blobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(blobs)
    }

    fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>, BlobError> {
        fs::read(self.object_path(bucket, name)).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => BlobError::NotFound {
                bucket: bucket.to_string(),
                name: name.to_string(),
            },
            _ => BlobError::Io(err),
        })
    }

    fn signed_url(&self, bucket: &str, name: &str) -> Result<String, BlobError> {
        Ok(format!("file://{}", self.object_path(bucket, name).display()))
    }
}
