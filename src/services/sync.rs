//! Content sync between a local build directory and an environment prefix.
//!
//! Sync is full replace: the prefix is emptied first, then every file under
//! the build directory is uploaded. Uploads run with bounded concurrency and
//! no retries; one failed upload fails the batch.

use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, stream};
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{
    errors::{PreviewError, PreviewResult},
    providers::{OBJECT_PAGE_LIMIT, ObjectStorage},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub removed: usize,
    pub uploaded: usize,
}

pub struct ContentSync<'a> {
    storage: &'a dyn ObjectStorage,
    bucket: &'a str,
    concurrency: usize,
}

impl<'a> ContentSync<'a> {
    pub fn new(storage: &'a dyn ObjectStorage, bucket: &'a str, concurrency: usize) -> Self {
        Self {
            storage,
            bucket,
            concurrency: concurrency.max(1),
        }
    }

    /// Replace everything under `prefix` with the contents of `directory`.
    pub async fn replace(&self, prefix: &str, directory: &Path) -> PreviewResult<SyncReport> {
        let files = collect_files(directory)?;
        let removed = self.delete_prefix(prefix).await?;
        let uploaded = self.upload(prefix, files).await?;
        info!(prefix, removed, uploaded, "content synced");
        Ok(SyncReport { removed, uploaded })
    }

    /// Delete every object under `prefix`, one listing page per batch delete,
    /// following continuation tokens until the listing is exhausted.
    pub async fn delete_prefix(&self, prefix: &str) -> PreviewResult<usize> {
        let mut removed = 0;
        let mut token: Option<String> = None;
        loop {
            let page = self
                .storage
                .list_objects(self.bucket, prefix, token.take(), OBJECT_PAGE_LIMIT)
                .await?;
            if !page.keys.is_empty() {
                self.storage.delete_objects(self.bucket, &page.keys).await?;
                removed += page.keys.len();
                debug!(prefix, batch = page.keys.len(), "deleted object batch");
            }
            match page.next_continuation_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(removed)
    }

    async fn upload(&self, prefix: &str, files: Vec<LocalFile>) -> PreviewResult<usize> {
        if files.is_empty() {
            warn!(prefix, "build directory is empty, nothing to upload");
            return Ok(0);
        }
        let count = files.len();
        stream::iter(files)
            .map(|file| self.upload_one(prefix, file))
            .buffer_unordered(self.concurrency)
            .try_collect::<Vec<()>>()
            .await?;
        Ok(count)
    }

    async fn upload_one(&self, prefix: &str, file: LocalFile) -> PreviewResult<()> {
        let body = Bytes::from(fs::read(&file.path).await?);
        let digest = general_purpose::STANDARD.encode(md5::compute(&body).0);
        let key = format!("{}{}", prefix, file.relative_key);
        let content_type = content_type_for(&file.relative_key);

        self.storage
            .put_object(self.bucket, &key, body, content_type, &digest)
            .await?;
        debug!(key, content_type, "uploaded");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LocalFile {
    path: PathBuf,
    /// Path relative to the build directory, `/`-separated.
    relative_key: String,
}

/// Every regular file under `directory`, with its key relative to it.
fn collect_files(directory: &Path) -> PreviewResult<Vec<LocalFile>> {
    if !directory.is_dir() {
        return Err(PreviewError::Configuration(format!(
            "build directory {} does not exist",
            directory.display()
        )));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(directory)
            .map_err(|err| PreviewError::Io(std::io::Error::other(err)))?;
        let relative_key = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(LocalFile {
            path: entry.into_path(),
            relative_key,
        });
    }
    Ok(files)
}

/// Content type served for an object, by file extension.
pub fn content_type_for(key: &str) -> &'static str {
    let extension = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        "webmanifest" => "application/manifest+json",
        _ => "application/octet-stream",
    }
}
