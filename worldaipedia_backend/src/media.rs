//! Local-disk storage for publication images, served under `/media`.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

pub const PUBLIC_PREFIX: &str = "/media/";

#[derive(Clone)]
pub struct MediaStorage {
    media_dir: PathBuf,
    max_upload_bytes: usize,
}

impl MediaStorage {
    pub fn new(media_dir: PathBuf, max_upload_bytes: usize) -> Self {
        Self {
            media_dir,
            max_upload_bytes,
        }
    }

    /// Decodes a base64 image data URI, writes it under the media dir,
    /// and returns the public URL. Oversized or non-image payloads are
    /// rejected.
    pub async fn save_data_uri(&self, data_uri: &str) -> Result<String> {
        let rest = data_uri
            .strip_prefix("data:")
            .context("not a data URI")?;
        let (mime, payload) = rest
            .split_once(";base64,")
            .context("data URI is not base64-encoded")?;
        let extension = extension_for(mime)?;
        let bytes = BASE64
            .decode(payload.trim())
            .context("data URI payload is not valid base64")?;
        if bytes.len() > self.max_upload_bytes {
            bail!(
                "image is {} bytes, above the {}-byte upload limit",
                bytes.len(),
                self.max_upload_bytes
            );
        }

        let filename = format!("{}.{extension}", Uuid::new_v4());
        fs::create_dir_all(&self.media_dir).await?;
        fs::write(self.media_dir.join(&filename), &bytes).await?;
        Ok(format!("{PUBLIC_PREFIX}{filename}"))
    }

    /// Removes the file behind a `/media/...` URL. A file already gone
    /// is not an error.
    pub async fn delete(&self, url: &str) -> Result<()> {
        let filename = url
            .strip_prefix(PUBLIC_PREFIX)
            .context("not a media URL")?;
        if filename.is_empty() || filename.contains('/') || filename.contains("..") {
            bail!("malformed media URL");
        }
        match fs::remove_file(self.media_dir.join(filename)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn extension_for(mime: &str) -> Result<&'static str> {
    match mime {
        "image/png" => Ok("png"),
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/gif" => Ok("gif"),
        "image/webp" => Ok("webp"),
        other => bail!("unsupported image type '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A 1x1 transparent PNG.
    const TINY_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    fn storage(dir: &std::path::Path, cap: usize) -> MediaStorage {
        MediaStorage::new(dir.to_path_buf(), cap)
    }

    #[tokio::test]
    async fn saves_and_deletes_a_png() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path(), 1024);
        let url = storage
            .save_data_uri(&format!("data:image/png;base64,{TINY_PNG}"))
            .await
            .unwrap();
        assert!(url.starts_with("/media/"));
        assert!(url.ends_with(".png"));

        let filename = url.strip_prefix("/media/").unwrap();
        assert!(dir.path().join(filename).exists());

        storage.delete(&url).await.unwrap();
        assert!(!dir.path().join(filename).exists());
        // Double delete stays quiet.
        storage.delete(&url).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_oversized_and_malformed_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path(), 8);
        let uri = format!("data:image/png;base64,{TINY_PNG}");
        assert!(storage.save_data_uri(&uri).await.is_err());

        let storage = MediaStorage::new(dir.path().to_path_buf(), 1024);
        assert!(storage.save_data_uri("https://example.com/a.png").await.is_err());
        assert!(storage
            .save_data_uri("data:image/png;base64,@@not-base64@@")
            .await
            .is_err());
        assert!(storage
            .save_data_uri(&format!("data:application/pdf;base64,{TINY_PNG}"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn delete_refuses_paths_outside_the_media_dir() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path(), 1024);
        assert!(storage.delete("/media/../etc/passwd").await.is_err());
        assert!(storage.delete("/elsewhere/file.png").await.is_err());
        assert!(storage.delete("/media/").await.is_err());
    }
}
