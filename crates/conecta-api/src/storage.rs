use std::path::{Path, PathBuf};

use anyhow::Result;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

pub const AVATAR_DIR: &str = "avatars";

/// Public object storage on local disk.
///
/// Avatars live at `{dir}/avatars/{user_id}-{hash}.{ext}`. The directory is
/// served read-only under `/storage`, so a file name doubles as its URL path.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(dir.join(AVATAR_DIR)).await?;
        info!("Object storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        &self.dir
    }

    fn avatar_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(AVATAR_DIR).join(file_name)
    }

    /// Writes an avatar and returns its file name. The content hash is part
    /// of the name so a new upload never collides with a cached old one.
    pub async fn put_avatar(&self, user_id: &str, ext: &str, data: &[u8]) -> Result<String> {
        let hash = hex::encode(Sha256::digest(data));
        let file_name = format!("{}-{}.{}", user_id, &hash[..16], ext);

        // Write to a temp name first so readers never see a partial file
        let path = self.avatar_path(&file_name);
        let tmp = self.avatar_path(&format!(".{}.tmp", file_name));
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, &path).await?;

        info!("Stored avatar {} ({} bytes)", file_name, data.len());
        Ok(file_name)
    }

    pub async fn delete_avatar(&self, file_name: &str) -> Result<()> {
        match fs::remove_file(self.avatar_path(file_name)).await {
            Ok(()) => {
                info!("Deleted avatar {}", file_name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Avatar {} already gone", file_name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// File name of a stored avatar given its public URL. Only names that
/// belong to `user_id` are returned, so a URL can never point deletion at
/// another user's file.
pub fn avatar_file_name<'a>(url: &'a str, user_id: &str) -> Option<&'a str> {
    let name = url.rsplit('/').next()?;
    let owned = name
        .strip_prefix(user_id)
        .is_some_and(|rest| rest.starts_with('-'));
    (owned && !name.contains("..")).then_some(name)
}

/// File extension for an accepted avatar content type.
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("conecta-storage-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn put_and_delete_avatar() {
        let dir = temp_dir();
        let storage = Storage::new(dir.clone()).await.unwrap();

        let name = storage.put_avatar("u1", "png", b"fake png").await.unwrap();
        assert!(name.starts_with("u1-"));
        assert!(name.ends_with(".png"));

        let stored = std::fs::read(dir.join(AVATAR_DIR).join(&name)).unwrap();
        assert_eq!(stored, b"fake png");

        // No temp files left behind
        let entries: Vec<_> = std::fs::read_dir(dir.join(AVATAR_DIR)).unwrap().collect();
        assert_eq!(entries.len(), 1);

        storage.delete_avatar(&name).await.unwrap();
        storage.delete_avatar(&name).await.unwrap();
        assert!(!dir.join(AVATAR_DIR).join(&name).exists());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn avatar_names_are_scoped_to_owner() {
        let url = "http://localhost:3000/storage/avatars/u1-abcdef.png";
        assert_eq!(avatar_file_name(url, "u1"), Some("u1-abcdef.png"));
        assert_eq!(avatar_file_name(url, "u2"), None);
        assert_eq!(avatar_file_name("https://cdn/other.png", "u1"), None);
    }

    #[test]
    fn content_types() {
        assert_eq!(image_extension("image/PNG"), Some("png"));
        assert_eq!(image_extension("image/jpeg; charset=binary"), Some("jpg"));
        assert_eq!(image_extension("image/gif"), None);
    }
}
