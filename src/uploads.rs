use std::path::Path;

use anyhow::Context;
use uuid::Uuid;

use crate::error::AppResult;

/// URL prefix under which the upload directory is served.
pub const UPLOAD_URL_PREFIX: &str = "/uploads";

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Write an uploaded image under `dir` with a random name and return its public path.
pub async fn store_image(dir: &Path, original_name: &str, bytes: &[u8]) -> AppResult<String> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create upload dir {}", dir.display()))?;

    let file_name = match image_extension(original_name) {
        Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
        None => Uuid::new_v4().to_string(),
    };
    let target = dir.join(&file_name);
    tokio::fs::write(&target, bytes)
        .await
        .with_context(|| format!("failed to write {}", target.display()))?;

    tracing::debug!(file = %file_name, size = bytes.len(), "image stored");
    Ok(format!("{UPLOAD_URL_PREFIX}/{file_name}"))
}

fn image_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_image_under_random_name() {
        let dir = tempfile::tempdir().unwrap();

        let url = store_image(dir.path(), "Photo.PNG", b"img").await.unwrap();

        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with(".png"));
        let stored = dir.path().join(url.trim_start_matches("/uploads/"));
        assert_eq!(std::fs::read(stored).unwrap(), b"img");
    }

    #[test]
    fn unknown_extensions_are_dropped() {
        assert_eq!(image_extension("a.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(image_extension("../../etc/passwd"), None);
        assert_eq!(image_extension("shell.php"), None);
    }
}
