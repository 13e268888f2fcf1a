use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Replace `path` with `contents` all-or-nothing: write a sibling temp file,
/// flush it, then rename over the target.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp_path = temp_path_for(path);

    let result = async {
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp_path, path).await
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path).await;
    }
    result
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());
    path.with_file_name(format!(".{}.tmp", file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_atomic_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("callsigns.txt");

        write_atomic(&path, b"N7OOS").await.unwrap();
        write_atomic(&path, b"K1ABC\nW2XYZ").await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "K1ABC\nW2XYZ");
        assert!(!temp_path_for(&path).exists());
    }

    #[tokio::test]
    async fn test_write_atomic_failure_leaves_target() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing_dir").join("schedule.json");

        assert!(write_atomic(&path, b"[]").await.is_err());
        assert!(!path.exists());
    }
}
