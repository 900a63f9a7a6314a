use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, info};

use crate::transmission::Torrent;

/// Copy every payload file of `torrent` from its download directory into
/// `dest_dir`, preserving relative paths. Sources that do not exist yet are
/// skipped; existing destination files are overwritten byte for byte.
pub async fn copy_torrent_files(torrent: &Torrent, dest_dir: &Path) -> Result<()> {
    let download_dir = Path::new(&torrent.download_dir);

    for file in &torrent.files {
        let source = download_dir.join(&file.name);
        let target = dest_dir.join(&file.name);

        if !source.exists() {
            debug!("skipping missing source {}", source.display());
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }

        info!("{} -> {}", source.display(), target.display());
        fs::copy(&source, &target)
            .await
            .with_context(|| format!("failed copying to {}", target.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::tempdir;
    use tokio::fs;

    use super::copy_torrent_files;
    use crate::transmission::{Torrent, TorrentFile};

    fn torrent(download_dir: &Path, files: &[&str]) -> Torrent {
        Torrent {
            name: "[HorribleSubs] Show - 01 [1080p].mkv".to_string(),
            hash_string: "0123456789abcdef0123456789abcdef01234567".to_string(),
            is_finished: true,
            download_dir: download_dir.display().to_string(),
            torrent_file: String::new(),
            files: files
                .iter()
                .map(|name| TorrentFile {
                    name: name.to_string(),
                    length: 0,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn copies_through_multiple_missing_directory_levels() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();

        let rel = "Show/Season 01/[HorribleSubs] Show - 01 [1080p].mkv";
        fs::create_dir_all(src.path().join("Show/Season 01"))
            .await
            .unwrap();
        fs::write(src.path().join(rel), b"payload bytes")
            .await
            .unwrap();

        copy_torrent_files(&torrent(src.path(), &[rel]), dst.path())
            .await
            .unwrap();

        let copied = fs::read(dst.path().join(rel)).await.unwrap();
        assert_eq!(copied, b"payload bytes");
    }

    #[tokio::test]
    async fn missing_source_is_skipped_without_error() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();

        fs::write(src.path().join("present.mkv"), b"here")
            .await
            .unwrap();

        let torrent = torrent(src.path(), &["gone.mkv", "present.mkv"]);
        copy_torrent_files(&torrent, dst.path()).await.unwrap();

        assert!(!dst.path().join("gone.mkv").exists());
        assert_eq!(fs::read(dst.path().join("present.mkv")).await.unwrap(), b"here");
    }

    #[tokio::test]
    async fn existing_destination_is_overwritten() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();

        fs::write(src.path().join("ep.mkv"), b"new contents")
            .await
            .unwrap();
        fs::write(dst.path().join("ep.mkv"), b"old").await.unwrap();

        copy_torrent_files(&torrent(src.path(), &["ep.mkv"]), dst.path())
            .await
            .unwrap();

        assert_eq!(
            fs::read(dst.path().join("ep.mkv")).await.unwrap(),
            b"new contents"
        );
    }
}
