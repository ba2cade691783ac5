use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Tees one response body to a temp file next to its final path and renames
/// it into place once the body decoded successfully.
///
/// Every failure here is logged and swallowed: archival never fails a fetch.
/// Each writer gets its own `<name>.XXXXXX.tmp`, so concurrent fetches of the
/// same resource never share a temp file. A writer dropped without
/// [`commit`](Self::commit) removes its temp file, so the final path only
/// ever holds a complete, decodable response.
#[derive(Debug)]
pub struct ArchiveWriter {
    final_path: PathBuf,
    tmp: Option<(File, TempPath)>,
}

impl ArchiveWriter {
    /// Create a fresh temp file for `relative` under `root`.
    ///
    /// Returns `None` (after a warning) if the file can't be created.
    pub async fn open(root: &Path, relative: &Path) -> Option<Self> {
        let final_path = root.join(relative);
        let parent = final_path.parent().unwrap_or(root).to_path_buf();
        let prefix = match final_path.file_name() {
            Some(name) => format!("{}.", name.to_string_lossy()),
            None => String::from("response."),
        };

        if let Err(e) = fs::create_dir_all(&parent).await {
            warn!("could not dump data to {}: {e}", final_path.display());
            return None;
        }

        let created = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(".tmp")
                .tempfile_in(&parent)
        })
        .await;

        match created {
            Ok(Ok(named)) => {
                let (file, path) = named.into_parts();
                Some(Self {
                    final_path,
                    tmp: Some((File::from_std(file), path)),
                })
            }
            Ok(Err(e)) => {
                warn!("could not dump data to {}: {e}", final_path.display());
                None
            }
            Err(e) => {
                warn!("could not dump data to {}: {e}", final_path.display());
                None
            }
        }
    }

    /// Append a body chunk. A failed write abandons this archive.
    pub async fn write(&mut self, chunk: &[u8]) {
        let Some((file, _)) = self.tmp.as_mut() else {
            return;
        };
        if let Err(e) = file.write_all(chunk).await {
            warn!("abandoning dump of {}: {e}", self.final_path.display());
            self.abandon().await;
        }
    }

    /// Flush the temp file and atomically move it to the final path.
    pub async fn commit(mut self) {
        let Some((mut file, tmp)) = self.tmp.take() else {
            return;
        };
        if let Err(e) = file.flush().await {
            warn!("abandoning dump of {}: {e}", self.final_path.display());
            drop(file);
            remove(tmp).await;
            return;
        }
        drop(file);

        // Take the path out of the guard; from here cleanup is ours.
        let tmp_path = match tmp.keep() {
            Ok(path) => path,
            Err(e) => {
                warn!(
                    "could not move dump of {} into place: {e}",
                    self.final_path.display()
                );
                return;
            }
        };
        match fs::rename(&tmp_path, &self.final_path).await {
            Ok(()) => debug!("archived response to {}", self.final_path.display()),
            Err(e) => {
                warn!("could not move {} into place: {e}", tmp_path.display());
                let _ = fs::remove_file(&tmp_path).await;
            }
        }
    }

    async fn abandon(&mut self) {
        if let Some((file, tmp)) = self.tmp.take() {
            drop(file);
            remove(tmp).await;
        }
    }
}

/// Delete a temp file without blocking the runtime. If the guard can't be
/// released it removes the file itself when dropped.
async fn remove(tmp: TempPath) {
    if let Ok(path) = tmp.keep() {
        let _ = fs::remove_file(path).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "tmp"))
            .collect()
    }

    #[tokio::test]
    async fn commit_moves_complete_body_into_place() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut writer = ArchiveWriter::open(dir.path(), Path::new("api/teams"))
            .await
            .unwrap();
        writer.write(b"[{\"id\":").await;
        writer.write(b"1}]").await;
        assert!(!dir.path().join("api/teams").exists());
        assert_eq!(tmp_files(&dir.path().join("api")).len(), 1);

        writer.commit().await;
        let body = std::fs::read(dir.path().join("api/teams")).unwrap();
        assert_eq!(body, b"[{\"id\":1}]");
        assert!(tmp_files(&dir.path().join("api")).is_empty());
    }

    #[tokio::test]
    async fn temp_file_is_named_after_target() {
        let dir = tempfile::TempDir::new().unwrap();
        let _writer = ArchiveWriter::open(dir.path(), Path::new("api/judgings"))
            .await
            .unwrap();
        let tmp = tmp_files(&dir.path().join("api"));
        let name = tmp[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("judgings."), "{name}");
        assert!(name.ends_with(".tmp"), "{name}");
    }

    #[tokio::test]
    async fn overlapping_writers_never_share_a_temp_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let rel = Path::new("api/judgings");
        let mut long = ArchiveWriter::open(dir.path(), rel).await.unwrap();
        let mut short = ArchiveWriter::open(dir.path(), rel).await.unwrap();
        assert_eq!(tmp_files(&dir.path().join("api")).len(), 2);

        long.write(b"[1,2,3,").await;
        short.write(b"[9]").await;
        long.write(b"4,5]").await;

        short.commit().await;
        assert_eq!(std::fs::read(dir.path().join(rel)).unwrap(), b"[9]");
        long.commit().await;
        assert_eq!(std::fs::read(dir.path().join(rel)).unwrap(), b"[1,2,3,4,5]");
        assert!(tmp_files(&dir.path().join("api")).is_empty());
    }

    #[tokio::test]
    async fn dropped_writer_leaves_previous_archive_untouched() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("api")).unwrap();
        std::fs::write(dir.path().join("api/config"), b"old").unwrap();

        let mut writer = ArchiveWriter::open(dir.path(), Path::new("api/config"))
            .await
            .unwrap();
        writer.write(b"{\"trunc").await;
        drop(writer);

        assert_eq!(std::fs::read(dir.path().join("api/config")).unwrap(), b"old");
        assert!(tmp_files(&dir.path().join("api")).is_empty());
    }

    #[tokio::test]
    async fn open_fails_softly_when_root_is_a_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join("not-a-dir");
        std::fs::write(&root, b"x").unwrap();

        assert!(ArchiveWriter::open(&root, Path::new("api/judgings")).await.is_none());
    }
}
