use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::Config;

/// Extensions recognized as video files, matched case-insensitively.
pub const VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "mkv", "avi", "wmv", "mov", "flv"];

/// A qualifying video file found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFile {
    pub name: String,
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// Walks a directory tree and collects video files above the size threshold.
pub struct VideoScanner {
    min_file_size: u64,
}

impl VideoScanner {
    pub fn new(config: &Config) -> Self {
        Self::with_min_size(config.min_file_size_bytes())
    }

    /// Build a scanner with an explicit threshold in bytes.
    pub fn with_min_size(min_file_size: u64) -> Self {
        Self { min_file_size }
    }

    /// Scan `root` for video files. Progress is a percentage of all files
    /// visited (video or not) against a full pre-count of the tree; it is
    /// non-decreasing and reaches exactly 100 on completion.
    ///
    /// An inaccessible root is fatal; unreadable entries below it are
    /// skipped with a warning.
    pub fn scan(&self, root: &Path, mut progress: impl FnMut(u8)) -> Result<Vec<VideoFile>> {
        let total_files = Self::count_files(root)?;
        debug!("Pre-walk counted {} files under {}", total_files, root.display());

        let mut videos = Vec::new();
        let mut visited = 0usize;

        for entry in Self::walk(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(anyhow!("cannot scan {}: {}", root.display(), e))
                }
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            visited += 1;
            if total_files > 0 {
                progress(((visited * 100 / total_files) as u8).min(100));
            }

            if !Self::is_video(entry.path()) {
                continue;
            }

            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    warn!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            if size >= self.min_file_size {
                videos.push(VideoFile {
                    name: entry.file_name().to_string_lossy().to_string(),
                    path: entry.path().to_path_buf(),
                    size,
                });
            }
        }

        progress(100);
        debug!("Scan found {} qualifying videos", videos.len());
        Ok(videos)
    }

    fn is_video(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
    }

    /// One deterministic walk of the tree; used for both the pre-count and
    /// the filtering pass so the two agree on ordering.
    fn walk(root: &Path) -> walkdir::IntoIter {
        WalkDir::new(root).sort_by_file_name().into_iter()
    }

    fn count_files(root: &Path) -> Result<usize> {
        let mut total = 0usize;
        for entry in Self::walk(root) {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() {
                        total += 1;
                    }
                }
                Err(e) if e.depth() == 0 => {
                    return Err(anyhow!("cannot scan {}: {}", root.display(), e))
                }
                Err(e) => warn!("Skipping unreadable entry: {}", e),
            }
        }
        Ok(total)
    }
}
