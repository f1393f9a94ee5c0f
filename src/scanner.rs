//! Recursive discovery of tracking and video files.

use crate::field::FileClass;
use crate::file_organizer::OrganizeError;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What the data folder holds and how its files are told apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataParams {
    /// Substring marking side-view tracking files.
    pub side_keyword: String,
    /// Substring marking ventral-view tracking files.
    pub ventral_keyword: String,
    pub csv_extension: String,
    pub video_extension: String,
}

impl Default for DataParams {
    fn default() -> Self {
        Self {
            side_keyword: "sideview".to_string(),
            ventral_keyword: "ventralview".to_string(),
            csv_extension: ".csv".to_string(),
            video_extension: ".mp4".to_string(),
        }
    }
}

/// Files found under a data folder, each list sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSet {
    pub root: PathBuf,
    pub side: Vec<PathBuf>,
    pub ventral: Vec<PathBuf>,
    pub video: Vec<PathBuf>,
}

impl DataSet {
    pub fn files(&self, class: FileClass) -> &[PathBuf] {
        match class {
            FileClass::Side => &self.side,
            FileClass::Ventral => &self.ventral,
            FileClass::Video => &self.video,
        }
    }

    /// File stems of one class, in listing order.
    pub fn stems(&self, class: FileClass) -> Vec<String> {
        self.files(class).iter().map(|p| file_stem(p)).collect()
    }
}

/// Scans `root` recursively.
///
/// Tracking files whose path relative to `root` contains the side keyword
/// are side files, those containing the ventral keyword are ventral files;
/// a path holding both keywords is listed in both. Every file with the video
/// extension is a video. Keyword matching is case-sensitive.
///
/// # Errors
///
/// `InvalidSource` if `root` is not a directory, `ScanFailed` if the folder
/// cannot be walked.
pub fn scan_data_folder(root: &Path, params: &DataParams) -> Result<DataSet, OrganizeError> {
    if !root.is_dir() {
        return Err(OrganizeError::InvalidSource {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    let mut data = DataSet {
        root: root.to_path_buf(),
        ..DataSet::default()
    };

    for path in find_files(root, &params.csv_extension)? {
        let relative = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        if relative.contains(&params.side_keyword) {
            data.side.push(path.clone());
        }
        if relative.contains(&params.ventral_keyword) {
            data.ventral.push(path);
        }
    }
    data.video = find_files(root, &params.video_extension)?;

    tracing::info!(
        root = %root.display(),
        side = data.side.len(),
        ventral = data.ventral.len(),
        video = data.video.len(),
        "data folder scanned"
    );
    Ok(data)
}

fn find_files(root: &Path, extension: &str) -> Result<Vec<PathBuf>, OrganizeError> {
    let pattern = format!(
        "{}/**/*{}",
        Pattern::escape(&root.to_string_lossy()),
        Pattern::escape(extension)
    );
    let scan_failed = |reason: String| OrganizeError::ScanFailed {
        path: root.to_path_buf(),
        reason,
    };

    let mut files = Vec::new();
    for entry in glob::glob(&pattern).map_err(|e| scan_failed(e.to_string()))? {
        let path = entry.map_err(|e| scan_failed(e.to_string()))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// File name without its directory and extension.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
