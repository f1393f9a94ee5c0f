//! Grouping of side, ventral and video files that describe the same run.
//!
//! Two files belong to the same run when their field tuples are exactly
//! equal. Every side file is the anchor of at most one record; missing or
//! ambiguous partners are resolved locally and logged, never raised.

use crate::field::{FieldSet, FieldValues};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A scanned file with its inferred field values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub fields: FieldValues,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>, fields: FieldValues) -> Self {
        Self {
            path: path.into(),
            fields,
        }
    }

    fn file_name(&self) -> String {
        file_name(&self.path)
    }
}

/// Rules applied when a side file lacks a partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationPolicy {
    /// Drop side files without a ventral partner.
    pub require_ventral: bool,
    /// Drop side files without a video partner.
    pub require_video: bool,
    pub side_keyword: String,
    pub ventral_keyword: String,
}

impl Default for AssociationPolicy {
    fn default() -> Self {
        Self {
            require_ventral: false,
            require_video: false,
            side_keyword: "sideview".to_string(),
            ventral_keyword: "ventralview".to_string(),
        }
    }
}

/// One run: a side file and its optional partners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssociatedRecord {
    pub fields: FieldValues,
    pub side: PathBuf,
    pub ventral: Option<PathBuf>,
    pub video: Option<PathBuf>,
}

/// Associates every side file with the ventral and video files carrying
/// the same field tuple.
///
/// Records keep the order of `side`. When several ventral files match, the
/// first one listed wins. When several videos match, the only one whose
/// name holds neither keyword (the untracked recording) wins, and otherwise
/// the first one listed.
pub fn associate_files(
    side: &[FileEntry],
    ventral: &[FileEntry],
    video: &[FileEntry],
    policy: &AssociationPolicy,
) -> Vec<AssociatedRecord> {
    let mut records = Vec::with_capacity(side.len());

    for side_file in side {
        let key = side_file.fields.tuple();
        let ventral_matches: Vec<&FileEntry> =
            ventral.iter().filter(|v| v.fields.tuple() == key).collect();
        let video_matches: Vec<&FileEntry> =
            video.iter().filter(|v| v.fields.tuple() == key).collect();

        if ventral_matches.is_empty() {
            if policy.require_ventral {
                info!(side = %side_file.path.display(), "no ventral file found, skipping");
                continue;
            }
            info!(side = %side_file.path.display(), "no ventral file found");
        }

        if video_matches.is_empty() {
            if policy.require_video {
                info!(side = %side_file.path.display(), "no video file found, skipping");
                continue;
            }
            info!(side = %side_file.path.display(), "no video file found");
        }

        let ventral_choice = match ventral_matches.as_slice() {
            [] => None,
            [only] => Some(*only),
            [first, ..] => {
                warn!(
                    side = %side_file.path.display(),
                    candidates = ventral_matches.len(),
                    "several ventral files match, keeping the first"
                );
                Some(*first)
            }
        };

        let video_choice = match video_matches.as_slice() {
            [] => None,
            [only] => Some(*only),
            _ => {
                warn!(
                    side = %side_file.path.display(),
                    candidates = video_matches.len(),
                    "several video files match"
                );
                Some(pick_untracked_video(&video_matches, policy))
            }
        };

        records.push(AssociatedRecord {
            fields: side_file.fields.clone(),
            side: side_file.path.clone(),
            ventral: ventral_choice.map(|v| v.path.clone()),
            video: video_choice.map(|v| v.path.clone()),
        });
    }

    records
}

/// `candidates` must not be empty.
fn pick_untracked_video<'a>(
    candidates: &[&'a FileEntry],
    policy: &AssociationPolicy,
) -> &'a FileEntry {
    let untracked: Vec<&&FileEntry> = candidates
        .iter()
        .filter(|c| {
            let name = c.file_name();
            !name.contains(&policy.side_keyword) && !name.contains(&policy.ventral_keyword)
        })
        .collect();

    match untracked.as_slice() {
        [only] => **only,
        _ => candidates[0],
    }
}

/// Distinct values of one field across records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSummary {
    pub name: String,
    /// `(value, number of records)`, in order of first appearance.
    pub values: Vec<(String, usize)>,
}

impl FieldSummary {
    /// Number of distinct values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Per-field distinct values of `records`, in field-set order.
pub fn summarize_fields(records: &[AssociatedRecord], fields: &FieldSet) -> Vec<FieldSummary> {
    fields
        .iter()
        .map(|field| {
            let mut values: Vec<(String, usize)> = Vec::new();
            for record in records {
                let Some(value) = record.fields.get(&field.name) else {
                    continue;
                };
                match values.iter_mut().find(|(v, _)| v == value) {
                    Some((_, count)) => *count += 1,
                    None => values.push((value.to_string(), 1)),
                }
            }
            FieldSummary {
                name: field.name.clone(),
                values,
            }
        })
        .collect()
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
