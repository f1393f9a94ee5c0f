/// Copying associated recordings into the analysis hierarchy.
///
/// Every record is copied to
/// `<target>/<group>/<dataset>/<class folder>/<original file name>`.
/// The copy is planned first ([`CopyPlan`]), so a dry run can show exactly
/// what would happen, then executed either in place
/// ([`FileOrganizer::copy_with_structure`]) or on a worker thread
/// ([`CopyJob`]) that can be cancelled between two files.
///
/// Files are copied, never moved; existing destination files are
/// overwritten. A failed copy aborts the batch and leaves the files already
/// copied in place.
use crate::association::{AssociatedRecord, file_name};
use crate::field::{FieldRole, FieldSet, FileClass};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Errors that can occur while scanning or copying files.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The source path is missing or unusable.
    #[error("invalid source {}: {reason}", path.display())]
    InvalidSource { path: PathBuf, reason: String },
    /// Failed to create an output directory.
    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },
    /// Failed to copy a file; `error` carries the OS message.
    #[error("failed to copy {} to {}: {error}", from.display(), to.display())]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        error: io::Error,
    },
    /// The data folder could not be walked.
    #[error("failed to scan {}: {reason}", path.display())]
    ScanFailed { path: PathBuf, reason: String },
    /// The copy thread panicked before reporting.
    #[error("the copy worker stopped unexpectedly")]
    WorkerPanicked,
}

/// Result type for scan and copy operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Names used to build the output hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputLayout {
    pub side_folder_name: String,
    pub ventral_folder_name: String,
    pub video_folder_name: String,
    /// Group folder used when a record's group value is empty.
    pub default_group_name: String,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            side_folder_name: "side_view_analysis".to_string(),
            ventral_folder_name: "ventral_view_analysis".to_string(),
            video_folder_name: "Video".to_string(),
            default_group_name: "Batch".to_string(),
        }
    }
}

impl OutputLayout {
    pub fn folder_name(&self, class: FileClass) -> &str {
        match class {
            FileClass::Side => &self.side_folder_name,
            FileClass::Ventral => &self.ventral_folder_name,
            FileClass::Video => &self.video_folder_name,
        }
    }

    /// `<target>/<group>/<dataset>` for one record.
    ///
    /// The dataset level is left out when the field set has no timepoint
    /// field or the record's value is empty.
    pub fn dataset_dir(&self, target: &Path, record: &AssociatedRecord, fields: &FieldSet) -> PathBuf {
        let value_of = move |role: FieldRole| {
            fields
                .index_of_role(role)
                .and_then(|index| record.fields.value_at(index))
                .unwrap_or_default()
        };

        let group = match value_of(FieldRole::Group) {
            "" => self.default_group_name.as_str(),
            group => group,
        };
        let mut dir = target.join(group);

        let dataset = value_of(FieldRole::Timepoint);
        if !dataset.is_empty() {
            dir.push(dataset);
        }
        dir
    }
}

/// A single planned file copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCopy {
    pub class: FileClass,
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Every directory to create and every file to copy, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CopyPlan {
    directories: Vec<PathBuf>,
    copies: Vec<PlannedCopy>,
}

impl CopyPlan {
    /// Plans the copy of `records` under `target`.
    ///
    /// All three class folders are planned for every record, even when a
    /// partner is missing.
    pub fn build(
        records: &[AssociatedRecord],
        fields: &FieldSet,
        layout: &OutputLayout,
        target: &Path,
    ) -> Self {
        let mut plan = CopyPlan::default();

        for record in records {
            let dataset_dir = layout.dataset_dir(target, record, fields);
            for class in FileClass::ALL {
                let dir = dataset_dir.join(layout.folder_name(class));
                if !plan.directories.contains(&dir) {
                    plan.directories.push(dir);
                }
            }

            let sources = [
                (FileClass::Side, Some(&record.side)),
                (FileClass::Ventral, record.ventral.as_ref()),
                (FileClass::Video, record.video.as_ref()),
            ];
            for (class, source) in sources {
                if let Some(source) = source {
                    plan.copies.push(PlannedCopy {
                        class,
                        source: source.clone(),
                        destination: dataset_dir
                            .join(layout.folder_name(class))
                            .join(file_name(source)),
                    });
                }
            }
        }

        plan
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    pub fn copies(&self) -> &[PlannedCopy] {
        &self.copies
    }

    /// Number of files to copy.
    pub fn len(&self) -> usize {
        self.copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }
}

/// What a copy run achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub copied: usize,
    pub total: usize,
    pub bytes: u64,
}

/// How a copy run ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Completed(CopyReport),
    /// Cancelled between two files.
    Terminated(CopyReport),
}

impl CopyOutcome {
    pub fn report(&self) -> &CopyReport {
        match self {
            CopyOutcome::Completed(report) | CopyOutcome::Terminated(report) => report,
        }
    }
}

/// Executes copy plans.
pub struct FileOrganizer;

impl FileOrganizer {
    /// Runs `plan`, calling `progress(done, total)` after every file.
    ///
    /// `cancel` is checked before each file; once set, the run stops and
    /// returns `Terminated`.
    ///
    /// # Errors
    ///
    /// The first directory or copy failure aborts the run.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use runfiler::file_organizer::{CopyPlan, FileOrganizer};
    /// use std::sync::atomic::AtomicBool;
    ///
    /// let plan = CopyPlan::default();
    /// let cancel = AtomicBool::new(false);
    /// let outcome = FileOrganizer::copy_with_structure(&plan, &cancel, |done, total| {
    ///     println!("{done}/{total}");
    /// });
    /// ```
    pub fn copy_with_structure<F>(
        plan: &CopyPlan,
        cancel: &AtomicBool,
        mut progress: F,
    ) -> OrganizeResult<CopyOutcome>
    where
        F: FnMut(usize, usize),
    {
        let mut report = CopyReport {
            total: plan.len(),
            ..CopyReport::default()
        };

        for dir in plan.directories() {
            fs::create_dir_all(dir).map_err(|e| OrganizeError::DirectoryCreationFailed {
                path: dir.clone(),
                source: e,
            })?;
        }

        for copy in plan.copies() {
            if cancel.load(Ordering::Relaxed) {
                tracing::info!(copied = report.copied, total = report.total, "copy terminated");
                return Ok(CopyOutcome::Terminated(report));
            }

            report.bytes += Self::copy_preserving_mtime(&copy.source, &copy.destination)?;
            report.copied += 1;
            tracing::debug!(
                source = %copy.source.display(),
                destination = %copy.destination.display(),
                "copied"
            );
            progress(report.copied, report.total);
        }

        Ok(CopyOutcome::Completed(report))
    }

    /// Copies `source` over `destination` and gives the copy the source's
    /// modification time. Returns the number of bytes copied.
    pub fn copy_preserving_mtime(source: &Path, destination: &Path) -> OrganizeResult<u64> {
        let copy_failed = |error: io::Error| OrganizeError::CopyFailed {
            from: source.to_path_buf(),
            to: destination.to_path_buf(),
            error,
        };

        let bytes = fs::copy(source, destination).map_err(copy_failed)?;
        let modified = fs::metadata(source)
            .and_then(|m| m.modified())
            .map_err(copy_failed)?;
        // The copy may carry read-only permissions; setting times only
        // needs an open handle.
        fs::File::open(destination)
            .and_then(|file| file.set_modified(modified))
            .map_err(copy_failed)?;

        Ok(bytes)
    }
}

/// A copy running on its own thread.
pub struct CopyJob {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<OrganizeResult<CopyOutcome>>,
}

impl CopyJob {
    pub fn spawn<F>(plan: CopyPlan, progress: F) -> Self
    where
        F: FnMut(usize, usize) + Send + 'static,
    {
        Self::spawn_with_flag(plan, Arc::new(AtomicBool::new(false)), progress)
    }

    /// Like [`CopyJob::spawn`], sharing an existing cancellation flag.
    pub fn spawn_with_flag<F>(plan: CopyPlan, cancel: Arc<AtomicBool>, progress: F) -> Self
    where
        F: FnMut(usize, usize) + Send + 'static,
    {
        let worker_flag = Arc::clone(&cancel);
        let handle = thread::spawn(move || {
            FileOrganizer::copy_with_structure(&plan, &worker_flag, progress)
        });
        Self { cancel, handle }
    }

    /// Asks the worker to stop before its next file.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the worker is done.
    pub fn wait(self) -> OrganizeResult<CopyOutcome> {
        self.handle
            .join()
            .map_err(|_| OrganizeError::WorkerPanicked)?
    }
}
