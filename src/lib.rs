//! runfiler - structure inference and filing for behaviour recordings
//!
//! This library infers the naming structure shared by side-view, ventral-view
//! and video recordings (by approximate alignment against a tagged example
//! filename, or by a regex template), associates the files that describe the
//! same run, and copies every run into a group/dataset folder hierarchy.

pub mod association;
pub mod cli;
pub mod config;
pub mod distance;
pub mod field;
pub mod file_organizer;
pub mod output;
pub mod regex_capture;
pub mod scanner;
pub mod session;
pub mod structure_finder;
pub mod template;
pub mod tokenizer;

pub use association::{AssociatedRecord, AssociationPolicy, FileEntry, associate_files};
pub use config::{ConfigError, OrganizerConfig};
pub use field::{FieldRole, FieldSet, FieldSpec, FieldValues, FileClass};
pub use file_organizer::{CopyJob, CopyOutcome, CopyPlan, FileOrganizer, OrganizeError};
pub use regex_capture::{PatternError, StructurePattern};
pub use scanner::{DataSet, scan_data_folder};
pub use session::{OrganizerSession, SessionError};
pub use structure_finder::{StructureError, StructureFinder};
pub use template::{FieldSelection, Template};
pub use tokenizer::{Tokenized, split_with_separators};

pub use cli::{Cli, run_cli};
