//! Interactive organizer state.
//!
//! An [`OrganizerSession`] ties a scanned data folder to a structure source
//! (an inferred template or a regex template) and answers the questions the
//! command line asks in turn: which filename represents the data best, what
//! fields every file carries, which files form a run, and where each of them
//! goes. Setters validate their input before touching the session, so a
//! rejected separator list or regex leaves the previous state usable.

use crate::association::{
    AssociatedRecord, AssociationPolicy, FieldSummary, FileEntry, associate_files, file_name,
    summarize_fields,
};
use crate::config::{ConfigError, OrganizerConfig};
use crate::field::{FieldSet, FieldValues, FileClass};
use crate::file_organizer::{CopyJob, CopyPlan, OrganizeError};
use crate::regex_capture::{PatternError, StructurePattern};
use crate::scanner::{DataSet, scan_data_folder};
use crate::structure_finder::{StructureError, StructureFinder};
use crate::template::{FieldSelection, Template};
use crate::tokenizer::Tokenized;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Structure(#[from] StructureError),
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error(transparent)]
    Organize(#[from] OrganizeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no structure defined: give field tags or a regex template")]
    NoStructure,
    #[error("no side file found in the data folder")]
    NoSideFiles,
}

/// Where field values come from.
#[derive(Debug, Clone)]
pub enum StructureSource {
    /// Alignment against a template built from the representative filename.
    Inferred {
        template: Template,
        selection: FieldSelection,
    },
    /// A user-written regex template.
    Regex {
        template: String,
        pattern: StructurePattern,
    },
}

pub struct OrganizerSession {
    config: OrganizerConfig,
    fields: FieldSet,
    data: DataSet,
    side: StructureFinder,
    ventral: StructureFinder,
    video: StructureFinder,
    source: Option<StructureSource>,
}

impl OrganizerSession {
    /// Builds a session over already scanned files.
    pub fn new(config: OrganizerConfig, data: DataSet) -> Result<Self, SessionError> {
        let fields = config.fields()?;
        let separators = config.structure.separators.clone();
        let (side, ventral, video) = build_finders(&data, &separators)?;

        Ok(Self {
            config,
            fields,
            data,
            side,
            ventral,
            video,
            source: None,
        })
    }

    /// Scans `root` and builds a session over its files.
    pub fn open(root: &Path, config: OrganizerConfig) -> Result<Self, SessionError> {
        let data = scan_data_folder(root, &config.data)?;
        Self::new(config, data)
    }

    pub fn config(&self) -> &OrganizerConfig {
        &self.config
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn data(&self) -> &DataSet {
        &self.data
    }

    pub fn separators(&self) -> &[String] {
        self.side.separators()
    }

    pub fn source(&self) -> Option<&StructureSource> {
        self.source.as_ref()
    }

    pub fn finder(&self, class: FileClass) -> &StructureFinder {
        match class {
            FileClass::Side => &self.side,
            FileClass::Ventral => &self.ventral,
            FileClass::Video => &self.video,
        }
    }

    /// Re-tokenizes every file with `separators`.
    ///
    /// On error the previous separators stay in place.
    pub fn set_separators<S: AsRef<str>>(&mut self, separators: &[S]) -> Result<(), SessionError> {
        let (side, ventral, video) = build_finders(&self.data, separators)?;
        self.side = side;
        self.ventral = ventral;
        self.video = video;
        self.config.structure.separators = self.side.separators().to_vec();
        tracing::debug!(separators = ?self.side.separators(), "separators updated");
        Ok(())
    }

    /// The side file with the most tokens, the natural template.
    pub fn representative(&self) -> Option<&Tokenized> {
        self.side.representative()
    }

    /// Uses `template` and `selection` for structure inference.
    pub fn set_template(
        &mut self,
        template: Template,
        selection: FieldSelection,
    ) -> Result<(), SessionError> {
        if selection.len() != self.fields.len() {
            return Err(StructureError::FieldCountMismatch {
                expected: self.fields.len(),
                got: selection.len(),
            }
            .into());
        }
        self.source = Some(StructureSource::Inferred {
            template,
            selection,
        });
        Ok(())
    }

    /// Builds the template from per-token field tags on the representative.
    pub fn set_tags(&mut self, tags: &[Option<&str>]) -> Result<(), SessionError> {
        let representative = self.representative().ok_or(SessionError::NoSideFiles)?;
        let (template, selection) = Template::from_tags(
            representative.text(),
            self.side.separators(),
            tags,
            &self.fields,
        )?;
        self.set_template(template, selection)
    }

    /// Uses a regex template for field capture.
    ///
    /// On error the previous structure source stays in place.
    pub fn set_regex_template(&mut self, template: &str) -> Result<(), SessionError> {
        let pattern = StructurePattern::compile(template, &self.fields, &self.config.regex)?;
        tracing::debug!(regex = pattern.as_str(), "regex template compiled");
        self.source = Some(StructureSource::Regex {
            template: template.to_string(),
            pattern,
        });
        Ok(())
    }

    /// Field values of every file of `class`, in listing order.
    pub fn structure_dicts(&self, class: FileClass) -> Result<Vec<FieldValues>, SessionError> {
        match self.source.as_ref().ok_or(SessionError::NoStructure)? {
            StructureSource::Inferred {
                template,
                selection,
            } => Ok(self
                .finder(class)
                .find_structure(template, selection, &self.fields)?),
            StructureSource::Regex { pattern, .. } => Ok(self
                .data
                .files(class)
                .iter()
                .map(|path| {
                    pattern
                        .capture(&file_name(path))
                        .fields_or_fallback(&self.fields)
                })
                .collect()),
        }
    }

    /// The regex template describing the current structure.
    ///
    /// For an inferred structure it is generated from the values aligned
    /// over the side files.
    pub fn structure_template(&self) -> Result<String, SessionError> {
        match self.source.as_ref().ok_or(SessionError::NoStructure)? {
            StructureSource::Inferred {
                template,
                selection,
            } => {
                let alignments = self.side.align(template, &selection.assigned_positions());
                Ok(self.side.structure_template(
                    &alignments,
                    template,
                    selection,
                    &self.fields,
                    &self.config.regex,
                ))
            }
            StructureSource::Regex { template, .. } => Ok(template.clone()),
        }
    }

    /// Association rules from the configuration.
    pub fn policy(&self) -> AssociationPolicy {
        self.config.policy()
    }

    /// Runs association over the three file classes.
    pub fn associated(
        &self,
        policy: &AssociationPolicy,
    ) -> Result<Vec<AssociatedRecord>, SessionError> {
        let side = self.entries(FileClass::Side)?;
        let ventral = self.entries(FileClass::Ventral)?;
        let video = self.entries(FileClass::Video)?;
        Ok(associate_files(&side, &ventral, &video, policy))
    }

    pub fn field_summary(&self, records: &[AssociatedRecord]) -> Vec<FieldSummary> {
        summarize_fields(records, &self.fields)
    }

    pub fn plan(&self, records: &[AssociatedRecord], target: &Path) -> CopyPlan {
        CopyPlan::build(records, &self.fields, &self.config.output, target)
    }

    /// Associates with `policy` and starts copying under `target`.
    pub fn organize<F>(
        &self,
        target: &Path,
        policy: &AssociationPolicy,
        progress: F,
    ) -> Result<CopyJob, SessionError>
    where
        F: FnMut(usize, usize) + Send + 'static,
    {
        let records = self.associated(policy)?;
        let plan = self.plan(&records, target);
        tracing::info!(
            records = records.len(),
            files = plan.len(),
            target = %target.display(),
            "starting copy"
        );
        Ok(CopyJob::spawn(plan, progress))
    }

    fn entries(&self, class: FileClass) -> Result<Vec<FileEntry>, SessionError> {
        let values = self.structure_dicts(class)?;
        Ok(self
            .data
            .files(class)
            .iter()
            .zip(values)
            .map(|(path, fields)| FileEntry::new(path.clone(), fields))
            .collect())
    }
}

fn build_finders<S: AsRef<str>>(
    data: &DataSet,
    separators: &[S],
) -> Result<(StructureFinder, StructureFinder, StructureFinder), StructureError> {
    Ok((
        StructureFinder::new(&data.stems(FileClass::Side), separators)?,
        StructureFinder::new(&data.stems(FileClass::Ventral), separators)?,
        StructureFinder::new(&data.stems(FileClass::Video), separators)?,
    ))
}
