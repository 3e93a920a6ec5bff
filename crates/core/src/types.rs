//! Core types for the archiver
//!
//! This module defines the identity and classification of an archival unit:
//! - [`DatasetDescriptor`]: code, store location, size, share and hierarchy
//! - [`DatasetRecord`]: the descriptive metadata serialized into packages
//! - [`ArchivingStatus`]: archiving state recorded by the metadata collaborator

use std::fmt;

/// Immutable identity and classification of one dataset.
///
/// Created by the metadata collaborator before any archiving operation.
/// The archiver only ever writes back the derived share id and size, and it
/// does so through the collaborator, never by mutating a descriptor.
///
/// # Example
///
/// ```
/// use coldstore_core::DatasetDescriptor;
///
/// let ds = DatasetDescriptor::new("ds1", "a/b/c/ds1")
///     .with_size(42)
///     .with_share_id("1")
///     .with_experiment("S", "P", "E1");
/// assert_eq!(ds.experiment_identifier, "/S/P/E1");
/// assert_eq!(ds.identifier_chain(), vec!["/S/P/E1", "/S/P", "/S"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDescriptor {
    /// Unique dataset code
    pub code: String,
    /// Relative path of the dataset directory under a share
    pub location: String,
    /// Recorded size in bytes, `None` if never measured
    pub size: Option<u64>,
    /// Id of the share currently holding the dataset
    pub share_id: String,
    /// Dataset type code
    pub type_code: String,
    /// Space the dataset belongs to
    pub space_code: String,
    /// Project the dataset belongs to
    pub project_code: String,
    /// Experiment code
    pub experiment_code: String,
    /// Full experiment identifier, `/SPACE/PROJECT/EXPERIMENT`
    pub experiment_identifier: String,
    /// Optional sample code
    pub sample_code: Option<String>,
}

impl DatasetDescriptor {
    /// Create a descriptor with only code and location set.
    pub fn new(code: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            location: location.into(),
            size: None,
            share_id: String::new(),
            type_code: String::new(),
            space_code: String::new(),
            project_code: String::new(),
            experiment_code: String::new(),
            experiment_identifier: String::new(),
            sample_code: None,
        }
    }

    /// Set the recorded size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the owning share.
    pub fn with_share_id(mut self, share_id: impl Into<String>) -> Self {
        self.share_id = share_id.into();
        self
    }

    /// Set the dataset type code.
    pub fn with_type_code(mut self, type_code: impl Into<String>) -> Self {
        self.type_code = type_code.into();
        self
    }

    /// Set space, project and experiment codes; derives the experiment identifier.
    pub fn with_experiment(
        mut self,
        space: impl Into<String>,
        project: impl Into<String>,
        experiment: impl Into<String>,
    ) -> Self {
        self.space_code = space.into();
        self.project_code = project.into();
        self.experiment_code = experiment.into();
        self.experiment_identifier = format!(
            "/{}/{}/{}",
            self.space_code, self.project_code, self.experiment_code
        );
        self
    }

    /// Set the sample code.
    pub fn with_sample(mut self, sample_code: impl Into<String>) -> Self {
        self.sample_code = Some(sample_code.into());
        self
    }

    /// Identifier of the owning project, `/SPACE/PROJECT`.
    pub fn project_identifier(&self) -> String {
        format!("/{}/{}", self.space_code, self.project_code)
    }

    /// Identifier of the owning space, `/SPACE`.
    pub fn space_identifier(&self) -> String {
        format!("/{}", self.space_code)
    }

    /// Hierarchical identifiers from most to least specific.
    ///
    /// Empty levels are skipped so that a dataset without experiment
    /// information still routes by space.
    pub fn identifier_chain(&self) -> Vec<String> {
        let mut chain = Vec::with_capacity(3);
        if !self.experiment_identifier.is_empty() {
            chain.push(self.experiment_identifier.clone());
        }
        if !self.space_code.is_empty() && !self.project_code.is_empty() {
            chain.push(self.project_identifier());
        }
        if !self.space_code.is_empty() {
            chain.push(self.space_identifier());
        }
        chain
    }
}

impl fmt::Display for DatasetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dataset '{}'", self.code)
    }
}

/// Archiving state of a dataset as recorded by the metadata collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchivingStatus {
    /// Dataset is in the live store
    Available,
    /// Dataset is only in the archive
    Archived,
    /// Dataset is locked against archiving
    Locked,
    /// Archiving has been requested
    ArchivePending,
    /// Unarchiving has been requested
    UnarchivePending,
}

impl fmt::Display for ArchivingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArchivingStatus::Available => "AVAILABLE",
            ArchivingStatus::Archived => "ARCHIVED",
            ArchivingStatus::Locked => "LOCKED",
            ArchivingStatus::ArchivePending => "ARCHIVE_PENDING",
            ArchivingStatus::UnarchivePending => "UNARCHIVE_PENDING",
        };
        f.write_str(name)
    }
}

/// Descriptive metadata of a dataset, as delivered by the metadata collaborator.
///
/// Values are pre-formatted strings; nothing here is computed by the archiver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetRecord {
    /// Dataset code
    pub code: String,
    /// Dataset type code
    pub data_set_type: String,
    /// Production timestamp, if known
    pub production_timestamp: Option<String>,
    /// Producer code, if known
    pub producer_code: Option<String>,
    /// Whether the dataset holds measured (as opposed to derived) data
    pub is_measured: bool,
    /// Completeness flag, if known
    pub is_complete: Option<bool>,
    /// Codes of parent datasets
    pub parent_codes: Vec<String>,
    /// Dataset properties in display order
    pub properties: Vec<(String, String)>,
    /// Owning experiment
    pub experiment: ExperimentRecord,
    /// Owning sample, if any
    pub sample: Option<SampleRecord>,
}

/// Experiment metadata serialized into packages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperimentRecord {
    /// Space code
    pub space_code: String,
    /// Project code
    pub project_code: String,
    /// Experiment code
    pub code: String,
    /// Experiment type code
    pub type_code: String,
    /// Registration timestamp, pre-formatted
    pub registration_timestamp: Option<String>,
    /// Registering person, pre-formatted
    pub registrator: Option<String>,
    /// Experiment properties in display order
    pub properties: Vec<(String, String)>,
}

/// Sample metadata serialized into packages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleRecord {
    /// Sample type code
    pub type_code: String,
    /// Sample code
    pub code: String,
    /// Space code
    pub space_code: String,
    /// Registration timestamp, pre-formatted
    pub registration_timestamp: Option<String>,
    /// Registering person, pre-formatted
    pub registrator: Option<String>,
    /// Sample properties in display order
    pub properties: Vec<(String, String)>,
}

impl DatasetRecord {
    /// Minimal record derived from a descriptor.
    ///
    /// Used when the collaborator has nothing richer to offer.
    pub fn from_descriptor(dataset: &DatasetDescriptor) -> Self {
        DatasetRecord {
            code: dataset.code.clone(),
            data_set_type: dataset.type_code.clone(),
            is_measured: true,
            experiment: ExperimentRecord {
                space_code: dataset.space_code.clone(),
                project_code: dataset.project_code.clone(),
                code: dataset.experiment_code.clone(),
                ..Default::default()
            },
            sample: dataset.sample_code.as_ref().map(|code| SampleRecord {
                code: code.clone(),
                space_code: dataset.space_code.clone(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}
