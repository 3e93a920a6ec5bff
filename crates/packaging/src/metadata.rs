//! Metadata entry of a package
//!
//! Every package carries `meta-data.tsv` with `entity<TAB>field<TAB>value`
//! rows. Values are taken verbatim from the metadata collaborator; only tabs
//! and line breaks are flattened to spaces.

use coldstore_core::DatasetRecord;

/// Name of the metadata entry at the package root.
pub const METADATA_FILE_NAME: &str = "meta-data.tsv";

/// One metadata row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRow {
    /// `data_set`, `sample` or `experiment`
    pub entity: &'static str,
    /// Field name
    pub field: String,
    /// Field value, empty if unknown
    pub value: String,
}

fn row(entity: &'static str, field: impl Into<String>, value: impl Into<String>) -> MetadataRow {
    MetadataRow {
        entity,
        field: field.into(),
        value: value.into(),
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Rows describing `record`, in serialization order.
pub fn metadata_rows(record: &DatasetRecord) -> Vec<MetadataRow> {
    let mut rows = vec![
        row("data_set", "code", record.code.as_str()),
        row(
            "data_set",
            "production_timestamp",
            record.production_timestamp.clone().unwrap_or_default(),
        ),
        row(
            "data_set",
            "producer_code",
            record.producer_code.clone().unwrap_or_default(),
        ),
        row("data_set", "data_set_type", record.data_set_type.as_str()),
        row("data_set", "is_measured", flag(record.is_measured)),
        row(
            "data_set",
            "is_complete",
            record.is_complete.map(flag).unwrap_or_default(),
        ),
    ];
    rows.extend(
        record
            .properties
            .iter()
            .map(|(k, v)| row("data_set", k.as_str(), v.as_str())),
    );
    rows.push(row("data_set", "parent_codes", record.parent_codes.join(", ")));

    if let Some(sample) = &record.sample {
        rows.push(row("sample", "type_code", sample.type_code.as_str()));
        rows.push(row("sample", "code", sample.code.as_str()));
        rows.push(row("sample", "space_code", sample.space_code.as_str()));
        rows.push(row(
            "sample",
            "registration_timestamp",
            sample.registration_timestamp.clone().unwrap_or_default(),
        ));
        rows.push(row(
            "sample",
            "registrator",
            sample.registrator.clone().unwrap_or_default(),
        ));
        rows.extend(
            sample
                .properties
                .iter()
                .map(|(k, v)| row("sample", k.as_str(), v.as_str())),
        );
    }

    let experiment = &record.experiment;
    rows.push(row("experiment", "space_code", experiment.space_code.as_str()));
    rows.push(row("experiment", "project_code", experiment.project_code.as_str()));
    rows.push(row("experiment", "experiment_code", experiment.code.as_str()));
    rows.push(row(
        "experiment",
        "experiment_type_code",
        experiment.type_code.as_str(),
    ));
    rows.push(row(
        "experiment",
        "registration_timestamp",
        experiment.registration_timestamp.clone().unwrap_or_default(),
    ));
    rows.push(row(
        "experiment",
        "registrator",
        experiment.registrator.clone().unwrap_or_default(),
    ));
    rows.extend(
        experiment
            .properties
            .iter()
            .map(|(k, v)| row("experiment", k.as_str(), v.as_str())),
    );
    rows
}

fn flatten(value: &str) -> String {
    value.replace(['\t', '\r', '\n'], " ")
}

/// Serialize rows as TSV.
pub fn to_tsv(rows: &[MetadataRow]) -> String {
    let mut out = String::new();
    for r in rows {
        out.push_str(r.entity);
        out.push('\t');
        out.push_str(&flatten(&r.field));
        out.push('\t');
        out.push_str(&flatten(&r.value));
        out.push('\n');
    }
    out
}
