//! Writes completed submissions to the Responses sheet.
//!
//! The sheet's header row is the column contract: built-in names are filled from the record's
//! fixed fields, every other name from the answer stored under that key. Record fields the
//! header does not name are appended after its last column in their fixed order. A sheet
//! without a header gets layout V1, the column order the intake sheet was first published
//! with, and that header is written before the first row.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::domain::{OpeningCatalog, SubmissionRecord};
use super::gateway::{ResponseSheet, SheetError};

/// Columns filled from fixed record fields rather than answers.
pub const BUILTIN_COLUMNS: [&str; 7] = [
    "timestamp",
    "vacancy",
    "tg_id",
    "tg_username",
    "resume_file_id",
    "resume_file_name",
    "resume_link_or_text",
];

/// Built-in columns that always carry a value; never dropped from a row.
const RECORD_COLUMNS: [&str; 5] = [
    "timestamp",
    "vacancy",
    "tg_id",
    "tg_username",
    "resume_link_or_text",
];

/// Layout V1 of the Responses sheet.
pub const LAYOUT_V1: [&str; 14] = [
    "timestamp",
    "vacancy",
    "tg_id",
    "tg_username",
    "full_name",
    "phone",
    "email",
    "city",
    "experience_years",
    "expected_salary",
    "additional_notes",
    "resume_file_id",
    "resume_file_name",
    "resume_link_or_text",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutVersion {
    /// Columns taken from the sheet header.
    Header,
    V1,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    pub version: LayoutVersion,
    columns: Vec<String>,
}

impl ColumnLayout {
    pub fn v1() -> Self {
        Self {
            version: LayoutVersion::V1,
            columns: LAYOUT_V1.iter().map(|name| name.to_string()).collect(),
        }
    }

    /// Trailing empty header cells are dropped; an empty header means V1.
    pub fn from_header(header: Vec<String>) -> Self {
        let mut columns: Vec<String> = header
            .into_iter()
            .map(|name| name.trim().to_string())
            .collect();
        while columns.last().is_some_and(|name| name.is_empty()) {
            columns.pop();
        }
        if columns.is_empty() {
            return Self::v1();
        }
        Self {
            version: LayoutVersion::Header,
            columns,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn render(&self, record: &SubmissionRecord) -> Vec<String> {
        let mut cells: Vec<String> = self
            .columns
            .iter()
            .map(|column| cell_for(column, record))
            .collect();
        cells.extend(
            RECORD_COLUMNS
                .iter()
                .filter(|builtin| !self.columns.iter().any(|column| column == *builtin))
                .map(|builtin| cell_for(builtin, record)),
        );
        cells
    }
}

fn cell_for(column: &str, record: &SubmissionRecord) -> String {
    match column {
        "timestamp" => record.submitted_at.to_rfc3339(),
        "vacancy" => record.opening_title.clone(),
        "tg_id" => record.user_id.to_string(),
        "tg_username" => record.username.clone().unwrap_or_default(),
        "resume_link_or_text" => record.resume_link.clone(),
        "resume_file_id" | "resume_file_name" | "" => String::new(),
        key => record
            .answers
            .get(key)
            .map(ToString::to_string)
            .unwrap_or_default(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("could not read the Responses header: {0}")]
    Header(SheetError),
    #[error("could not append the submission row: {0}")]
    Append(SheetError),
}

pub struct SubmissionPersister<S> {
    sheet: Arc<S>,
    header_written: Mutex<()>,
}

impl<S> SubmissionPersister<S>
where
    S: ResponseSheet + 'static,
{
    pub fn new(sheet: Arc<S>) -> Self {
        Self {
            sheet,
            header_written: Mutex::new(()),
        }
    }

    pub async fn layout(&self) -> Result<ColumnLayout, PersistenceError> {
        let header = self
            .sheet
            .header_row()
            .await
            .map_err(PersistenceError::Header)?;
        Ok(ColumnLayout::from_header(header))
    }

    /// Writes the V1 header into a headerless sheet. Concurrent first submissions write it once.
    async fn ensure_header(&self) -> Result<ColumnLayout, PersistenceError> {
        let layout = self.layout().await?;
        if layout.version != LayoutVersion::V1 {
            return Ok(layout);
        }
        let _guard = self.header_written.lock().await;
        let layout = self.layout().await?;
        if layout.version == LayoutVersion::V1 {
            info!("Responses sheet has no header; writing layout V1");
            self.sheet
                .append_row(layout.columns().to_vec())
                .await
                .map_err(PersistenceError::Append)?;
        }
        Ok(layout)
    }

    /// Appends one data row for `record`, preceded by the V1 header on a headerless sheet.
    pub async fn append(&self, record: &SubmissionRecord) -> Result<(), PersistenceError> {
        let layout = self.ensure_header().await?;
        let cells = layout.render(record);
        debug!(
            opening = %record.opening_id,
            layout = ?layout.version,
            columns = cells.len(),
            "appending submission row"
        );
        self.sheet
            .append_row(cells)
            .await
            .map_err(PersistenceError::Append)
    }

    /// Question keys the catalog asks for that have no column in the layout rows are written with.
    pub async fn diff_missing_columns(
        &self,
        catalog: &OpeningCatalog,
    ) -> Result<BTreeSet<String>, PersistenceError> {
        let layout = self.layout().await?;
        Ok(missing_columns(catalog, layout.columns()))
    }
}

pub fn missing_columns(catalog: &OpeningCatalog, header: &[String]) -> BTreeSet<String> {
    let present: BTreeSet<&str> = header.iter().map(|name| name.trim()).collect();
    catalog
        .required_keys()
        .into_iter()
        .filter(|key| !BUILTIN_COLUMNS.contains(&key.as_str()))
        .filter(|key| !present.contains(key.as_str()))
        .collect()
}
