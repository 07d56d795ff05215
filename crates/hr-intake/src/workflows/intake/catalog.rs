//! Opening catalog: raw sheet rows in, validated [`OpeningCatalog`] out.
//!
//! The catalog is shared through [`CatalogHandle`], which swaps a whole snapshot at a time.
//! Readers hold an `Arc` to the snapshot they started with, so a reload never exposes a
//! half-built table.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use tracing::{info, warn};

use super::domain::{CatalogSummary, JobOpening, OpeningCatalog, OpeningId, Question};

/// One row of the openings sheet (`code | title | order | key | question`), untrimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OpeningRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub order: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub key: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub question: String,
}

impl OpeningRow {
    fn is_blank(&self) -> bool {
        [&self.code, &self.title, &self.order, &self.key, &self.question]
            .iter()
            .all(|cell| cell.trim().is_empty())
    }

    fn missing_field(&self) -> Option<&'static str> {
        [
            ("code", &self.code),
            ("title", &self.title),
            ("key", &self.key),
            ("question", &self.question),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }

    /// Absent or unparseable order sorts as 0.
    fn order_value(&self) -> i64 {
        self.order.trim().parse::<i64>().unwrap_or(0)
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("the openings sheet is empty or contains no complete rows")]
    Empty,
    #[error("row {row} of the openings sheet is missing '{field}'")]
    MissingField { row: usize, field: &'static str },
    #[error("openings source unavailable: {0}")]
    Source(String),
    #[error("invalid openings CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to read openings export: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds the catalog from rows in sheet order.
///
/// Row numbers in errors count the header as row 1. Fully blank rows are skipped.
pub fn build_catalog(rows: Vec<OpeningRow>) -> Result<OpeningCatalog, CatalogError> {
    struct Draft {
        title: String,
        questions: Vec<(i64, Question)>,
    }

    let mut order: Vec<OpeningId> = Vec::new();
    let mut drafts: HashMap<OpeningId, Draft> = HashMap::new();

    for (position, row) in rows.into_iter().enumerate() {
        if row.is_blank() {
            continue;
        }
        if let Some(field) = row.missing_field() {
            return Err(CatalogError::MissingField {
                row: position + 2,
                field,
            });
        }

        let id = OpeningId::new(row.code.trim());
        let draft = drafts.entry(id.clone()).or_insert_with(|| {
            order.push(id);
            Draft {
                title: row.title.trim().to_string(),
                questions: Vec::new(),
            }
        });
        draft.questions.push((
            row.order_value(),
            Question {
                key: row.key.trim().to_string(),
                prompt: row.question.trim().to_string(),
            },
        ));
    }

    if order.is_empty() {
        return Err(CatalogError::Empty);
    }

    let openings = order
        .into_iter()
        .filter_map(|id| {
            let mut draft = drafts.remove(&id)?;
            // stable: equal orders keep sheet order
            draft.questions.sort_by_key(|(rank, _)| *rank);
            Some(JobOpening {
                id,
                title: draft.title,
                questions: draft.questions.into_iter().map(|(_, q)| q).collect(),
            })
        })
        .collect();

    Ok(OpeningCatalog::new(openings))
}

/// Where opening rows come from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_rows(&self) -> Result<Vec<OpeningRow>, CatalogError>;
}

/// Fetches rows from a source and validates them into a catalog.
pub struct CatalogLoader<S> {
    source: Arc<S>,
}

impl<S> CatalogLoader<S>
where
    S: CatalogSource + 'static,
{
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    pub async fn load(&self) -> Result<OpeningCatalog, CatalogError> {
        let rows = self.source.fetch_rows().await?;
        build_catalog(rows)
    }
}

impl<S> Clone for CatalogLoader<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

/// Process-wide handle to the current catalog snapshot.
#[derive(Debug, Default)]
pub struct CatalogHandle {
    current: RwLock<Arc<OpeningCatalog>>,
}

impl CatalogHandle {
    pub fn new(catalog: OpeningCatalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    pub fn snapshot(&self) -> Arc<OpeningCatalog> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, catalog: OpeningCatalog) {
        let next = Arc::new(catalog);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Loads and validates a fresh catalog, swapping it in only on success.
    pub async fn reload<S>(&self, loader: &CatalogLoader<S>) -> Result<CatalogSummary, CatalogError>
    where
        S: CatalogSource + 'static,
    {
        match loader.load().await {
            Ok(catalog) => {
                let summary = catalog.summary();
                self.replace(catalog);
                info!(
                    openings = summary.openings,
                    questions = summary.questions,
                    "opening catalog reloaded"
                );
                Ok(summary)
            }
            Err(err) => {
                warn!(error = %err, "opening catalog reload failed; keeping previous table");
                Err(err)
            }
        }
    }
}

/// Openings exported from the sheet as CSV with a `code,title,order,key,question` header.
#[derive(Debug, Clone)]
pub struct CsvCatalogSource {
    rows: Vec<OpeningRow>,
}

impl CsvCatalogSource {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);
        let rows = csv_reader
            .deserialize::<OpeningRow>()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[OpeningRow] {
        &self.rows
    }
}

#[async_trait]
impl CatalogSource for CsvCatalogSource {
    async fn fetch_rows(&self) -> Result<Vec<OpeningRow>, CatalogError> {
        Ok(self.rows.clone())
    }
}
