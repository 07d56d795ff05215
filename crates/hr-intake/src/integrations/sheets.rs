//! Google Sheets backing for the opening catalog and the Responses tab.

use std::collections::HashMap;

use async_trait::async_trait;
use google_sheets4::api::{
    AddSheetRequest, BatchUpdateSpreadsheetRequest, GridProperties, Request, Scope,
    SheetProperties, ValueRange,
};
use google_sheets4::Sheets;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::workflows::intake::persister::LAYOUT_V1;
use crate::workflows::intake::{CatalogError, CatalogSource, OpeningRow, ResponseSheet, SheetError};

const NEW_TAB_ROWS: i32 = 2000;
const NEW_TAB_COLUMNS: i32 = 40;

pub struct GoogleSheetsClient<C>
where
    C: google_sheets4::common::Connector + Send + Sync + 'static,
{
    hub: Sheets<C>,
    spreadsheet_id: String,
    responses_tab: String,
    openings_tab: String,
    responses_ready: OnceCell<()>,
}

impl<C> GoogleSheetsClient<C>
where
    C: google_sheets4::common::Connector + Send + Sync + 'static,
{
    pub fn new(
        hub: Sheets<C>,
        spreadsheet_id: impl Into<String>,
        responses_tab: impl Into<String>,
        openings_tab: impl Into<String>,
    ) -> Self {
        Self {
            hub,
            spreadsheet_id: spreadsheet_id.into(),
            responses_tab: responses_tab.into(),
            openings_tab: openings_tab.into(),
            responses_ready: OnceCell::new(),
        }
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    fn map_error<E: std::fmt::Display>(err: E) -> SheetError {
        SheetError::Backend(err.to_string())
    }

    /// Creates the Responses tab, headed with layout V1, the first time it is needed.
    async fn ensure_responses_tab(&self) -> Result<(), SheetError> {
        self.responses_ready
            .get_or_try_init(|| async {
                let (_, spreadsheet) = self
                    .hub
                    .spreadsheets()
                    .get(&self.spreadsheet_id)
                    .add_scope(Scope::Spreadsheet)
                    .doit()
                    .await
                    .map_err(|err| {
                        SheetError::SpreadsheetNotFound(format!("{}: {err}", self.spreadsheet_id))
                    })?;

                let exists = spreadsheet.sheets.unwrap_or_default().iter().any(|sheet| {
                    sheet
                        .properties
                        .as_ref()
                        .and_then(|properties| properties.title.as_deref())
                        == Some(self.responses_tab.as_str())
                });
                if exists {
                    return Ok(());
                }

                info!(tab = %self.responses_tab, "creating missing Responses tab");
                let request = BatchUpdateSpreadsheetRequest {
                    requests: Some(vec![Request {
                        add_sheet: Some(AddSheetRequest {
                            properties: Some(SheetProperties {
                                title: Some(self.responses_tab.clone()),
                                grid_properties: Some(GridProperties {
                                    row_count: Some(NEW_TAB_ROWS),
                                    column_count: Some(NEW_TAB_COLUMNS),
                                    ..GridProperties::default()
                                }),
                                ..SheetProperties::default()
                            }),
                        }),
                        ..Request::default()
                    }]),
                    ..BatchUpdateSpreadsheetRequest::default()
                };
                self.hub
                    .spreadsheets()
                    .batch_update(request, &self.spreadsheet_id)
                    .add_scope(Scope::Spreadsheet)
                    .doit()
                    .await
                    .map_err(Self::map_error)?;
                self.append_values(LAYOUT_V1.iter().map(|name| name.to_string()).collect())
                    .await
            })
            .await
            .map(|_| ())
    }

    async fn append_values(&self, cells: Vec<String>) -> Result<(), SheetError> {
        let request = ValueRange {
            values: Some(vec![cells.into_iter().map(Value::String).collect()]),
            ..ValueRange::default()
        };
        let range = format!("{}!A1", quoted_tab(&self.responses_tab));
        self.hub
            .spreadsheets()
            .values_append(request, &self.spreadsheet_id, &range)
            .value_input_option("USER_ENTERED")
            .insert_data_option("INSERT_ROWS")
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .map_err(Self::map_error)?;
        Ok(())
    }

    async fn read_values(&self, range: &str) -> Result<Vec<Vec<Value>>, SheetError> {
        let (_, values) = self
            .hub
            .spreadsheets()
            .values_get(&self.spreadsheet_id, range)
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .map_err(Self::map_error)?;
        Ok(values.values.unwrap_or_default())
    }
}

impl<C> std::fmt::Debug for GoogleSheetsClient<C>
where
    C: google_sheets4::common::Connector + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSheetsClient")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("responses_tab", &self.responses_tab)
            .field("openings_tab", &self.openings_tab)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C> CatalogSource for GoogleSheetsClient<C>
where
    C: google_sheets4::common::Connector + Send + Sync + 'static,
{
    async fn fetch_rows(&self) -> Result<Vec<OpeningRow>, CatalogError> {
        let values = self
            .read_values(&quoted_tab(&self.openings_tab))
            .await
            .map_err(|err| CatalogError::Source(err.to_string()))?;
        let rows = opening_rows(values);
        debug!(tab = %self.openings_tab, rows = rows.len(), "fetched openings rows");
        Ok(rows)
    }
}

#[async_trait]
impl<C> ResponseSheet for GoogleSheetsClient<C>
where
    C: google_sheets4::common::Connector + Send + Sync + 'static,
{
    async fn header_row(&self) -> Result<Vec<String>, SheetError> {
        self.ensure_responses_tab().await?;
        let range = format!("{}!1:1", quoted_tab(&self.responses_tab));
        let values = self.read_values(&range).await?;
        Ok(values
            .into_iter()
            .next()
            .unwrap_or_default()
            .iter()
            .map(cell_text)
            .collect())
    }

    async fn append_row(&self, cells: Vec<String>) -> Result<(), SheetError> {
        self.ensure_responses_tab().await?;
        self.append_values(cells).await
    }
}

/// A1 tab reference, quoted so names with spaces or apostrophes work.
pub fn quoted_tab(tab: &str) -> String {
    format!("'{}'", tab.replace('\'', "''"))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Maps the openings tab to rows by header name (`code | title | order | key | question`,
/// any column order, case-insensitive). Short rows read as blank cells.
pub fn opening_rows(values: Vec<Vec<Value>>) -> Vec<OpeningRow> {
    let mut values = values.into_iter();
    let Some(header) = values.next() else {
        return Vec::new();
    };
    let columns: HashMap<String, usize> = header
        .iter()
        .enumerate()
        .map(|(index, name)| (cell_text(name).trim().to_ascii_lowercase(), index))
        .collect();

    values
        .map(|row| {
            let cell = |name: &str| {
                columns
                    .get(name)
                    .and_then(|&index| row.get(index))
                    .map(cell_text)
                    .unwrap_or_default()
            };
            OpeningRow {
                code: cell("code"),
                title: cell("title"),
                order: cell("order"),
                key: cell("key"),
                question: cell("question"),
            }
        })
        .collect()
}
