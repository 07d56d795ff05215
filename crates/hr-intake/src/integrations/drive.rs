use async_trait::async_trait;
use google_drive3::{api::Scope, DriveHub};
use tracing::debug;

const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveSpreadsheet {
    pub file_id: String,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DriveOperationError {
    #[error("drive operation failed: {0}")]
    Backend(String),
    #[error("no spreadsheet named '{0}' is shared with the service account")]
    NotFound(String),
}

#[async_trait]
pub trait DriveGateway: Send + Sync {
    async fn find_spreadsheet(&self, name: &str) -> Result<DriveSpreadsheet, DriveOperationError>;
}

/// Thin wrapper around the generated google-drive3 client, used only to turn a
/// spreadsheet name into its id.
pub struct GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    hub: DriveHub<C>,
}

impl<C> GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    pub fn new(hub: DriveHub<C>) -> Self {
        Self { hub }
    }

    fn map_error<E: std::fmt::Display>(err: E) -> DriveOperationError {
        DriveOperationError::Backend(err.to_string())
    }
}

impl<C> std::fmt::Debug for GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleDriveClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl<C> DriveGateway for GoogleDriveClient<C>
where
    C: google_drive3::common::Connector + Send + Sync + 'static,
{
    async fn find_spreadsheet(&self, name: &str) -> Result<DriveSpreadsheet, DriveOperationError> {
        let (_, file_list) = self
            .hub
            .files()
            .list()
            .q(&name_query(name))
            .param("fields", "files(id,name)")
            .page_size(1)
            .include_items_from_all_drives(true)
            .supports_all_drives(true)
            .add_scope(Scope::MetadataReadonly)
            .doit()
            .await
            .map_err(GoogleDriveClient::<C>::map_error)?;

        let file = file_list
            .files
            .unwrap_or_default()
            .into_iter()
            .find_map(|file| {
                file.id.map(|file_id| DriveSpreadsheet {
                    file_id,
                    name: file.name.unwrap_or_else(|| name.to_string()),
                })
            })
            .ok_or_else(|| DriveOperationError::NotFound(name.to_string()))?;

        debug!(name, file_id = %file.file_id, "resolved spreadsheet by name");
        Ok(file)
    }
}

/// Drive query matching a non-trashed spreadsheet by exact name.
pub fn name_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!("name = '{escaped}' and mimeType = '{SPREADSHEET_MIME}' and trashed = false")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_query_escapes_quotes() {
        assert_eq!(
            name_query("Bob's \\ Sheet"),
            "name = 'Bob\\'s \\\\ Sheet' and mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false"
        );
    }
}
