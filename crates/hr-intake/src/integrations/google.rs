use std::path::Path;

use google_drive3::DriveHub;
use google_sheets4::{common, hyper_rustls, hyper_util, yup_oauth2, Sheets};
use hyper_util::client::legacy::connect::HttpConnector;
use tracing::{debug, info};

use super::drive::{DriveGateway, GoogleDriveClient};
use super::sheets::GoogleSheetsClient;
use crate::config::{SheetsConfig, SpreadsheetLocator};
use crate::error::AppError;

pub type HttpsConnector = hyper_rustls::HttpsConnector<HttpConnector>;

/// Service-account token source shared by the Sheets and Drive hubs.
pub type GoogleAuth = yup_oauth2::authenticator::DefaultAuthenticator;

pub async fn service_account_auth(key_file: &Path) -> std::io::Result<GoogleAuth> {
    let key = yup_oauth2::read_service_account_key(key_file).await?;
    debug!(client_email = %key.client_email, "using Google service account");
    yup_oauth2::ServiceAccountAuthenticator::builder(key)
        .build()
        .await
}

pub fn https_client() -> std::io::Result<common::Client<HttpsConnector>> {
    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()?
        .https_or_http()
        .enable_http2()
        .build();
    Ok(
        hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
            .build(connector),
    )
}

/// Authenticates with the service-account key and opens the configured spreadsheet,
/// looking its id up on Drive when only a name is configured.
pub async fn connect_sheets(
    config: &SheetsConfig,
) -> Result<GoogleSheetsClient<HttpsConnector>, AppError> {
    let auth = service_account_auth(&config.key_file).await?;

    let spreadsheet_id = match &config.spreadsheet {
        SpreadsheetLocator::Id(id) => id.clone(),
        SpreadsheetLocator::Name(name) => {
            let drive = GoogleDriveClient::new(DriveHub::new(https_client()?, auth.clone()));
            let found = drive.find_spreadsheet(name).await?;
            info!(
                name = %found.name,
                spreadsheet_id = %found.file_id,
                "spreadsheet located on Drive"
            );
            found.file_id
        }
    };

    Ok(GoogleSheetsClient::new(
        Sheets::new(https_client()?, auth),
        spreadsheet_id,
        config.responses_tab.clone(),
        config.openings_tab.clone(),
    ))
}
