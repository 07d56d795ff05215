//! Clients for the services the intake bot talks to: Telegram for chat, Google Sheets for the
//! catalog and responses, Google Drive for locating the spreadsheet.

pub mod drive;
pub mod google;
pub mod sheets;
pub mod telegram;

pub use drive::{DriveGateway, DriveOperationError, GoogleDriveClient};
pub use google::{connect_sheets, https_client, service_account_auth, GoogleAuth, HttpsConnector};
pub use sheets::GoogleSheetsClient;
pub use telegram::{event_from_update, TelegramClient, Update};
