use std::collections::BTreeSet;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
const DEFAULT_SPREADSHEET_NAME: &str = "HR Bot Responses";
const DEFAULT_RESPONSES_TAB: &str = "Responses";
const DEFAULT_OPENINGS_TAB: &str = "Vacancies";
const DEFAULT_WEBHOOK_PATH: &str = "/webhook";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the intake bot.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub bot: BotConfig,
    pub sheets: SheetsConfig,
    pub transport: TransportConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = LogFormat::from_str(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        );

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            bot: BotConfig::from_env()?,
            sheets: SheetsConfig::from_env()?,
            transport: TransportConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding used in webhook mode.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => Self::Pretty,
            _ => Self::Compact,
        }
    }
}

/// Chat platform credentials and the people allowed to operate the bot.
#[derive(Clone)]
pub struct BotConfig {
    pub token: String,
    pub api_base_url: String,
    /// Reviewer destination; `None` disables notifications.
    pub reviewer_chat_id: Option<i64>,
    pub admin_ids: BTreeSet<i64>,
}

impl BotConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let token = required_var("BOT_TOKEN")?;
        let api_base_url = env::var("TELEGRAM_API_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string());

        let reviewer_chat_id = match env::var("HR_CHAT_ID") {
            Ok(raw) if !raw.trim().is_empty() => {
                let id = raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| ConfigError::InvalidChatId(raw.clone()))?;
                (id != 0).then_some(id)
            }
            _ => None,
        };

        let admin_ids = parse_admin_ids(&env::var("ADMIN_IDS").unwrap_or_default());

        Ok(Self {
            token,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            reviewer_chat_id,
            admin_ids,
        })
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("reviewer_chat_id", &self.reviewer_chat_id)
            .field("admin_ids", &self.admin_ids)
            .finish()
    }
}

/// Entries that are not plain unsigned integers are ignored.
pub fn parse_admin_ids(raw: &str) -> BTreeSet<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty() && entry.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|entry| entry.parse::<i64>().ok())
        .collect()
}

/// How the bot finds its spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpreadsheetLocator {
    Id(String),
    /// Resolved through a Drive name lookup at startup.
    Name(String),
}

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub key_file: PathBuf,
    pub spreadsheet: SpreadsheetLocator,
    pub responses_tab: String,
    pub openings_tab: String,
}

impl SheetsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let key_file = PathBuf::from(required_var("GOOGLE_SHEETS_KEYFILE")?);
        if !key_file.exists() {
            return Err(ConfigError::MissingKeyFile(key_file));
        }

        let spreadsheet = match optional_var("GOOGLE_SHEETS_SPREADSHEET_ID") {
            Some(id) => SpreadsheetLocator::Id(id),
            None => SpreadsheetLocator::Name(
                optional_var("GOOGLE_SHEETS_SPREADSHEET_NAME")
                    .unwrap_or_else(|| DEFAULT_SPREADSHEET_NAME.to_string()),
            ),
        };

        Ok(Self {
            key_file,
            spreadsheet,
            responses_tab: optional_var("GOOGLE_SHEETS_TAB")
                .unwrap_or_else(|| DEFAULT_RESPONSES_TAB.to_string()),
            openings_tab: optional_var("GOOGLE_SHEETS_OPENINGS_TAB")
                .unwrap_or_else(|| DEFAULT_OPENINGS_TAB.to_string()),
        })
    }
}

/// The two update transports are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Polling,
    Webhook,
}

impl TransportMode {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "polling" | "poll" => Ok(Self::Polling),
            "webhook" => Ok(Self::Webhook),
            other => Err(ConfigError::InvalidTransport(other.to_string())),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Polling => "polling",
            Self::Webhook => "webhook",
        }
    }
}

#[derive(Clone)]
pub struct TransportConfig {
    pub mode: TransportMode,
    pub webhook_path: String,
    /// Empty disables the shared-secret header check.
    pub webhook_secret: String,
    /// Public URL registered with the platform on startup, when set.
    pub webhook_url: Option<String>,
}

impl TransportConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mode = TransportMode::parse(&env::var("BOT_MODE").unwrap_or_default())?;
        let mut webhook_path =
            optional_var("WEBHOOK_PATH").unwrap_or_else(|| DEFAULT_WEBHOOK_PATH.to_string());
        if !webhook_path.starts_with('/') {
            webhook_path.insert(0, '/');
        }

        Ok(Self {
            mode,
            webhook_path,
            webhook_secret: env::var("WEBHOOK_SECRET").unwrap_or_default(),
            webhook_url: optional_var("WEBHOOK_URL"),
        })
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("mode", &self.mode)
            .field("webhook_path", &self.webhook_path)
            .field("webhook_secret_set", &!self.webhook_secret.is_empty())
            .field("webhook_url", &self.webhook_url)
            .finish()
    }
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    optional_var(name).ok_or(ConfigError::MissingVar(name))
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    MissingVar(&'static str),
    InvalidChatId(String),
    MissingKeyFile(PathBuf),
    InvalidTransport(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::MissingVar(name) => write!(f, "{name} must be set"),
            ConfigError::InvalidChatId(raw) => {
                write!(f, "HR_CHAT_ID must be an integer chat id, got '{raw}'")
            }
            ConfigError::MissingKeyFile(path) => write!(
                f,
                "GOOGLE_SHEETS_KEYFILE points to a missing file: {}",
                path.display()
            ),
            ConfigError::InvalidTransport(mode) => {
                write!(f, "BOT_MODE must be 'polling' or 'webhook', got '{mode}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    const VARS: &[&str] = &[
        "APP_ENV",
        "APP_HOST",
        "APP_PORT",
        "APP_LOG_LEVEL",
        "APP_LOG_FORMAT",
        "BOT_TOKEN",
        "TELEGRAM_API_URL",
        "HR_CHAT_ID",
        "ADMIN_IDS",
        "GOOGLE_SHEETS_KEYFILE",
        "GOOGLE_SHEETS_SPREADSHEET_ID",
        "GOOGLE_SHEETS_SPREADSHEET_NAME",
        "GOOGLE_SHEETS_TAB",
        "GOOGLE_SHEETS_OPENINGS_TAB",
        "BOT_MODE",
        "WEBHOOK_PATH",
        "WEBHOOK_SECRET",
        "WEBHOOK_URL",
    ];

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for var in VARS {
            env::remove_var(var);
        }
        env::set_var("BOT_TOKEN", "123:abc");
        env::set_var(
            "GOOGLE_SHEETS_KEYFILE",
            concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml"),
        );
    }

    #[test]
    fn load_uses_defaults_when_optional_env_missing() {
        let _lock = env_guard().lock().unwrap_or_else(|p| p.into_inner());
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.format, LogFormat::Compact);
        assert_eq!(config.bot.api_base_url, "https://api.telegram.org");
        assert_eq!(config.bot.reviewer_chat_id, None);
        assert!(config.bot.admin_ids.is_empty());
        assert_eq!(
            config.sheets.spreadsheet,
            SpreadsheetLocator::Name("HR Bot Responses".to_string())
        );
        assert_eq!(config.sheets.responses_tab, "Responses");
        assert_eq!(config.sheets.openings_tab, "Vacancies");
        assert_eq!(config.transport.mode, TransportMode::Polling);
        assert_eq!(config.transport.webhook_path, "/webhook");
        assert!(config.transport.webhook_url.is_none());
    }

    #[test]
    fn missing_token_is_rejected() {
        let _lock = env_guard().lock().unwrap_or_else(|p| p.into_inner());
        reset_env();
        env::remove_var("BOT_TOKEN");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::MissingVar("BOT_TOKEN"))
        ));
    }

    #[test]
    fn missing_key_file_is_rejected() {
        let _lock = env_guard().lock().unwrap_or_else(|p| p.into_inner());
        reset_env();
        env::set_var("GOOGLE_SHEETS_KEYFILE", "/definitely/not/here.json");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::MissingKeyFile(_))
        ));
    }

    #[test]
    fn spreadsheet_id_wins_over_name_and_webhook_settings_apply() {
        let _lock = env_guard().lock().unwrap_or_else(|p| p.into_inner());
        reset_env();
        env::set_var("GOOGLE_SHEETS_SPREADSHEET_ID", "sheet-42");
        env::set_var("GOOGLE_SHEETS_SPREADSHEET_NAME", "ignored");
        env::set_var("HR_CHAT_ID", "-100200300");
        env::set_var("BOT_MODE", "Webhook");
        env::set_var("WEBHOOK_PATH", "hooks/tg");
        env::set_var("WEBHOOK_URL", "https://bot.example.com/hooks/tg");

        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.sheets.spreadsheet,
            SpreadsheetLocator::Id("sheet-42".to_string())
        );
        assert_eq!(config.bot.reviewer_chat_id, Some(-100200300));
        assert_eq!(config.transport.mode, TransportMode::Webhook);
        assert_eq!(config.transport.webhook_path, "/hooks/tg");
    }

    #[test]
    fn zero_reviewer_chat_disables_notifications() {
        let _lock = env_guard().lock().unwrap_or_else(|p| p.into_inner());
        reset_env();
        env::set_var("HR_CHAT_ID", "0");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.bot.reviewer_chat_id, None);
    }

    #[test]
    fn unknown_transport_is_rejected() {
        assert!(matches!(
            TransportMode::parse("carrier-pigeon"),
            Err(ConfigError::InvalidTransport(_))
        ));
    }

    #[test]
    fn admin_ids_skip_non_numeric_entries() {
        let ids = parse_admin_ids(" 123, abc ,456,,-7");
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![123, 456]);
    }

    #[test]
    fn accepts_localhost_host() {
        let server = ServerConfig {
            host: "localhost".to_string(),
            port: 8080,
        };
        let addr = server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 8080));
    }
}
