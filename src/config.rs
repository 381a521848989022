use crate::error::{AppError, Result};

pub const SHEETS_API_URL: &str = "https://sheets.googleapis.com";
pub const DRIVE_API_URL: &str = "https://www.googleapis.com";

/// OAuth scopes requested for the service account. Drive is only needed to
/// resolve a spreadsheet by name.
pub const GOOGLE_SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets.readonly https://www.googleapis.com/auth/drive.readonly";

/// Lifetime of the signed JWT assertion (seconds). Google caps this at one hour.
pub const ASSERTION_TTL_SECS: u64 = 3600;

/// Cached access tokens are refreshed this many seconds before they expire.
pub const TOKEN_REFRESH_MARGIN_SECS: u64 = 60;

/// Column headers the worksheet must carry.
pub const NAME_COLUMN: &str = "Name";
pub const TICKETS_COLUMN: &str = "Tickets";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_port: u16,
    /// Directory holding index.html and its assets (STATIC_DIR)
    pub static_dir: String,
    pub sheet: SheetConfig,
}

/// Where the roster lives and how to authenticate against it.
#[derive(Debug, Clone)]
pub struct SheetConfig {
    /// Path to the service-account key file (GOOGLE_SHEETS_CREDENTIALS_FILE)
    pub credentials_file: String,
    /// Spreadsheet title, resolved through Drive (SPREADSHEET_NAME)
    pub spreadsheet_name: String,
    /// Skips the Drive lookup when set (SPREADSHEET_ID)
    pub spreadsheet_id: Option<String>,
    pub worksheet_name: String,
    pub sheets_api_url: String,
    pub drive_api_url: String,
    /// Overrides the key file's token_uri when set (TOKEN_URL)
    pub token_url: Option<String>,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            api_port: lookup("API_PORT")
                .unwrap_or_else(|| "5000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            static_dir: lookup("STATIC_DIR").unwrap_or_else(|| "static".to_string()),
            sheet: SheetConfig::from_lookup(&lookup)?,
        })
    }
}

impl SheetConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        Ok(Self {
            credentials_file: lookup("GOOGLE_SHEETS_CREDENTIALS_FILE")
                .unwrap_or_else(|| "service_account.json".to_string()),
            spreadsheet_name: lookup("SPREADSHEET_NAME").unwrap_or_else(|| "Test".to_string()),
            spreadsheet_id: non_empty("SPREADSHEET_ID"),
            worksheet_name: lookup("WORKSHEET_NAME").unwrap_or_else(|| "Participants".to_string()),
            sheets_api_url: lookup("SHEETS_API_URL").unwrap_or_else(|| SHEETS_API_URL.to_string()),
            drive_api_url: lookup("DRIVE_API_URL").unwrap_or_else(|| DRIVE_API_URL.to_string()),
            token_url: non_empty("TOKEN_URL"),
            http_timeout_secs: lookup("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|| "30".to_string())
                .parse::<u64>()
                .map_err(|_| {
                    AppError::Config("HTTP_TIMEOUT_SECS must be a whole number of seconds".to_string())
                })?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.api_port, 5000);
        assert_eq!(cfg.static_dir, "static");
        assert_eq!(cfg.sheet.credentials_file, "service_account.json");
        assert_eq!(cfg.sheet.spreadsheet_name, "Test");
        assert_eq!(cfg.sheet.worksheet_name, "Participants");
        assert_eq!(cfg.sheet.spreadsheet_id, None);
        assert_eq!(cfg.sheet.token_url, None);
        assert_eq!(cfg.sheet.sheets_api_url, SHEETS_API_URL);
        assert_eq!(cfg.sheet.drive_api_url, DRIVE_API_URL);
        assert_eq!(cfg.sheet.http_timeout_secs, 30);
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("API_PORT", "8080"),
            ("SPREADSHEET_ID", " abc123 "),
            ("TOKEN_URL", "http://localhost/token"),
            ("HTTP_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(cfg.api_port, 8080);
        assert_eq!(cfg.sheet.spreadsheet_id.as_deref(), Some("abc123"));
        assert_eq!(cfg.sheet.token_url.as_deref(), Some("http://localhost/token"));
        assert_eq!(cfg.sheet.http_timeout_secs, 5);
    }

    #[test]
    fn bad_port_is_a_config_error() {
        for port in ["http", "70000", "-1"] {
            let err = config(&[("API_PORT", port)]).unwrap_err();
            assert!(matches!(err, AppError::Config(ref m) if m.contains("API_PORT")), "{port}");
        }
    }

    #[test]
    fn bad_timeout_is_a_config_error() {
        let err = config(&[("HTTP_TIMEOUT_SECS", "2.5")]).unwrap_err();
        assert!(matches!(err, AppError::Config(ref m) if m.contains("HTTP_TIMEOUT_SECS")));
    }

    #[test]
    fn blank_optional_values_read_as_unset() {
        let cfg = config(&[("SPREADSHEET_ID", "   "), ("TOKEN_URL", "")]).unwrap();
        assert_eq!(cfg.sheet.spreadsheet_id, None);
        assert_eq!(cfg.sheet.token_url, None);
    }
}
