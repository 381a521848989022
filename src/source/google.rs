use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::SheetConfig;
use crate::error::FetchError;
use crate::source::auth::{ServiceAccountKey, TokenCache, DEFAULT_TOKEN_URL};
use crate::source::{ensure_success, roster_from_rows, ParticipantSource};
use crate::types::Roster;

const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

/// Sheets omits `values` entirely for an empty worksheet.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Reads the roster from a Google Sheets worksheet with a service account.
pub struct GoogleSheetSource {
    cfg: SheetConfig,
    client: reqwest::Client,
    tokens: TokenCache,
}

impl GoogleSheetSource {
    pub fn new(cfg: SheetConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()?;
        Ok(Self {
            cfg,
            client,
            tokens: TokenCache::new(),
        })
    }

    /// First non-trashed spreadsheet visible to the service account with the configured title.
    async fn find_spreadsheet(&self, token: &str) -> Result<String, FetchError> {
        let name = &self.cfg.spreadsheet_name;
        let query = format!(
            "name = '{}' and mimeType = '{SPREADSHEET_MIME}' and trashed = false",
            escape_query_literal(name)
        );
        let url = format!("{}/drive/v3/files", self.cfg.drive_api_url.trim_end_matches('/'));

        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name)"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await?;
        let list: DriveFileList = ensure_success(resp).await?.json().await?;

        let id = list
            .files
            .into_iter()
            .next()
            .map(|f| f.id)
            .ok_or_else(|| FetchError::SpreadsheetNotFound(name.clone()))?;
        debug!("Resolved spreadsheet '{name}' to {id}");
        Ok(id)
    }

    async fn worksheet_rows(&self, token: &str, spreadsheet_id: &str) -> Result<Vec<Vec<Value>>, FetchError> {
        let range = format!("'{}'", self.cfg.worksheet_name.replace('\'', "''"));

        let mut url = reqwest::Url::parse(&self.cfg.sheets_api_url)
            .map_err(|e| FetchError::Url(format!("{}: {e}", self.cfg.sheets_api_url)))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Url(self.cfg.sheets_api_url.clone()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", range.as_str()]);

        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(&[
                ("valueRenderOption", "UNFORMATTED_VALUE"),
                ("majorDimension", "ROWS"),
            ])
            .send()
            .await?;
        let range: ValueRange = ensure_success(resp).await?.json().await?;
        Ok(range.values)
    }
}

impl ParticipantSource for GoogleSheetSource {
    async fn fetch(&self) -> Result<Roster, FetchError> {
        // Re-read every time so a rotated key file is picked up without a restart.
        let key = ServiceAccountKey::load(&self.cfg.credentials_file).await?;
        let token_url = self
            .cfg
            .token_url
            .clone()
            .or_else(|| key.token_uri.clone())
            .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string());
        let token = self.tokens.access_token(&self.client, &key, &token_url).await?;

        let spreadsheet_id = match &self.cfg.spreadsheet_id {
            Some(id) => id.clone(),
            None => self.find_spreadsheet(&token).await?,
        };
        let rows = self.worksheet_rows(&token, &spreadsheet_id).await?;
        let roster = roster_from_rows(&rows)?;

        info!(
            spreadsheet = %spreadsheet_id,
            worksheet = %self.cfg.worksheet_name,
            rows = rows.len().saturating_sub(1),
            participants = roster.len(),
            "Fetched roster"
        );
        Ok(roster)
    }
}

/// Escape a value for a single-quoted Drive query string literal.
fn escape_query_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Form, Json, Router,
    };
    use serde_json::json;

    use crate::config::TOKEN_REFRESH_MARGIN_SECS;
    use crate::types::Participant;

    const FIXTURE_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/service_account.json");
    const SHEET_ID: &str = "sheet-123";
    const ACCESS_TOKEN: &str = "test-access-token";

    #[derive(Clone)]
    struct FakeGoogle {
        values: Value,
        values_status: StatusCode,
        drive_files: Value,
        token_expires_in: u64,
        token_calls: Arc<AtomicUsize>,
        drive_calls: Arc<AtomicUsize>,
    }

    impl FakeGoogle {
        fn with_rows(values: Value) -> Self {
            Self {
                values,
                values_status: StatusCode::OK,
                drive_files: json!({ "files": [{ "id": SHEET_ID, "name": "Test" }] }),
                token_expires_in: 3599,
                token_calls: Arc::new(AtomicUsize::new(0)),
                drive_calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    async fn token(
        State(fake): State<FakeGoogle>,
        Form(form): Form<HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        fake.token_calls.fetch_add(1, Ordering::SeqCst);
        let grant_ok = form.get("grant_type").map(String::as_str) == Some(JWT_BEARER);
        let header_ok = form
            .get("assertion")
            .and_then(|a| jsonwebtoken::decode_header(a).ok())
            .is_some_and(|h| h.kid.as_deref() == Some("test-key-1"));
        if !(grant_ok && header_ok) {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_grant" })));
        }
        (
            StatusCode::OK,
            Json(json!({
                "access_token": ACCESS_TOKEN,
                "expires_in": fake.token_expires_in,
                "token_type": "Bearer"
            })),
        )
    }

    const JWT_BEARER: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

    async fn drive_files(
        State(fake): State<FakeGoogle>,
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        fake.drive_calls.fetch_add(1, Ordering::SeqCst);
        let q = params.get("q").cloned().unwrap_or_default();
        if !q.starts_with("name = 'Test' and mimeType") {
            return (StatusCode::OK, Json(json!({ "files": [] })));
        }
        (StatusCode::OK, Json(fake.drive_files.clone()))
    }

    async fn values(
        State(fake): State<FakeGoogle>,
        Path((id, range)): Path<(String, String)>,
        headers: HeaderMap,
    ) -> (StatusCode, Json<Value>) {
        let expected = format!("Bearer {ACCESS_TOKEN}");
        let authorized =
            headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(expected.as_str());
        if !authorized {
            return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthenticated" })));
        }
        if id != SHEET_ID || range != "'Participants'" {
            return (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })));
        }
        (fake.values_status, Json(fake.values.clone()))
    }

    async fn spawn_fake(fake: FakeGoogle) -> String {
        let app = Router::new()
            .route("/token", post(token))
            .route("/drive/v3/files", get(drive_files))
            .route("/v4/spreadsheets/:id/values/:range", get(values))
            .with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    fn sheet_config(base: &str) -> SheetConfig {
        SheetConfig {
            credentials_file: FIXTURE_PATH.to_string(),
            spreadsheet_name: "Test".to_string(),
            spreadsheet_id: None,
            worksheet_name: "Participants".to_string(),
            sheets_api_url: base.to_string(),
            drive_api_url: base.to_string(),
            token_url: Some(format!("{base}/token")),
            http_timeout_secs: 5,
        }
    }

    fn participants_sheet() -> Value {
        json!({
            "range": "Participants!A1:C7",
            "majorDimension": "ROWS",
            "values": [
                ["Name", "Tickets", "Email"],
                ["Ana", 3, "ana@example.com"],
                ["Ben", "2"],
                ["Cy", "lots"],
                ["", 5],
                ["Dee", -1],
                ["Eve", 2.9]
            ]
        })
    }

    #[tokio::test]
    async fn fetches_roster_by_spreadsheet_name() {
        let fake = FakeGoogle::with_rows(participants_sheet());
        let token_calls = fake.token_calls.clone();
        let base = spawn_fake(fake).await;

        let source = GoogleSheetSource::new(sheet_config(&base)).unwrap();
        let roster = source.fetch().await.unwrap();

        assert_eq!(
            roster,
            vec![
                Participant::new("Ana", 3),
                Participant::new("Ben", 2),
                Participant::new("Cy", 0),
                Participant::new("Dee", 0),
                Participant::new("Eve", 2),
            ]
        );
        assert_eq!(token_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn access_token_is_reused_but_roster_is_refetched() {
        let fake = FakeGoogle::with_rows(participants_sheet());
        let token_calls = fake.token_calls.clone();
        let drive_calls = fake.drive_calls.clone();
        let base = spawn_fake(fake).await;

        let source = GoogleSheetSource::new(sheet_config(&base)).unwrap();
        source.fetch().await.unwrap();
        source.fetch().await.unwrap();

        assert_eq!(token_calls.load(Ordering::SeqCst), 1);
        assert_eq!(drive_calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.tokens.len(), 1);
    }

    #[tokio::test]
    async fn token_inside_refresh_margin_is_replaced() {
        let mut fake = FakeGoogle::with_rows(participants_sheet());
        fake.token_expires_in = TOKEN_REFRESH_MARGIN_SECS / 2;
        let token_calls = fake.token_calls.clone();
        let base = spawn_fake(fake).await;

        let source = GoogleSheetSource::new(sheet_config(&base)).unwrap();
        source.fetch().await.unwrap();
        source.fetch().await.unwrap();

        assert_eq!(token_calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.tokens.len(), 1);
    }

    #[tokio::test]
    async fn configured_id_skips_drive_lookup() {
        let fake = FakeGoogle::with_rows(participants_sheet());
        let drive_calls = fake.drive_calls.clone();
        let base = spawn_fake(fake).await;

        let mut cfg = sheet_config(&base);
        cfg.spreadsheet_id = Some(SHEET_ID.to_string());
        let roster = GoogleSheetSource::new(cfg).unwrap().fetch().await.unwrap();

        assert_eq!(roster.len(), 5);
        assert_eq!(drive_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_spreadsheet_name() {
        let base = spawn_fake(FakeGoogle::with_rows(participants_sheet())).await;
        let mut cfg = sheet_config(&base);
        cfg.spreadsheet_name = "Nope".to_string();

        let err = GoogleSheetSource::new(cfg).unwrap().fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::SpreadsheetNotFound(ref n) if n == "Nope"));
    }

    #[tokio::test]
    async fn unknown_worksheet_is_an_upstream_error() {
        let base = spawn_fake(FakeGoogle::with_rows(participants_sheet())).await;
        let mut cfg = sheet_config(&base);
        cfg.worksheet_name = "Sheet1".to_string();

        let err = GoogleSheetSource::new(cfg).unwrap().fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Upstream { status: 404, .. }));
    }

    #[tokio::test]
    async fn upstream_failure_status_is_reported() {
        let mut fake = FakeGoogle::with_rows(json!({ "error": { "code": 503 } }));
        fake.values_status = StatusCode::SERVICE_UNAVAILABLE;
        let base = spawn_fake(fake).await;

        let err = GoogleSheetSource::new(sheet_config(&base))
            .unwrap()
            .fetch()
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Upstream { status: 503, .. }));
    }

    #[tokio::test]
    async fn empty_worksheet_is_an_empty_roster() {
        let base = spawn_fake(FakeGoogle::with_rows(json!({ "range": "Participants!A1:Z1000" }))).await;
        let roster = GoogleSheetSource::new(sheet_config(&base))
            .unwrap()
            .fetch()
            .await
            .unwrap();
        assert!(roster.is_empty());
    }

    #[tokio::test]
    async fn missing_credentials_file() {
        let base = spawn_fake(FakeGoogle::with_rows(participants_sheet())).await;
        let mut cfg = sheet_config(&base);
        cfg.credentials_file = "/nonexistent/key.json".to_string();

        let err = GoogleSheetSource::new(cfg).unwrap().fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Credentials(_)));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_an_http_error() {
        // Nothing listens on the discard port.
        let cfg = sheet_config("http://127.0.0.1:9");
        let err = GoogleSheetSource::new(cfg).unwrap().fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Http(_)));
    }

    #[test]
    fn drive_query_literal_is_escaped() {
        assert_eq!(escape_query_literal("Bob's sheet"), "Bob\\'s sheet");
        assert_eq!(escape_query_literal("a\\b"), "a\\\\b");
    }
}
