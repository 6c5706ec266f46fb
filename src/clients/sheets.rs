//! Spreadsheet (Google Sheets) wrapper: values read/write over REST.
//!
//! Authentication uses OAuth2 user-consent tokens cached locally in Google's
//! `authorized_user` JSON shape. The interactive consent flow happens once,
//! out of process; this client owns only the refresh path — when the cached
//! access token is expired it posts the refresh token to the token endpoint
//! and rewrites the cache file. A missing cache is an explicit
//! [`ClientError::MissingToken`], not a silent re-consent.
//!
//! Value semantics follow the spreadsheet model: every cell travels as a
//! string, an empty cell reads back as JSON null, and writes overwrite the
//! addressed range in place.

use crate::error::ClientError;
use crate::table::Table;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Clock skew subtracted from the recorded expiry before deciding a token is
/// still usable.
const EXPIRY_SLACK_SECS: i64 = 60;

/// A locally cached `authorized_user` token, as written by Google's client
/// libraries after the consent flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    /// The short-lived access token; absent right after consent.
    #[serde(default)]
    pub token: Option<String>,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl CachedToken {
    /// Load the cache file, distinguishing "no consent yet" from I/O noise.
    pub fn load(path: &Path) -> Result<Self, ClientError> {
        if !path.exists() {
            return Err(ClientError::MissingToken {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ClientError::CredentialIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|e| ClientError::MalformedResponse {
            platform: "sheets".into(),
            detail: format!("token cache {}: {e}", path.display()),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ClientError> {
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| ClientError::Internal(e.to_string()))?;
        std::fs::write(path, raw).map_err(|source| ClientError::CredentialIo {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Whether the access token needs refreshing at time `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expiry) {
            (None, _) => true,
            (_, None) => true,
            (_, Some(expiry)) => expiry - Duration::seconds(EXPIRY_SLACK_SECS) <= now,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: i64,
}

/// Authenticated spreadsheet client bound to one spreadsheet.
pub struct SheetsClient {
    http: reqwest::Client,
    spreadsheet_id: String,
    worksheet: Option<String>,
    access_token: String,
}

impl SheetsClient {
    /// Build a client for `spreadsheet_id`, loading (and refreshing if
    /// necessary) the token cached at `token_path`.
    pub async fn connect(
        spreadsheet_id: impl Into<String>,
        token_path: impl Into<PathBuf>,
        worksheet: Option<String>,
    ) -> Result<Self, ClientError> {
        let token_path = token_path.into();
        let http = reqwest::Client::new();
        let mut cached = CachedToken::load(&token_path)?;

        if cached.is_expired(Utc::now()) {
            debug!("Cached access token expired; refreshing");
            let response = http
                .post(&cached.token_uri)
                .form(&[
                    ("client_id", cached.client_id.as_str()),
                    ("client_secret", cached.client_secret.as_str()),
                    ("refresh_token", cached.refresh_token.as_str()),
                    ("grant_type", "refresh_token"),
                ])
                .send()
                .await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            if status >= 400 {
                return Err(ClientError::from_status("sheets", status, body));
            }
            let refreshed: RefreshResponse =
                serde_json::from_str(&body).map_err(|e| ClientError::MalformedResponse {
                    platform: "sheets".into(),
                    detail: e.to_string(),
                })?;

            cached.token = Some(refreshed.access_token);
            cached.expiry = Some(Utc::now() + Duration::seconds(refreshed.expires_in));
            cached.save(&token_path)?;
            info!("Access token refreshed and cache rewritten");
        }

        let access_token = cached
            .token
            .clone()
            .ok_or_else(|| ClientError::Internal("refresh produced no access token".into()))?;

        Ok(Self {
            http,
            spreadsheet_id: spreadsheet_id.into(),
            worksheet,
            access_token,
        })
    }

    /// Switch the worksheet subsequent value operations address.
    pub fn set_worksheet(&mut self, name: impl Into<String>) {
        self.worksheet = Some(name.into());
    }

    fn worksheet(&self) -> Result<&str, ClientError> {
        self.worksheet
            .as_deref()
            .ok_or_else(|| ClientError::InvalidInput("no worksheet selected".into()))
    }

    async fn get_json(&self, url: String) -> Result<Value, ClientError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        if status >= 400 {
            return Err(ClientError::from_status("sheets", status, body));
        }
        serde_json::from_str(&body).map_err(|e| ClientError::MalformedResponse {
            platform: "sheets".into(),
            detail: e.to_string(),
        })
    }

    /// Titles of the worksheets in the spreadsheet.
    pub async fn worksheet_titles(&self) -> Result<Vec<String>, ClientError> {
        let json = self
            .get_json(format!(
                "{SHEETS_BASE}/{}?fields=sheets.properties.title",
                self.spreadsheet_id
            ))
            .await?;
        Ok(json
            .get("sheets")
            .and_then(Value::as_array)
            .map(|sheets| {
                sheets
                    .iter()
                    .filter_map(|s| {
                        s.pointer("/properties/title")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Read the worksheet into a [`Table`]: first row as headers, short rows
    /// padded, empty cells as null.
    pub async fn read_records(&self) -> Result<Table, ClientError> {
        let sheet = self.worksheet()?;
        let json = self
            .get_json(format!(
                "{SHEETS_BASE}/{}/values/{}",
                self.spreadsheet_id, sheet
            ))
            .await?;

        let values = json
            .get("values")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        values_to_table(&values)
    }

    /// Overwrite the worksheet (from A1) with the table's headers and rows.
    ///
    /// Cells already holding values inside the written range are replaced.
    pub async fn write_table(&self, table: &Table) -> Result<(), ClientError> {
        let sheet = self.worksheet()?;
        let values = table_to_values(table);

        let response = self
            .http
            .put(format!(
                "{SHEETS_BASE}/{}/values/{}!A1?valueInputOption=RAW",
                self.spreadsheet_id, sheet
            ))
            .bearer_auth(&self.access_token)
            .json(&json!({ "values": values }))
            .send()
            .await?;
        let status = response.status().as_u16();
        if status >= 400 {
            let body = response.text().await?;
            return Err(ClientError::from_status("sheets", status, body));
        }
        Ok(())
    }

    /// Append one record to the existing rows, matching columns by header.
    pub async fn append_record(
        &self,
        record: &HashMap<String, Value>,
    ) -> Result<(), ClientError> {
        let mut current = self.read_records().await?;

        if current.columns().is_empty() {
            let mut columns: Vec<String> = record.keys().cloned().collect();
            columns.sort();
            current = Table::with_columns(columns);
        }

        let columns = current.columns().to_vec();
        let row = columns
            .iter()
            .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
            .collect();
        current.push_row(row)?;

        self.write_table(&current).await
    }

    /// Append many records, optionally dropping duplicate keys keeping the
    /// last occurrence (so re-uploads replace rather than double rows).
    pub async fn append_records(
        &self,
        records: &Table,
        dedup_keys: Option<&[&str]>,
    ) -> Result<(), ClientError> {
        let mut current = self.read_records().await?;

        if current.columns().is_empty() {
            current = Table::with_columns(records.columns().to_vec());
        }

        let aligned = align_columns(records, current.columns())?;
        current.concat(aligned)?;

        if let Some(keys) = dedup_keys {
            current.dedup_keep_last(keys)?;
        }

        self.write_table(&current).await
    }

    /// Update every row whose columns equal `matcher`, setting the columns
    /// in `new_values`, then write the sheet back.
    pub async fn update_matching(
        &self,
        matcher: &HashMap<String, Value>,
        new_values: &HashMap<String, Value>,
    ) -> Result<usize, ClientError> {
        let current = self.read_records().await?;

        let match_indices: Vec<(usize, &Value)> = matcher
            .iter()
            .map(|(col, v)| {
                current
                    .column_index(col)
                    .map(|i| (i, v))
                    .ok_or_else(|| ClientError::InvalidInput(format!("no column '{col}'")))
            })
            .collect::<Result<_, _>>()?;
        let set_indices: Vec<(usize, &Value)> = new_values
            .iter()
            .map(|(col, v)| {
                current
                    .column_index(col)
                    .map(|i| (i, v))
                    .ok_or_else(|| ClientError::InvalidInput(format!("no column '{col}'")))
            })
            .collect::<Result<_, _>>()?;

        let mut updated = Table::with_columns(current.columns().to_vec());
        let mut touched = 0;
        for row in current.rows() {
            let mut row = row.clone();
            if match_indices.iter().all(|(i, v)| row[*i] == **v) {
                for (i, v) in &set_indices {
                    row[*i] = (*v).clone();
                }
                touched += 1;
            }
            updated.push_row(row)?;
        }

        self.write_table(&updated).await?;
        Ok(touched)
    }
}

/// Reorder `table`'s columns to `target` order; the column sets must match.
fn align_columns(table: &Table, target: &[String]) -> Result<Table, ClientError> {
    if table.columns() == target {
        return Ok(table.clone());
    }

    let indices: Vec<usize> = target
        .iter()
        .map(|c| {
            table
                .column_index(c)
                .ok_or_else(|| ClientError::InvalidInput(format!("record set lacks column '{c}'")))
        })
        .collect::<Result<_, _>>()?;
    if table.columns().len() != target.len() {
        return Err(ClientError::InvalidInput(format!(
            "column sets differ: {:?} vs {:?}",
            table.columns(),
            target
        )));
    }

    let mut aligned = Table::with_columns(target.to_vec());
    for row in table.rows() {
        aligned.push_row(indices.iter().map(|&i| row[i].clone()).collect())?;
    }
    Ok(aligned)
}

/// First row as headers, the rest as data; short rows padded with null,
/// empty strings mapped to null.
fn values_to_table(values: &[Value]) -> Result<Table, ClientError> {
    let Some(header) = values.first().and_then(Value::as_array) else {
        return Ok(Table::default());
    };
    let columns: Vec<String> = header
        .iter()
        .map(|v| v.as_str().unwrap_or_default().to_string())
        .collect();

    let mut table = Table::with_columns(columns.clone());
    for row in &values[1..] {
        let cells = row.as_array().cloned().unwrap_or_default();
        let mut out = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            out.push(match cells.get(i) {
                Some(Value::String(s)) if s.is_empty() => Value::Null,
                Some(v) => v.clone(),
                None => Value::Null,
            });
        }
        table.push_row(out)?;
    }
    Ok(table)
}

/// Header + rows as the API's string matrix; null becomes the empty cell.
fn table_to_values(table: &Table) -> Vec<Vec<String>> {
    let mut values = vec![table.columns().to_vec()];
    for row in table.rows() {
        values.push(row.iter().map(cell_text).collect());
    }
    values
}

fn cell_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token(expiry: Option<DateTime<Utc>>, access: Option<&str>) -> CachedToken {
        CachedToken {
            token: access.map(str::to_string),
            refresh_token: "1//refresh".into(),
            token_uri: DEFAULT_TOKEN_URI.into(),
            client_id: "client".into(),
            client_secret: "secret".into(),
            scopes: Some(vec!["https://www.googleapis.com/auth/spreadsheets".into()]),
            expiry,
        }
    }

    #[test]
    fn token_without_access_token_is_expired() {
        assert!(token(None, None).is_expired(Utc::now()));
    }

    #[test]
    fn token_expiry_honours_slack() {
        let now = Utc::now();
        // Expires in 30s: inside the 60s slack window, counts as expired.
        assert!(token(Some(now + Duration::seconds(30)), Some("ya29")).is_expired(now));
        // Expires in 10 minutes: fine.
        assert!(!token(Some(now + Duration::minutes(10)), Some("ya29")).is_expired(now));
    }

    #[test]
    fn token_cache_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let original = token(Some(Utc::now() + Duration::minutes(50)), Some("ya29.abc"));
        original.save(&path).unwrap();

        let loaded = CachedToken::load(&path).unwrap();
        assert_eq!(loaded.token.as_deref(), Some("ya29.abc"));
        assert_eq!(loaded.refresh_token, "1//refresh");
    }

    #[test]
    fn missing_cache_is_missing_token() {
        let err = CachedToken::load(Path::new("/nonexistent/token.json")).unwrap_err();
        assert!(matches!(err, ClientError::MissingToken { .. }));
    }

    #[test]
    fn values_round_trip_with_null_for_empty_cells() {
        let values = vec![
            json!(["name", "rfc", "estado"]),
            json!(["ACME", "", "CDMX"]),
            json!(["Norte SA"]),
        ];
        let table = values_to_table(&values).unwrap();
        assert_eq!(table.get(0, "rfc"), Some(&Value::Null));
        assert_eq!(table.get(1, "estado"), Some(&Value::Null)); // padded

        let back = table_to_values(&table);
        assert_eq!(back[0], vec!["name", "rfc", "estado"]);
        assert_eq!(back[1], vec!["ACME", "", "CDMX"]);
    }

    #[test]
    fn align_columns_reorders_and_rejects_mismatch() {
        let t = Table::new(
            vec!["b".into(), "a".into()],
            vec![vec![json!(2), json!(1)]],
        )
        .unwrap();
        let aligned = align_columns(&t, &["a".into(), "b".into()]).unwrap();
        assert_eq!(aligned.get(0, "a"), Some(&json!(1)));

        let err = align_columns(&t, &["a".into(), "c".into()]).unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
    }
}
