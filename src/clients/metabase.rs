//! BI (Metabase) wrapper: native-SQL queries and database metadata.
//!
//! The server truncates every query result at 2000 rows with no server-side
//! cursor, so [`MetabaseClient::query_paginated`] re-issues the query with a
//! shifted numeric cursor spliced into caller-provided placeholder comments
//! until a short page signals exhaustion. That loop is the only repetition
//! in this crate's wrappers — it is a workaround for a hard server limit,
//! not a generalized backpressure mechanism.

use crate::error::ClientError;
use crate::table::Table;
use serde_json::{json, Value};
use std::future::Future;
use tracing::{debug, info};

/// Server-side hard cap on rows per result set.
const PAGE_LIMIT: usize = 2000;

/// Placeholder comment the caller's SQL must contain where the cursor
/// `where` clause is spliced in.
pub const WHERE_PLACEHOLDER: &str = "--insert_where_clause_here";
/// Placeholder comment for the cursor `order by` clause.
pub const ORDER_BY_PLACEHOLDER: &str = "--insert_order_by_clause_here";

/// How the client authenticates.
#[derive(Debug, Clone)]
pub enum MetabaseAuth {
    /// A server-issued API key, sent as `x-api-key`.
    ApiKey(String),
    /// A pre-established session token, sent as `X-Metabase-Session`.
    SessionToken(String),
    /// Username/password: a session is created once at construction.
    Login { username: String, password: String },
}

/// Authenticated BI client.
pub struct MetabaseClient {
    http: reqwest::Client,
    domain: String,
    header_name: &'static str,
    header_value: String,
}

impl MetabaseClient {
    /// Build a client for the Metabase instance at `domain`
    /// (e.g. `https://bi.example.com`), establishing a session if needed.
    pub async fn connect(domain: impl Into<String>, auth: MetabaseAuth) -> Result<Self, ClientError> {
        let domain = domain.into();
        let http = reqwest::Client::new();

        let (header_name, header_value) = match auth {
            MetabaseAuth::ApiKey(key) => ("x-api-key", key),
            MetabaseAuth::SessionToken(token) => ("X-Metabase-Session", token),
            MetabaseAuth::Login { username, password } => {
                let response = http
                    .post(format!("{domain}/api/session"))
                    .json(&json!({ "username": username, "password": password }))
                    .send()
                    .await?;
                let status = response.status().as_u16();
                let body = response.text().await?;
                if status >= 400 {
                    return Err(ClientError::from_status("metabase", status, body));
                }
                let json: Value =
                    serde_json::from_str(&body).map_err(|e| ClientError::MalformedResponse {
                        platform: "metabase".into(),
                        detail: e.to_string(),
                    })?;
                let token = json
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ClientError::MalformedResponse {
                        platform: "metabase".into(),
                        detail: "session response has no id".into(),
                    })?
                    .to_string();
                info!("Metabase session established");
                ("X-Metabase-Session", token)
            }
        };

        Ok(Self {
            http,
            domain,
            header_name,
            header_value,
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value, ClientError> {
        let response = self
            .http
            .get(format!("{}{}", self.domain, path))
            .header(self.header_name, &self.header_value)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        if status >= 400 {
            return Err(ClientError::from_status("metabase", status, body));
        }
        serde_json::from_str(&body).map_err(|e| ClientError::MalformedResponse {
            platform: "metabase".into(),
            detail: e.to_string(),
        })
    }

    /// Execute a native SQL query against the given database and reshape the
    /// rows/columns payload into a [`Table`] keyed by display name.
    ///
    /// A full page (exactly 2000 rows) usually means the server truncated
    /// the result — use [`MetabaseClient::query_paginated`] to drain it.
    pub async fn query(&self, sql: &str, database_id: i64) -> Result<Table, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/dataset", self.domain))
            .header(self.header_name, &self.header_value)
            .json(&json!({
                "database": database_id,
                "type": "native",
                "native": { "query": sql },
            }))
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        if status >= 400 {
            return Err(ClientError::from_status("metabase", status, body));
        }
        let json: Value =
            serde_json::from_str(&body).map_err(|e| ClientError::MalformedResponse {
                platform: "metabase".into(),
                detail: e.to_string(),
            })?;

        dataset_to_table(&json)
    }

    /// Drain a result set larger than the 2000-row cap.
    ///
    /// `sql` must contain [`WHERE_PLACEHOLDER`] and [`ORDER_BY_PLACEHOLDER`]
    /// where the cursor clauses belong, and `cursor_col` must name a unique
    /// numeric column of the result. Pages are fetched in ascending cursor
    /// order starting above `min_value` and concatenated.
    pub async fn query_paginated(
        &self,
        sql: &str,
        cursor_col: &str,
        min_value: f64,
        database_id: i64,
    ) -> Result<Table, ClientError> {
        paginate(sql, cursor_col, min_value, |page_sql| async move {
            self.query(&page_sql, database_id).await
        })
        .await
    }

    /// Find a database id by display name.
    pub async fn database_id(&self, database_name: &str) -> Result<Option<i64>, ClientError> {
        let json = self.get_json("/api/database").await?;
        let list = json
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::MalformedResponse {
                platform: "metabase".into(),
                detail: "database list has no data array".into(),
            })?;

        Ok(list.iter().find_map(|db| {
            (db.get("name").and_then(Value::as_str) == Some(database_name))
                .then(|| db.get("id").and_then(Value::as_i64))
                .flatten()
        }))
    }

    async fn database_metadata(&self, database_id: i64) -> Result<Value, ClientError> {
        self.get_json(&format!("/api/database/{database_id}/metadata"))
            .await
    }

    /// Names of the tables available in a database.
    pub async fn tables_in_database(&self, database_id: i64) -> Result<Vec<String>, ClientError> {
        let metadata = self.database_metadata(database_id).await?;
        Ok(metadata
            .get("tables")
            .and_then(Value::as_array)
            .map(|tables| {
                tables
                    .iter()
                    .filter_map(|t| t.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Column names (and database types) of a table, or `None` when the
    /// table does not exist in the database.
    pub async fn columns_in_table(
        &self,
        table_name: &str,
        database_id: i64,
    ) -> Result<Option<Table>, ClientError> {
        let metadata = self.database_metadata(database_id).await?;
        let tables = metadata.get("tables").and_then(Value::as_array);

        let Some(fields) = tables.and_then(|ts| {
            ts.iter()
                .find(|t| t.get("name").and_then(Value::as_str) == Some(table_name))
                .and_then(|t| t.get("fields"))
                .and_then(Value::as_array)
        }) else {
            return Ok(None);
        };

        let mut table = Table::with_columns(vec!["column", "type"]);
        for field in fields {
            table.push_row(vec![
                field.get("name").cloned().unwrap_or(Value::Null),
                field.get("database_type").cloned().unwrap_or(Value::Null),
            ])?;
        }
        Ok(Some(table))
    }

    /// Numeric id of a table, or `None` when it is not in the database.
    pub async fn table_id(
        &self,
        table_name: &str,
        database_id: i64,
    ) -> Result<Option<i64>, ClientError> {
        let metadata = self.database_metadata(database_id).await?;
        Ok(metadata
            .get("tables")
            .and_then(Value::as_array)
            .and_then(|tables| {
                tables
                    .iter()
                    .find(|t| t.get("name").and_then(Value::as_str) == Some(table_name))
                    .and_then(|t| t.get("id"))
                    .and_then(Value::as_i64)
            }))
    }
}

/// Reshape a `/api/dataset` payload into a [`Table`].
fn dataset_to_table(json: &Value) -> Result<Table, ClientError> {
    let data = json
        .get("data")
        .ok_or_else(|| ClientError::MalformedResponse {
            platform: "metabase".into(),
            detail: format!(
                "dataset response has no data: {}",
                json.get("error").unwrap_or(&Value::Null)
            ),
        })?;

    let columns: Vec<String> = data
        .get("cols")
        .and_then(Value::as_array)
        .ok_or_else(|| ClientError::MalformedResponse {
            platform: "metabase".into(),
            detail: "dataset has no cols".into(),
        })?
        .iter()
        .filter_map(|c| c.get("display_name").and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    let rows: Vec<Vec<Value>> = data
        .get("rows")
        .and_then(Value::as_array)
        .ok_or_else(|| ClientError::MalformedResponse {
            platform: "metabase".into(),
            detail: "dataset has no rows".into(),
        })?
        .iter()
        .filter_map(|r| r.as_array().cloned())
        .collect();

    Table::new(columns, rows)
}

/// The cursor pagination loop, generic over the page fetch so the splice and
/// termination logic is testable without a server.
async fn paginate<F, Fut>(
    sql: &str,
    cursor_col: &str,
    min_value: f64,
    mut fetch: F,
) -> Result<Table, ClientError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Table, ClientError>>,
{
    if !sql.contains(WHERE_PLACEHOLDER) || !sql.contains(ORDER_BY_PLACEHOLDER) {
        return Err(ClientError::InvalidQuery(format!(
            "paginated queries must contain '{WHERE_PLACEHOLDER}' and '{ORDER_BY_PLACEHOLDER}'"
        )));
    }

    let mut accumulated: Option<Table> = None;
    let mut cursor = min_value;

    loop {
        let page_sql = sql
            .replace(WHERE_PLACEHOLDER, &format!("where {cursor_col} > '{cursor}'"))
            .replace(ORDER_BY_PLACEHOLDER, &format!("order by {cursor_col}"));
        let page = fetch(page_sql).await?;
        let page_len = page.len();

        if page_len > 0 {
            let idx = page.column_index(cursor_col).ok_or_else(|| {
                ClientError::InvalidQuery(format!(
                    "cursor column '{cursor_col}' is not in the result set"
                ))
            })?;
            cursor = page
                .rows()
                .iter()
                .filter_map(|r| r[idx].as_f64())
                .fold(cursor, f64::max);

            match accumulated.as_mut() {
                Some(table) => table.concat(page)?,
                None => accumulated = Some(page),
            }
        }

        debug!("Fetched page of {} rows, cursor now {}", page_len, cursor);
        if page_len < PAGE_LIMIT {
            break;
        }
    }

    Ok(accumulated.unwrap_or_default())
}
