//! CRM (Salesforce) wrapper: SOAP login, SOQL queries, record CRUD.
//!
//! Authentication happens once at construction. The username/password/token
//! path goes through the SOAP login endpoint — the only non-JSON call in
//! this crate — because it is the one flow that accepts a security token
//! without an OAuth app. Everything after login uses the REST data API with
//! the session id as a bearer token.
//!
//! Batch inserts are best-effort: per-record failures are collected into
//! [`BatchOutcome`] and the loop continues, so a thousand-row load is never
//! aborted by one bad row. Everything else is fail-fast.

use crate::error::ClientError;
use crate::table::Table;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// REST/SOAP API version the wrapper speaks.
const API_VERSION: &str = "59.0";

/// How the client authenticates.
///
/// Replaces the duck-typed "path or dict or session" constructor argument
/// with an explicit sum type.
#[derive(Debug, Clone)]
pub enum SalesforceCredentials {
    /// Path to a JSON file with `username`, `password`, `security_token`
    /// and `domain` keys.
    Path(PathBuf),
    /// The same four values supplied inline (useful when credentials come
    /// from a secrets manager rather than disk).
    Inline {
        username: String,
        password: String,
        security_token: String,
        domain: String,
    },
    /// A session established elsewhere: no login call is made.
    Session { session_id: String, instance: String },
}

#[derive(Debug, Deserialize)]
struct LoginFile {
    username: String,
    password: String,
    security_token: String,
    domain: String,
}

/// One failed record in a bulk operation.
#[derive(Debug, Clone)]
pub struct BatchError {
    /// Index of the record in the submitted batch.
    pub index: usize,
    pub message: String,
}

/// Result of a best-effort bulk insert: ids that were created plus the
/// failures that were skipped over.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub created_ids: Vec<String>,
    pub errors: Vec<BatchError>,
}

/// Authenticated CRM client.
pub struct SalesforceClient {
    http: reqwest::Client,
    session_id: String,
    instance: String,
}

static RE_SESSION_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<sessionId>([^<]+)</sessionId>").unwrap());
static RE_SERVER_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<serverUrl>([^<]+)</serverUrl>").unwrap());
static RE_SOAP_FAULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<faultstring>([^<]+)</faultstring>").unwrap());

/// Minimal XML text escaping for the SOAP login body.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Pull the session id and instance host out of a SOAP login response.
fn parse_login_response(xml: &str) -> Result<(String, String), ClientError> {
    if let Some(caps) = RE_SOAP_FAULT.captures(xml) {
        return Err(ClientError::RemoteApi {
            status: 500,
            body: caps[1].to_string(),
        });
    }

    let session_id = RE_SESSION_ID
        .captures(xml)
        .map(|c| c[1].to_string())
        .ok_or_else(|| ClientError::MalformedResponse {
            platform: "salesforce".into(),
            detail: "login response has no sessionId".into(),
        })?;

    let server_url = RE_SERVER_URL
        .captures(xml)
        .map(|c| c[1].to_string())
        .ok_or_else(|| ClientError::MalformedResponse {
            platform: "salesforce".into(),
            detail: "login response has no serverUrl".into(),
        })?;

    // serverUrl looks like https://na139.salesforce.com/services/Soap/u/59.0/00D...
    let instance = server_url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string();

    if instance.is_empty() {
        return Err(ClientError::MalformedResponse {
            platform: "salesforce".into(),
            detail: format!("cannot derive instance from serverUrl '{server_url}'"),
        });
    }

    Ok((session_id, instance))
}

/// Reshape query records into a table, dropping the per-record `attributes`
/// envelope the API wraps around every row.
fn records_to_table(records: &[Value]) -> Result<Table, ClientError> {
    let first = match records.first() {
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(ClientError::MalformedResponse {
                platform: "salesforce".into(),
                detail: format!("record is not an object: {other}"),
            })
        }
        None => return Ok(Table::default()),
    };

    let columns: Vec<String> = first
        .keys()
        .filter(|k| k.as_str() != "attributes")
        .cloned()
        .collect();

    let mut table = Table::with_columns(columns.clone());
    for record in records {
        let obj = record.as_object().ok_or_else(|| ClientError::MalformedResponse {
            platform: "salesforce".into(),
            detail: "record is not an object".into(),
        })?;
        let row = columns
            .iter()
            .map(|c| obj.get(c).cloned().unwrap_or(Value::Null))
            .collect();
        table.push_row(row)?;
    }
    Ok(table)
}

impl SalesforceClient {
    /// Authenticate and build a client.
    ///
    /// For the path/inline variants this performs the SOAP login once; the
    /// session variant makes no network call.
    pub async fn connect(credentials: SalesforceCredentials) -> Result<Self, ClientError> {
        let http = reqwest::Client::new();

        let (session_id, instance) = match credentials {
            SalesforceCredentials::Session {
                session_id,
                instance,
            } => (session_id, instance),
            SalesforceCredentials::Path(path) => {
                let raw = std::fs::read_to_string(&path)
                    .map_err(|source| ClientError::CredentialIo {
                        path: path.clone(),
                        source,
                    })?;
                let info: LoginFile =
                    serde_json::from_str(&raw).map_err(|e| ClientError::MalformedResponse {
                        platform: "salesforce".into(),
                        detail: format!("credential file {}: {e}", path.display()),
                    })?;
                Self::soap_login(
                    &http,
                    &info.username,
                    &info.password,
                    &info.security_token,
                    &info.domain,
                )
                .await?
            }
            SalesforceCredentials::Inline {
                username,
                password,
                security_token,
                domain,
            } => Self::soap_login(&http, &username, &password, &security_token, &domain).await?,
        };

        info!("Salesforce session established on {}", instance);
        Ok(Self {
            http,
            session_id,
            instance,
        })
    }

    async fn soap_login(
        http: &reqwest::Client,
        username: &str,
        password: &str,
        security_token: &str,
        domain: &str,
    ) -> Result<(String, String), ClientError> {
        let url = format!("https://{domain}.salesforce.com/services/Soap/u/{API_VERSION}");
        let body = format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<env:Envelope xmlns:xsd="http://www.w3.org/2001/XMLSchema"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
    xmlns:env="http://schemas.xmlsoap.org/soap/envelope/"
    xmlns:urn="urn:partner.soap.sforce.com">
  <env:Header>
    <urn:CallOptions><urn:client>conecta</urn:client></urn:CallOptions>
  </env:Header>
  <env:Body>
    <n1:login xmlns:n1="urn:partner.soap.sforce.com">
      <n1:username>{}</n1:username>
      <n1:password>{}{}</n1:password>
    </n1:login>
  </env:Body>
</env:Envelope>"#,
            xml_escape(username),
            xml_escape(password),
            xml_escape(security_token),
        );

        let response = http
            .post(&url)
            .header("Content-Type", "text/xml; charset=UTF-8")
            .header("SOAPAction", "login")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        if status >= 400 && !text.contains("<faultstring>") {
            return Err(ClientError::from_status("salesforce", status, text));
        }
        parse_login_response(&text)
    }

    fn data_base(&self) -> String {
        format!("https://{}/services/data/v{API_VERSION}", self.instance)
    }

    async fn check(&self, response: reqwest::Response) -> Result<Value, ClientError> {
        let status = response.status().as_u16();
        let text = response.text().await?;
        if status >= 400 {
            return Err(ClientError::from_status("salesforce", status, text));
        }
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ClientError::MalformedResponse {
            platform: "salesforce".into(),
            detail: e.to_string(),
        })
    }

    /// Run a SOQL query, following `nextRecordsUrl` until the result set is
    /// complete, and reshape the records into a table.
    pub async fn query(&self, soql: &str) -> Result<Table, ClientError> {
        let mut records: Vec<Value> = Vec::new();

        let mut json = self
            .check(
                self.http
                    .get(format!("{}/query", self.data_base()))
                    .query(&[("q", soql)])
                    .bearer_auth(&self.session_id)
                    .send()
                    .await?,
            )
            .await?;

        loop {
            if let Some(Value::Array(batch)) = json.get("records").cloned() {
                records.extend(batch);
            }
            match (json.get("done").and_then(Value::as_bool), json.get("nextRecordsUrl")) {
                (Some(false), Some(Value::String(next))) => {
                    debug!("Following nextRecordsUrl ({} records so far)", records.len());
                    json = self
                        .check(
                            self.http
                                .get(format!("https://{}{}", self.instance, next))
                                .bearer_auth(&self.session_id)
                                .send()
                                .await?,
                        )
                        .await?;
                }
                _ => break,
            }
        }

        records_to_table(&records)
    }

    /// Create one record; returns the new record id.
    pub async fn insert(
        &self,
        object_type: &str,
        data: &Map<String, Value>,
    ) -> Result<String, ClientError> {
        let json = self
            .check(
                self.http
                    .post(format!("{}/sobjects/{object_type}/", self.data_base()))
                    .bearer_auth(&self.session_id)
                    .json(data)
                    .send()
                    .await?,
            )
            .await?;

        json.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::MalformedResponse {
                platform: "salesforce".into(),
                detail: format!("create response has no id: {json}"),
            })
    }

    /// Best-effort bulk insert: failures are collected, not raised, and the
    /// remaining records still go through.
    pub async fn insert_all(
        &self,
        object_type: &str,
        rows: &[Map<String, Value>],
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (index, row) in rows.iter().enumerate() {
            match self.insert(object_type, row).await {
                Ok(id) => outcome.created_ids.push(id),
                Err(e) => {
                    warn!("Record {} failed: {}", index, e);
                    outcome.errors.push(BatchError {
                        index,
                        message: e.to_string(),
                    });
                }
            }
        }
        outcome
    }

    /// Update fields on an existing record.
    pub async fn update(
        &self,
        object_type: &str,
        record_id: &str,
        data: &Map<String, Value>,
    ) -> Result<(), ClientError> {
        self.check(
            self.http
                .patch(format!(
                    "{}/sobjects/{object_type}/{record_id}",
                    self.data_base()
                ))
                .bearer_auth(&self.session_id)
                .json(data)
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    /// Delete a record. Deleted records are not trivially recoverable;
    /// callers gate this behind their own confirmation.
    pub async fn delete(&self, object_type: &str, record_id: &str) -> Result<(), ClientError> {
        self.check(
            self.http
                .delete(format!(
                    "{}/sobjects/{object_type}/{record_id}",
                    self.data_base()
                ))
                .bearer_auth(&self.session_id)
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn describe(&self, object_type: &str) -> Result<Value, ClientError> {
        self.check(
            self.http
                .get(format!(
                    "{}/sobjects/{object_type}/describe",
                    self.data_base()
                ))
                .bearer_auth(&self.session_id)
                .send()
                .await?,
        )
        .await
    }

    /// The queryable fields of an object type as a (name, label, type) table.
    pub async fn describe_fields(&self, object_type: &str) -> Result<Table, ClientError> {
        let json = self.describe(object_type).await?;
        let fields = json
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::MalformedResponse {
                platform: "salesforce".into(),
                detail: "describe response has no fields array".into(),
            })?;

        let mut table = Table::with_columns(vec!["name", "label", "type"]);
        for field in fields {
            table.push_row(vec![
                field.get("name").cloned().unwrap_or(Value::Null),
                field.get("label").cloned().unwrap_or(Value::Null),
                field.get("type").cloned().unwrap_or(Value::Null),
            ])?;
        }
        Ok(table)
    }

    /// The available picklist labels of a field, or `None` when the object
    /// has no field with that name.
    pub async fn picklist_values(
        &self,
        object_type: &str,
        field_name: &str,
    ) -> Result<Option<Vec<String>>, ClientError> {
        let json = self.describe(object_type).await?;
        let fields = json
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::MalformedResponse {
                platform: "salesforce".into(),
                detail: "describe response has no fields array".into(),
            })?;

        let Some(field) = fields
            .iter()
            .find(|f| f.get("name").and_then(Value::as_str) == Some(field_name))
        else {
            return Ok(None);
        };

        let labels = field
            .get("picklistValues")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.get("label").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Some(labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LOGIN_OK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope><soapenv:Body><loginResponse><result>
<serverUrl>https://na139.salesforce.com/services/Soap/u/59.0/00D8c000002Kxyz</serverUrl>
<sessionId>00D8c000002Kxyz!AQoAQPE.example.token</sessionId>
</result></loginResponse></soapenv:Body></soapenv:Envelope>"#;

    #[test]
    fn parses_session_and_instance_from_login() {
        let (session, instance) = parse_login_response(LOGIN_OK).unwrap();
        assert_eq!(session, "00D8c000002Kxyz!AQoAQPE.example.token");
        assert_eq!(instance, "na139.salesforce.com");
    }

    #[test]
    fn login_fault_surfaces_as_remote_api() {
        let xml = "<soapenv:Fault><faultstring>INVALID_LOGIN: Invalid username</faultstring></soapenv:Fault>";
        let err = parse_login_response(xml).unwrap_err();
        match err {
            ClientError::RemoteApi { body, .. } => assert!(body.contains("INVALID_LOGIN")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn login_without_session_id_is_malformed() {
        let err = parse_login_response("<xml></xml>").unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse { .. }));
    }

    #[test]
    fn records_drop_attributes_envelope() {
        let records = vec![
            json!({
                "attributes": {"type": "Account", "url": "/services/data/..."},
                "Id": "001xx0001",
                "Name": "ACME"
            }),
            json!({
                "attributes": {"type": "Account", "url": "/services/data/..."},
                "Id": "001xx0002",
                "Name": "Norte SA"
            }),
        ];
        let table = records_to_table(&records).unwrap();
        assert!(table.column_index("attributes").is_none());
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1, "Name"), Some(&json!("Norte SA")));
    }

    #[test]
    fn empty_record_set_is_empty_table() {
        let table = records_to_table(&[]).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn xml_escape_covers_soap_specials() {
        assert_eq!(xml_escape("a&b<c>'d\""), "a&amp;b&lt;c&gt;&apos;d&quot;");
    }
}
