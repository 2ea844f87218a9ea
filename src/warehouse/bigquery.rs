use std::thread::sleep;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, NaiveTime, Timelike, Utc};
use log::{debug, info};
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::TokenSource;
use crate::constants::QUERY_TIMEOUT_MS;
use crate::error::{RelayError, Result};
use crate::warehouse::{ResultSet, Warehouse};

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Field {
    name: String,
    #[serde(rename = "type", default)]
    field_type: String,
}

#[derive(Debug, Deserialize)]
struct Schema {
    #[serde(default)]
    fields: Vec<Field>,
}

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(default)]
    f: Vec<Cell>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    #[serde(default)]
    v: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Shared shape of `jobs.query` and `jobs.getQueryResults` responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPage {
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    job_reference: Option<JobReference>,
    #[serde(default)]
    schema: Option<Schema>,
    #[serde(default)]
    rows: Vec<Row>,
    #[serde(default)]
    page_token: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

/// Render one cell the way it should appear in a text export.
///
/// The REST API sends every scalar as a string; `field_type` decides how
/// that string is presented. Temporal values use `YYYY-MM-DD HH:MM:SS`
/// with a six-digit fraction only when it is nonzero, timestamps carry an
/// explicit `+00:00`, booleans are `True`/`False` and floats use the
/// shortest round-trip form. Other types pass through unchanged.
fn cell_to_text(field_type: &str, value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(format_scalar(field_type, s)),
        Value::Bool(b) => Some(format_scalar(field_type, b.to_string())),
        Value::Number(n) => Some(format_scalar(field_type, n.to_string())),
        // RECORD and REPEATED columns keep their structure as compact JSON
        other => Some(other.to_string()),
    }
}

fn format_scalar(field_type: &str, raw: String) -> String {
    let formatted = match field_type {
        "TIMESTAMP" => format_timestamp(&raw),
        "DATETIME" => NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|dt| with_micros(dt.format("%Y-%m-%d %H:%M:%S").to_string(), dt.nanosecond())),
        "TIME" => NaiveTime::parse_from_str(&raw, "%H:%M:%S%.f")
            .ok()
            .map(|t| with_micros(t.format("%H:%M:%S").to_string(), t.nanosecond())),
        "BOOLEAN" | "BOOL" => match raw.as_str() {
            "true" => Some("True".to_string()),
            "false" => Some("False".to_string()),
            _ => None,
        },
        "FLOAT" | "FLOAT64" => raw.parse::<f64>().ok().map(format_float),
        _ => None,
    };
    formatted.unwrap_or(raw)
}

/// Timestamps arrive as floating-point seconds since the epoch.
fn format_timestamp(raw: &str) -> Option<String> {
    let seconds: f64 = raw.parse().ok()?;
    if !seconds.is_finite() {
        return None;
    }
    let micros = (seconds * 1_000_000.0).round() as i64;
    let dt = DateTime::<Utc>::from_timestamp_micros(micros)?;
    let base = with_micros(dt.format("%Y-%m-%d %H:%M:%S").to_string(), dt.nanosecond());
    Some(format!("{}+00:00", base))
}

fn with_micros(base: String, nanos: u32) -> String {
    let micros = (nanos % 1_000_000_000) / 1_000;
    if micros == 0 {
        base
    } else {
        format!("{}.{:06}", base, micros)
    }
}

/// Shortest round-trip rendering, positional between 1e-4 and 1e16 and
/// scientific with a signed two-digit exponent outside that range.
fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{:e}", value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if value == 0.0 || (-4..16).contains(&exponent) {
        let positional = value.to_string();
        if positional.contains('.') {
            positional
        } else {
            format!("{}.0", positional)
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

/// Blocking client for the warehouse REST API.
pub struct BigQueryClient {
    client: Client,
    base_url: String,
    project_id: String,
    tokens: Box<dyn TokenSource>,
    poll_interval: Duration,
}

impl BigQueryClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        tokens: Box<dyn TokenSource>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            tokens,
            poll_interval: Duration::from_millis(crate::constants::QUERY_POLL_INTERVAL_MS),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn send(&self, request: RequestBuilder, token: &str) -> Result<QueryPage> {
        let response = request
            .bearer_auth(token)
            .send()
            .map_err(|e| RelayError::Query(format!("Warehouse request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| RelayError::Query(format!("Failed to read warehouse response: {}", e)))?;

        if !status.is_success() {
            return Err(RelayError::Query(format!(
                "Warehouse returned {}: {}",
                status,
                api_error_message(&body)
            )));
        }

        let page: QueryPage = serde_json::from_str(&body)
            .map_err(|e| RelayError::Query(format!("Unexpected warehouse response: {}", e)))?;

        if let Some(err) = page.errors.first() {
            return Err(RelayError::Query(format!(
                "Query failed ({}): {}",
                err.reason.as_deref().unwrap_or("unknown"),
                err.message.as_deref().unwrap_or("no message")
            )));
        }

        Ok(page)
    }

    fn submit(&self, sql: &str, token: &str) -> Result<QueryPage> {
        let url = format!("{}/projects/{}/queries", self.base_url, self.project_id);
        let body = json!({
            "query": sql,
            "useLegacySql": false,
            "timeoutMs": QUERY_TIMEOUT_MS,
        });
        self.send(self.client.post(url).json(&body), token)
    }

    fn fetch_page(&self, job: &JobReference, page_token: Option<&str>, token: &str) -> Result<QueryPage> {
        let url = format!("{}/projects/{}/queries/{}", self.base_url, self.project_id, job.job_id);

        let mut params: Vec<(&str, String)> = vec![("timeoutMs", QUERY_TIMEOUT_MS.to_string())];
        if let Some(location) = &job.location {
            params.push(("location", location.clone()));
        }
        if let Some(page_token) = page_token {
            params.push(("pageToken", page_token.to_string()));
        }

        self.send(self.client.get(url).query(&params), token)
    }
}

impl Warehouse for BigQueryClient {
    fn query(&self, sql: &str) -> Result<ResultSet> {
        let token = self.tokens.access_token()?;

        info!("Submitting warehouse query in project {}", self.project_id);
        let mut page = self.submit(sql, &token)?;

        let job = page
            .job_reference
            .clone()
            .ok_or_else(|| RelayError::Query("Warehouse response carried no job reference".to_string()))?;

        while !page.job_complete {
            debug!("Job {} still running, polling again in {:?}", job.job_id, self.poll_interval);
            sleep(self.poll_interval);
            page = self.fetch_page(&job, None, &token)?;
        }

        let fields = page
            .schema
            .take()
            .ok_or_else(|| RelayError::Query("Completed job returned no schema".to_string()))?
            .fields;
        let (columns, types): (Vec<String>, Vec<String>) =
            fields.into_iter().map(|f| (f.name, f.field_type)).unzip();

        let mut result = ResultSet::new(columns);
        let mut pages = 1;

        loop {
            for row in page.rows.drain(..) {
                let values = row.f.into_iter().enumerate().map(|(i, c)| {
                    let field_type = types.get(i).map(String::as_str).unwrap_or_default();
                    cell_to_text(field_type, c.v)
                });
                result.rows.push(values.collect());
            }

            match page.page_token.take() {
                Some(next) => {
                    page = self.fetch_page(&job, Some(&next), &token)?;
                    pages += 1;
                }
                None => break,
            }
        }

        info!(
            "Job {} returned {} rows over {} page(s)",
            job.job_id,
            result.len(),
            pages
        );
        Ok(result)
    }
}

/// Pull `error.message` out of an API error body, or fall back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::MockTokenSource;
    use crate::cloud::client::create_http_client;

    #[test]
    fn test_cell_to_text() {
        assert_eq!(cell_to_text("STRING", Value::Null), None);
        assert_eq!(cell_to_text("STRING", json!("Smith, J.")), Some("Smith, J.".to_string()));
        assert_eq!(cell_to_text("INTEGER", json!("42")), Some("42".to_string()));
        assert_eq!(cell_to_text("NUMERIC", json!("1.50")), Some("1.50".to_string()));
        assert_eq!(cell_to_text("DATE", json!("2024-01-01")), Some("2024-01-01".to_string()));
        assert_eq!(
            cell_to_text("RECORD", json!([{"v": "a"}, {"v": "b"}])),
            Some(r#"[{"v":"a"},{"v":"b"}]"#.to_string())
        );
    }

    #[test]
    fn test_timestamp_cells() {
        assert_eq!(
            cell_to_text("TIMESTAMP", json!("1.7040672E9")),
            Some("2024-01-01 00:00:00+00:00".to_string())
        );
        assert_eq!(
            cell_to_text("TIMESTAMP", json!("1.7040672005E9")),
            Some("2024-01-01 00:00:00.500000+00:00".to_string())
        );
        assert_eq!(
            cell_to_text("TIMESTAMP", json!("0.0")),
            Some("1970-01-01 00:00:00+00:00".to_string())
        );
        assert_eq!(cell_to_text("TIMESTAMP", json!("soon")), Some("soon".to_string()));
    }

    #[test]
    fn test_datetime_and_time_cells() {
        assert_eq!(
            cell_to_text("DATETIME", json!("2024-03-05T14:30:00")),
            Some("2024-03-05 14:30:00".to_string())
        );
        assert_eq!(
            cell_to_text("DATETIME", json!("2024-03-05T14:30:00.120000")),
            Some("2024-03-05 14:30:00.120000".to_string())
        );
        assert_eq!(cell_to_text("TIME", json!("09:05:00")), Some("09:05:00".to_string()));
        assert_eq!(cell_to_text("TIME", json!("09:05:00.5")), Some("09:05:00.500000".to_string()));
    }

    #[test]
    fn test_boolean_cells() {
        assert_eq!(cell_to_text("BOOLEAN", json!("true")), Some("True".to_string()));
        assert_eq!(cell_to_text("BOOL", json!("false")), Some("False".to_string()));
        assert_eq!(cell_to_text("BOOLEAN", json!(true)), Some("True".to_string()));
    }

    #[test]
    fn test_float_cells() {
        assert_eq!(cell_to_text("FLOAT", json!("3")), Some("3.0".to_string()));
        assert_eq!(cell_to_text("FLOAT", json!("0.1")), Some("0.1".to_string()));
        assert_eq!(cell_to_text("FLOAT64", json!("-2.5")), Some("-2.5".to_string()));
        assert_eq!(cell_to_text("FLOAT", json!("1.0E16")), Some("1e+16".to_string()));
        assert_eq!(cell_to_text("FLOAT", json!("1.5E-5")), Some("1.5e-05".to_string()));
        assert_eq!(cell_to_text("FLOAT", json!("0.0001")), Some("0.0001".to_string()));
        assert_eq!(cell_to_text("FLOAT", json!("NaN")), Some("nan".to_string()));
        assert_eq!(cell_to_text("FLOAT", json!("-Infinity")), Some("-inf".to_string()));
    }

    #[test]
    fn test_page_deserialization() {
        let body = r#"{
            "kind": "bigquery#queryResponse",
            "schema": {"fields": [{"name": "id", "type": "INTEGER"}, {"name": "name", "type": "STRING"}]},
            "jobReference": {"projectId": "p", "jobId": "job_1", "location": "EU"},
            "totalRows": "2",
            "rows": [{"f": [{"v": "1"}, {"v": "a"}]}, {"f": [{"v": "2"}, {"v": null}]}],
            "jobComplete": true
        }"#;
        let page: QueryPage = serde_json::from_str(body).unwrap();
        assert!(page.job_complete);
        assert_eq!(page.job_reference.unwrap().location.as_deref(), Some("EU"));
        assert_eq!(page.schema.unwrap().fields.len(), 2);
        assert_eq!(page.rows.len(), 2);
        assert!(page.page_token.is_none());
    }

    #[test]
    fn test_incomplete_page_deserialization() {
        let body = r#"{"jobReference": {"jobId": "job_2"}, "jobComplete": false}"#;
        let page: QueryPage = serde_json::from_str(body).unwrap();
        assert!(!page.job_complete);
        assert!(page.schema.is_none());
        assert!(page.rows.is_empty());
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error": {"code": 404, "message": "Not found: Table x"}}"#;
        assert_eq!(api_error_message(body), "Not found: Table x");
        assert_eq!(api_error_message("plain text"), "plain text");
    }

    #[test]
    fn test_token_failure_stops_before_submit() {
        let mut tokens = MockTokenSource::new();
        tokens
            .expect_access_token()
            .times(1)
            .returning(|| Err(RelayError::Credential("invalid_grant".to_string())));

        // Nothing listens on port 1, so any request would surface as a query error.
        let client = BigQueryClient::new(create_http_client().unwrap(), "http://127.0.0.1:1", "proj", Box::new(tokens));
        let err = client.query("SELECT 1").unwrap_err();

        assert!(matches!(err, RelayError::Credential(_)));
        assert_eq!(err.to_string(), "credential error: invalid_grant");
    }
}
