//! BigQuery REST executor
//!
//! Starts a `jobs.query` request with the year bound as a named parameter,
//! then drains the job through `getQueryResults` until it is complete and
//! has no further pages.

use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;

use super::{QueryError, QueryExecutor, ResultRow};
use crate::config::QueryConfig;
use crate::logger;

const UNEMPLOYMENT_QUERY: &str =
    "SELECT * FROM `bigquery-public-data.bls.unemployment_cps` WHERE year = @year";

/// Server-side wait per request while the job is still running
const POLL_WAIT_MS: u64 = 10_000;

pub struct BigQueryExecutor {
    client: Client,
    project_id: String,
    endpoint: String,
    token_url: String,
    access_token: Option<String>,
}

impl BigQueryExecutor {
    pub fn new(cfg: &QueryConfig) -> Result<Self, QueryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            project_id: cfg.project_id.clone(),
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
            token_url: cfg.token_url.clone(),
            access_token: cfg.access_token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Static token if configured, otherwise one from the metadata server
    async fn bearer_token(&self) -> Result<String, QueryError> {
        if let Some(token) = &self.access_token {
            return Ok(token.clone());
        }

        #[derive(Deserialize)]
        struct MetadataToken {
            access_token: String,
        }

        let resp = self
            .client
            .get(&self.token_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        let token: MetadataToken = check_status(resp).await?.json().await?;
        Ok(token.access_token)
    }

    async fn start_query(&self, token: &str, year: i32) -> Result<QueryPage, QueryError> {
        let url = format!("{}/projects/{}/queries", self.endpoint, self.project_id);
        let body = json!({
            "query": UNEMPLOYMENT_QUERY,
            "useLegacySql": false,
            "parameterMode": "NAMED",
            "queryParameters": [{
                "name": "year",
                "parameterType": { "type": "INT64" },
                "parameterValue": { "value": year.to_string() }
            }],
            "timeoutMs": POLL_WAIT_MS,
        });

        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        Ok(check_status(resp).await?.json().await?)
    }

    async fn fetch_page(
        &self,
        token: &str,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryPage, QueryError> {
        let url = format!(
            "{}/projects/{}/queries/{}",
            self.endpoint, job.project_id, job.job_id
        );
        let mut params = vec![("timeoutMs", POLL_WAIT_MS.to_string())];
        if let Some(location) = &job.location {
            params.push(("location", location.clone()));
        }
        if let Some(page_token) = page_token {
            params.push(("pageToken", page_token.to_string()));
        }

        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(&params)
            .send()
            .await?;
        Ok(check_status(resp).await?.json().await?)
    }
}

impl QueryExecutor for BigQueryExecutor {
    async fn execute(&self, year: i32) -> Result<Vec<ResultRow>, QueryError> {
        let token = self.bearer_token().await?;
        let mut page = self.start_query(&token, year).await?;
        let job = page
            .job_reference
            .clone()
            .ok_or_else(|| QueryError::Decode("response has no jobReference".to_string()))?;

        let mut schema: Option<TableSchema> = None;
        let mut rows = Vec::new();
        loop {
            if !page.job_complete {
                page = self.fetch_page(&token, &job, None).await?;
                continue;
            }

            if let Some(s) = page.schema.take() {
                schema = Some(s);
            }
            let batch = page.rows.take().unwrap_or_default();
            if !batch.is_empty() {
                let fields = schema
                    .as_ref()
                    .ok_or_else(|| QueryError::Decode("rows returned without schema".to_string()))?;
                rows.extend(decode_rows(fields, batch)?);
            }

            match page.page_token.take() {
                Some(next) => page = self.fetch_page(&token, &job, Some(&next)).await?,
                None => break,
            }
        }

        logger::log_info(&format!(
            "[Query] job {} returned {} rows for {year}",
            job.job_id,
            rows.len()
        ));
        Ok(rows)
    }
}

async fn check_status(resp: Response) -> Result<Response, QueryError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(QueryError::Status {
        status: status.as_u16(),
        body,
    })
}

/// One `jobs.query` / `getQueryResults` reply
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPage {
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    job_reference: Option<JobReference>,
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Option<Vec<TableRow>>,
    #[serde(default)]
    page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct FieldSchema {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: Value,
}

/// Map positional cells onto `ResultRow` by schema column name.
/// Columns the row type does not know are skipped.
fn decode_rows(schema: &TableSchema, rows: Vec<TableRow>) -> Result<Vec<ResultRow>, QueryError> {
    rows.into_iter()
        .map(|row| {
            let mut out = ResultRow::default();
            for (field, cell) in schema.fields.iter().zip(row.f) {
                let v = &cell.v;
                match field.name.as_str() {
                    "series_id" => out.series_id = cell_text(v),
                    "year" => out.year = parse_cell(v, "year")?,
                    "period" => out.period = cell_text(v),
                    "value" => out.value = parse_value(v)?,
                    "footnote_codes" => out.footnote_codes = cell_text(v),
                    "date" => out.date = parse_cell(v, "date")?,
                    "series_title" => out.series_title = cell_text(v),
                    _ => {}
                }
            }
            Ok(out)
        })
        .collect()
}

fn cell_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn parse_cell<T: FromStr>(v: &Value, column: &str) -> Result<Option<T>, QueryError> {
    cell_text(v)
        .map(|s| {
            s.parse::<T>()
                .map_err(|_| QueryError::Decode(format!("bad {column} value {s:?}")))
        })
        .transpose()
}

/// Non-finite floats have no JSON form and would be stored as null
fn parse_value(v: &Value) -> Result<Option<f64>, QueryError> {
    match parse_cell::<f64>(v, "value")? {
        Some(x) if !x.is_finite() => Err(QueryError::Decode(format!("non-finite value {x}"))),
        other => Ok(other),
    }
}
