//! Query execution module
//!
//! The handlers only see the [`QueryExecutor`] capability; the production
//! implementation talks to BigQuery over REST.

mod bigquery;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

pub use bigquery::BigQueryExecutor;

/// One row of `bigquery-public-data.bls.unemployment_cps`
///
/// Every column is nullable upstream, so every field is an `Option` and a
/// missing value serializes as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub series_id: Option<String>,
    pub year: Option<i64>,
    pub period: Option<String>,
    pub value: Option<f64>,
    pub footnote_codes: Option<String>,
    pub date: Option<NaiveDate>,
    pub series_title: Option<String>,
}

/// Upstream query failures. Never shown to clients.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("request to query service failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("query service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected query response: {0}")]
    Decode(String),
}

/// Runs the fixed unemployment query for one year
pub trait QueryExecutor {
    /// `year` has already been range-checked by the request validator.
    fn execute(&self, year: i32) -> impl Future<Output = Result<Vec<ResultRow>, QueryError>>;
}
