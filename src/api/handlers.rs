// Query endpoint handlers
//
// Failures caused by the upstream query or the filesystem are logged with
// their cause and answered with a generic 500.

use chrono::{Datelike, Local};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Request, Response, StatusCode};

use super::types::SubmitResponse;
use super::validate::{self, ValidationError};
use super::BoxError;
use crate::config::AppState;
use crate::http;
use crate::logger;
use crate::query::QueryExecutor;
use crate::store::StoreError;

/// Content type of stored result files
const RESULT_CONTENT_TYPE: &str = "application/x-ndjson";

/// Run the query for the requested year and store the rows
pub async fn submit<B, E>(req: Request<B>, state: &AppState<E>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<BoxError>,
    E: QueryExecutor,
{
    let year = match read_submission(req, body_limit(state)).await {
        Ok(year) => year,
        Err(e) => return validation_failure(&e),
    };

    let query = state.executor.execute(year);
    let rows = match tokio::time::timeout(state.config.query_timeout(), query).await {
        Ok(Ok(rows)) => rows,
        Ok(Err(e)) => {
            logger::log_error(&format!("Query for {year} failed: {e}"));
            return http::build_500_response();
        }
        Err(_) => {
            logger::log_error(&format!(
                "Query for {year} timed out after {}s",
                state.config.query.timeout_secs
            ));
            return http::build_500_response();
        }
    };

    match state.store.write(year, &rows).await {
        Ok(query_id) => {
            logger::log_info(&format!("Stored {} rows as {query_id}", rows.len()));
            http::build_json_response(StatusCode::OK, &SubmitResponse { query_id })
        }
        Err(e) => {
            logger::log_error(&format!("Failed to store results for {year}: {e}"));
            http::build_500_response()
        }
    }
}

/// List the ids of all stored results
pub async fn list<E>(state: &AppState<E>) -> Response<Full<Bytes>> {
    match state.store.list().await {
        Ok(ids) => http::build_json_response(StatusCode::OK, &ids),
        Err(e) => {
            logger::log_error(&format!("Failed to list results: {e}"));
            http::build_500_response()
        }
    }
}

/// Return a stored result verbatim
pub async fn fetch<B, E>(req: Request<B>, state: &AppState<E>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let query_id = match read_fetch(req, body_limit(state)).await {
        Ok(id) => id,
        Err(e) => return validation_failure(&e),
    };

    match state.store.read(&query_id).await {
        Ok(data) => http::build_bytes_response(data, RESULT_CONTENT_TYPE),
        Err(e @ StoreError::NotFound(_)) => {
            logger::log_warning(&format!("Query data not available: {e}"));
            http::build_204_response()
        }
        Err(e) => {
            logger::log_error(&format!("Failed to read {query_id}: {e}"));
            http::build_500_response()
        }
    }
}

async fn read_submission<B>(req: Request<B>, limit: usize) -> Result<i32, ValidationError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    validate::check_json_post(req.method(), req.headers())?;
    let body = read_body(req, limit).await?;
    validate::parse_submission(&body, Local::now().year())
}

async fn read_fetch<B>(req: Request<B>, limit: usize) -> Result<String, ValidationError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    validate::check_json_post(req.method(), req.headers())?;
    let body = read_body(req, limit).await?;
    validate::parse_fetch(&body)
}

fn body_limit<E>(state: &AppState<E>) -> usize {
    usize::try_from(state.config.http.max_body_size).unwrap_or(usize::MAX)
}

/// Collect the body, failing once more than `limit` bytes have arrived.
/// Covers chunked bodies that carry no `Content-Length`.
async fn read_body<B>(req: Request<B>, limit: usize) -> Result<Bytes, ValidationError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    match Limited::new(req.into_body(), limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(ValidationError::BodyTooLarge(limit))
        }
        Err(e) => Err(ValidationError::MalformedBody(format!(
            "failed to read request body: {e}"
        ))),
    }
}

fn validation_failure(err: &ValidationError) -> Response<Full<Bytes>> {
    logger::log_warning(&format!("Rejected request: {err}"));
    match err {
        ValidationError::InvalidMethod(_) => http::build_405_response(),
        ValidationError::BodyTooLarge(_) => http::build_413_response(),
        _ => http::build_text_response(err.status(), err.public_message()),
    }
}
