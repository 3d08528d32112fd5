// API module entry
// Routes requests to the submit, list and fetch endpoints

mod handlers;
mod types;
pub mod validate;

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Request, Response};
use std::convert::Infallible;
use std::sync::Arc;

use crate::config::AppState;
use crate::http;
use crate::logger;
use crate::query::QueryExecutor;

pub const SUBMIT_PATH: &str = "/bigquery_example";
pub const LIST_PATH: &str = "/bigquery_example_list";
pub const FETCH_PATH: &str = "/bigquery_example_fetch";
pub const HEALTH_PATH: &str = "/healthz";

/// Error type request bodies must convert into
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main entry point for HTTP request handling
///
/// Dispatches to handler functions based on request path; method checks
/// belong to the individual endpoints.
pub async fn handle_request<B, E>(
    req: Request<B>,
    state: Arc<AppState<E>>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<BoxError>,
    E: QueryExecutor,
{
    if let Some(resp) = check_body_size(&req, state.config.http.max_body_size) {
        return Ok(resp);
    }

    let path = req.uri().path().to_string();
    let response = match path.as_str() {
        SUBMIT_PATH => handlers::submit(req, &state).await,
        LIST_PATH => handlers::list(&state).await,
        FETCH_PATH => handlers::fetch(req, &state).await,
        HEALTH_PATH => http::build_health_response("ok"),
        _ => http::build_404_response(),
    };
    Ok(response)
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_warning(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}
