// Connection handling module
// Serves a single TCP connection and writes its access log lines

use http_body_util::Full;
use hyper::body::{Body, Bytes, Incoming};
use hyper::header::{HeaderValue, SERVER, USER_AGENT};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::api;
use crate::config::AppState;
use crate::logger::{self, AccessLogEntry};
use crate::query::QueryExecutor;

/// Accept and process a connection, enforcing `performance.max_connections`.
pub fn accept_connection<E>(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState<E>>,
    conn_counter: &Arc<AtomicUsize>,
) where
    E: QueryExecutor + 'static,
{
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection rejected."
            ));
            drop(stream);
            return;
        }
    }

    if state.config.logging.access_log {
        logger::log_connection_accepted(&peer_addr);
    }

    handle_connection(stream, peer_addr, Arc::clone(state), Arc::clone(conn_counter));
}

/// Serve one connection on a local task.
///
/// The whole connection, including any in-flight query, is bounded by
/// `max(read_timeout, write_timeout)`.
fn handle_connection<E>(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState<E>>,
    conn_counter: Arc<AtomicUsize>,
) where
    E: QueryExecutor + 'static,
{
    tokio::task::spawn_local(async move {
        let io = TokioIo::new(stream);
        let timeout_duration = state.config.connection_timeout();

        let mut builder = http1::Builder::new();
        builder.keep_alive(state.config.performance.keep_alive_timeout > 0);

        let service_state = Arc::clone(&state);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| serve_request(req, Arc::clone(&service_state), peer_addr)),
        );

        match tokio::time::timeout(timeout_duration, conn).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => {
                logger::log_warning(&format!(
                    "Connection from {peer_addr} timed out after {} seconds",
                    timeout_duration.as_secs()
                ));
            }
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}

/// Route one request, stamp the `Server` header and write the access log
async fn serve_request<E>(
    req: Request<Incoming>,
    state: Arc<AppState<E>>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    E: QueryExecutor,
{
    let started = Instant::now();
    let entry = state
        .config
        .logging
        .access_log
        .then(|| access_entry(&req, peer_addr));

    let mut response = api::handle_request(req, Arc::clone(&state)).await?;

    if let Ok(value) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(SERVER, value);
    }

    if let Some(mut entry) = entry {
        entry.status = response.status().as_u16();
        entry.body_bytes = response.body().size_hint().exact().unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

fn access_entry<B>(req: &Request<B>, peer_addr: SocketAddr) -> AccessLogEntry {
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = format!("{:?}", req.version())
        .trim_start_matches("HTTP/")
        .to_string();
    entry.user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;

    #[test]
    fn test_access_entry_from_request() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/bigquery_example_fetch?debug=1")
            .header(USER_AGENT, "curl/8.0")
            .body(())
            .unwrap();
        let entry = access_entry(&req, "10.0.0.7:51234".parse().unwrap());
        assert_eq!(entry.remote_addr, "10.0.0.7");
        assert_eq!(entry.method, "POST");
        assert_eq!(entry.path, "/bigquery_example_fetch");
        assert_eq!(entry.query.as_deref(), Some("debug=1"));
        assert_eq!(entry.http_version, "1.1");
        assert_eq!(entry.user_agent.as_deref(), Some("curl/8.0"));
    }
}
