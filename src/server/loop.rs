// Server loop module
// Accepts connections until the shutdown future resolves

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;
use crate::query::QueryExecutor;

/// Accept loop. Must run inside a `LocalSet`; connections are served on
/// local tasks and keep running after the listener is closed.
pub async fn start_server_loop<E, F>(listener: TcpListener, state: Arc<AppState<E>>, shutdown: F)
where
    E: QueryExecutor + 'static,
    F: Future<Output = ()>,
{
    let active_connections = Arc::new(AtomicUsize::new(0));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }
            () = &mut shutdown => break,
        }
    }

    drop(listener);
    logger::log_shutdown(active_connections.load(Ordering::SeqCst));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Overrides};
    use crate::query::{QueryError, ResultRow};
    use crate::server::create_listener;
    use tempfile::TempDir;
    use tokio::sync::oneshot;
    use tokio::task::LocalSet;

    struct OneRowExecutor;

    impl QueryExecutor for OneRowExecutor {
        async fn execute(&self, year: i32) -> Result<Vec<ResultRow>, QueryError> {
            Ok(vec![ResultRow {
                year: Some(i64::from(year)),
                ..ResultRow::default()
            }])
        }
    }

    #[tokio::test]
    async fn test_serves_over_tcp_until_shutdown() {
        let dir = TempDir::new().unwrap();
        let overrides = Overrides {
            data_path: Some(dir.path().to_string_lossy().into_owned()),
            project_id: Some("test_project".to_string()),
            ..Overrides::default()
        };
        let mut config = Config::load_from("this-config-file-does-not-exist", &overrides).unwrap();
        config.logging.access_log = false;
        let state = Arc::new(AppState::new(config, OneRowExecutor));

        let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel::<()>();

        let local = LocalSet::new();
        local
            .run_until(async move {
                let server = tokio::task::spawn_local(start_server_loop(listener, state, async {
                    let _ = rx.await;
                }));

                let client = reqwest::Client::new();
                let resp = client
                    .post(format!("{base}/bigquery_example"))
                    .header("Content-Type", "application/json")
                    .body(r#"{"year":"2017"}"#)
                    .send()
                    .await
                    .unwrap();
                assert_eq!(resp.status().as_u16(), 200);
                assert_eq!(resp.headers()["server"], "bls-query-server");
                let body: serde_json::Value = resp.json().await.unwrap();
                let query_id = body["queryid"].as_str().unwrap().to_string();

                let resp = client
                    .get(format!("{base}/bigquery_example_list"))
                    .send()
                    .await
                    .unwrap();
                let ids: Vec<String> = resp.json().await.unwrap();
                assert_eq!(ids, vec![query_id.clone()]);

                let resp = client
                    .post(format!("{base}/bigquery_example_fetch"))
                    .header("Content-Type", "application/json")
                    .body(format!(r#"{{"queryid":"{query_id}"}}"#))
                    .send()
                    .await
                    .unwrap();
                assert_eq!(resp.status().as_u16(), 200);
                let text = resp.text().await.unwrap();
                let row: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
                assert_eq!(row["year"], 2017);

                tx.send(()).unwrap();
                server.await.unwrap();
            })
            .await;
    }
}
