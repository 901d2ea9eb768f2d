//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// One request observed by the mock proxy.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub purge_header: bool,
}

pub type RequestLog = Arc<Mutex<Vec<RecordedRequest>>>;

/// Tracks how many requests the mock proxy is serving at once.
#[derive(Debug, Default)]
pub struct InFlightGauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl InFlightGauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    /// Highest number of simultaneously served requests seen so far.
    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// Start a mock nginx stand-in that confirms a cache bypass on every
/// request. Returns its address and the request log.
pub async fn start_mock_proxy() -> (SocketAddr, RequestLog) {
    let (addr, log, _) = start_mock(|_path| true, Duration::ZERO).await;
    (addr, log)
}

/// Start a mock proxy where `bypass_for` decides per path whether the
/// response carries the bypass proof header.
pub async fn start_mock_proxy_with<F>(bypass_for: F) -> (SocketAddr, RequestLog)
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    let (addr, log, _) = start_mock(bypass_for, Duration::ZERO).await;
    (addr, log)
}

/// Start a mock proxy that holds every response back for `delay`, so
/// tests can observe how many requests overlap.
pub async fn start_slow_mock_proxy(
    delay: Duration,
) -> (SocketAddr, RequestLog, Arc<InFlightGauge>) {
    start_mock(|_path| true, delay).await
}

async fn start_mock<F>(
    bypass_for: F,
    delay: Duration,
) -> (SocketAddr, RequestLog, Arc<InFlightGauge>)
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: RequestLog = Arc::new(Mutex::new(Vec::new()));
    let gauge = Arc::new(InFlightGauge::default());

    let task_log = log.clone();
    let task_gauge = gauge.clone();
    let bypass_for = Arc::new(bypass_for);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let log = task_log.clone();
                    let gauge = task_gauge.clone();
                    let bypass_for = bypass_for.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 4096];
                        let mut request = String::new();
                        // Warming requests carry no body; the headers are
                        // the whole message.
                        loop {
                            match socket.read(&mut buf).await {
                                Ok(0) => break,
                                Ok(n) => {
                                    request.push_str(&String::from_utf8_lossy(&buf[..n]));
                                    if request.contains("\r\n\r\n") {
                                        break;
                                    }
                                }
                                Err(_) => return,
                            }
                        }

                        let path = request
                            .lines()
                            .next()
                            .and_then(|line| line.split_whitespace().nth(1))
                            .unwrap_or("/")
                            .to_string();
                        let purge_header = request
                            .lines()
                            .any(|line| line.to_ascii_lowercase().starts_with("x-purge-cache:"));
                        log.lock().unwrap().push(RecordedRequest {
                            path: path.clone(),
                            purge_header,
                        });

                        gauge.enter();
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }

                        let body = "tile";
                        let mut response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n",
                            body.len()
                        );
                        if bypass_for(&path) {
                            response.push_str("X-Debug-Cache-Bypass: 1\r\n");
                        }
                        response.push_str("\r\n");
                        response.push_str(body);

                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        gauge.leave();
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, log, gauge)
}
