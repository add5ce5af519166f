//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use resilience_guard::config::ResilienceSettings;
use resilience_guard::OperationFailure;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Settings with deterministic (jitter-free) backoff.
pub fn settings(failure_threshold: u32, max_attempts: u32) -> ResilienceSettings {
    let mut settings = ResilienceSettings::default();
    settings.circuit_breaker.failure_threshold = failure_threshold;
    settings.retry.max_attempts = max_attempts;
    settings.retry.jitter_enabled = false;
    settings
}

/// A downstream that fails its first `failures` calls, then succeeds.
#[derive(Clone, Default)]
pub struct FlakyDownstream {
    calls: Arc<AtomicU32>,
    failures: u32,
    status: Option<u16>,
}

impl FlakyDownstream {
    pub fn failing_first(failures: u32, status: u16) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            failures,
            status: Some(status),
        }
    }

    pub fn always_failing(status: u16) -> Self {
        Self::failing_first(u32::MAX, status)
    }

    pub fn healthy() -> Self {
        Self::failing_first(0, 200)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// One invocation of the downstream.
    pub fn call(&self) -> impl Future<Output = Result<String, OperationFailure>> + Send + 'static {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = n < self.failures;
        let status = self.status;
        async move {
            if failing {
                Err(match status {
                    Some(code) => OperationFailure::with_status(format!("downstream returned {code}"), code),
                    None => OperationFailure::new("downstream failed"),
                })
            } else {
                Ok(format!("response #{}", n + 1))
            }
        }
    }
}

/// Start a programmable HTTP backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 1024];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// A backend that answers with `statuses` in order, repeating the last one.
pub async fn start_scripted_backend(statuses: Vec<u16>) -> (SocketAddr, Arc<AtomicU32>) {
    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();
    let statuses = Arc::new(statuses);

    let addr = start_programmable_backend(move || {
        let counter = counter.clone();
        let statuses = statuses.clone();
        async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) as usize;
            let status = statuses
                .get(n)
                .or_else(|| statuses.last())
                .copied()
                .unwrap_or(200);
            (status, format!("hit {}", n + 1))
        }
    })
    .await;

    (addr, hits)
}
