//! Guarded HTTP GET.

use std::time::Duration;

use clap::Args;

use crate::commands::CommandError;
use crate::config::ResilienceSettings;
use crate::resilience::{fixed_value, OperationFailure, ResilienceCoordinator, ResilienceOptions};

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// URL to fetch.
    pub url: String,

    /// Breaker name; defaults to the URL.
    #[arg(long)]
    pub name: Option<String>,

    /// Body to print when the URL and the cache are unavailable.
    #[arg(long)]
    pub fallback: Option<String>,

    /// Per-request HTTP client timeout.
    #[arg(long, default_value_t = 10_000)]
    pub request_timeout_ms: u64,
}

impl ProbeArgs {
    pub fn breaker_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.url)
    }

    /// Options for one guarded fetch of this URL.
    pub fn options(&self) -> ResilienceOptions<String> {
        let options = ResilienceOptions::new(self.breaker_name()).with_cache_key(self.url.clone());
        match &self.fallback {
            Some(body) => options.with_fallback(fixed_value(body.clone())),
            None => options,
        }
    }
}

/// Build the HTTP client used for probing.
pub fn http_client(request_timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(request_timeout).build()
}

/// GET `url`, mapping transport errors and non-2xx responses to [`OperationFailure`].
pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<String, OperationFailure> {
    let response = client.get(url).send().await.map_err(transport_failure)?;

    let status = response.status();
    if !status.is_success() {
        return Err(OperationFailure::with_status(
            format!("{url} returned {status}"),
            status.as_u16(),
        ));
    }

    response.text().await.map_err(transport_failure)
}

fn transport_failure(error: reqwest::Error) -> OperationFailure {
    match error.status() {
        Some(status) => OperationFailure::with_status(error.to_string(), status.as_u16()),
        None => OperationFailure::new(error.to_string()),
    }
}

pub async fn run(args: ProbeArgs, settings: ResilienceSettings) -> Result<(), CommandError> {
    let client = http_client(Duration::from_millis(args.request_timeout_ms))?;
    let coordinator = ResilienceCoordinator::new(settings);

    let result = coordinator
        .execute_resilient_operation(|| fetch(&client, &args.url), args.options())
        .await;
    coordinator.shutdown();

    match result {
        Ok(body) => {
            println!("{body}");
            Ok(())
        }
        Err(e) => {
            tracing::error!(url = %args.url, kind = ?e.kind(), status = ?e.status(), error = %e, "Probe failed");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breaker_name_defaults_to_url() {
        let args = ProbeArgs {
            url: "http://localhost:8080/health".to_string(),
            name: None,
            fallback: Some("{}".to_string()),
            request_timeout_ms: 1_000,
        };
        assert_eq!(args.breaker_name(), "http://localhost:8080/health");

        let options = args.options();
        assert_eq!(options.name, "http://localhost:8080/health");
        assert_eq!(options.fallback_strategies.len(), 1);
        assert_eq!(options.cache_key.as_deref(), Some("http://localhost:8080/health"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_transport_failure() {
        // Reserve a free port, then release it so nothing is listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(500))
            .no_proxy()
            .build()
            .unwrap();
        let failure = fetch(&client, &format!("http://{addr}/")).await.unwrap_err();
        assert_eq!(failure.status, None);
    }
}
