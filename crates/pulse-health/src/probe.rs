//! HTTP health probe.
//!
//! A probe is one logical GET with a connect/read timeout split. Status
//! codes in the configured retry set are retried with exponential backoff;
//! once retries run out the last status is reported as-is. Transport
//! failures are classified immediately and never escape as errors.

use std::fmt;

use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::{Jitter, RetryTransientMiddleware, Retryable, RetryableStrategy};
use tracing::debug;

use pulse_core::ProbeConfig;

/// Outcome of one probe (after internal retries).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The target answered 200.
    Healthy,
    /// The target accepted the connection but did not answer in time.
    Timeout,
    /// The connection could not be established or was lost.
    ConnectionError,
    /// The target answered with something other than 200.
    UnexpectedStatus(u16),
}

impl ProbeResult {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeResult::Healthy)
    }

    /// Human-readable label for log lines; `None` when healthy.
    pub fn error_label(&self) -> Option<String> {
        match self {
            ProbeResult::Healthy => None,
            ProbeResult::Timeout => Some("Timeout".to_string()),
            ProbeResult::ConnectionError => Some("Connection error".to_string()),
            ProbeResult::UnexpectedStatus(code) => Some(format!("Status Code {code}")),
        }
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error_label() {
            Some(label) => f.write_str(&label),
            None => f.write_str("OK"),
        }
    }
}

/// Checks whether a URL is healthy.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeResult;
}

/// Marks only the configured status codes as transient.
struct RetryOnStatus {
    statuses: Vec<u16>,
}

impl RetryableStrategy for RetryOnStatus {
    fn handle(
        &self,
        res: &Result<reqwest::Response, reqwest_middleware::Error>,
    ) -> Option<Retryable> {
        match res {
            Ok(response) if self.statuses.contains(&response.status().as_u16()) => {
                Some(Retryable::Transient)
            }
            Ok(_) => None,
            Err(_) => Some(Retryable::Fatal),
        }
    }
}

/// Production prober: reqwest with retry middleware.
pub struct HttpProber {
    client: ClientWithMiddleware,
}

impl HttpProber {
    pub fn new(config: &ProbeConfig) -> Result<Self, reqwest::Error> {
        let base = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            // Overall deadline in case reads keep trickling in.
            .timeout(config.connect_timeout() + config.read_timeout())
            .user_agent(concat!("pulse/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let policy = ExponentialBackoff::builder()
            .retry_bounds(config.backoff_initial(), config.backoff_max())
            .jitter(Jitter::None)
            .base(2)
            .build_with_max_retries(config.max_attempts.saturating_sub(1));

        let strategy = RetryOnStatus {
            statuses: config.retry_statuses.clone(),
        };

        let client = ClientBuilder::new(base)
            .with(RetryTransientMiddleware::new_with_policy_and_strategy(
                policy, strategy,
            ))
            .build();

        debug!(
            connect_timeout = ?config.connect_timeout(),
            read_timeout = ?config.read_timeout(),
            max_attempts = config.max_attempts,
            backoff_initial = ?config.backoff_initial(),
            backoff_max = ?config.backoff_max(),
            "http prober ready"
        );
        Ok(Self { client })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str) -> ProbeResult {
        match self.client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status == reqwest::StatusCode::OK {
                    ProbeResult::Healthy
                } else {
                    debug!(%status, %url, "health probe non-200");
                    ProbeResult::UnexpectedStatus(status.as_u16())
                }
            }
            Err(e) => {
                let result = classify_error(&e);
                debug!(error = %e, %url, %result, "health probe failed");
                result
            }
        }
    }
}

/// Connect failures (including connect timeouts) are connection errors;
/// a timeout after connecting is a read timeout.
fn classify_error(err: &reqwest_middleware::Error) -> ProbeResult {
    match err {
        reqwest_middleware::Error::Reqwest(e) if e.is_connect() => ProbeResult::ConnectionError,
        reqwest_middleware::Error::Reqwest(e) if e.is_timeout() => ProbeResult::Timeout,
        _ => ProbeResult::ConnectionError,
    }
}
