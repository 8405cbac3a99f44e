use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use rand::Rng;
use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;

use crate::config;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Statuses worth retrying: rate limits (the provider uses both 420 and 429),
/// request timeout, and transient 5xx.
const RETRIABLE_STATUSES: [u16; 7] = [420, 429, 408, 500, 502, 503, 504];

/// A provider reply reduced to what classification and parsing need.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status: u16,
    /// `Retry-After` header in seconds, if the provider sent one.
    pub retry_after: Option<f64>,
    pub body: String,
}

/// Network seam. Production uses [`HttpTransport`]; tests substitute scripted
/// or counting fakes.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<ProviderResponse>;
}

static CLIENT: OnceCell<Client> = OnceCell::new();

fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

pub struct HttpTransport;

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<ProviderResponse> {
        let client = http_client()?;
        let mut req = client.get(url);
        for (name, value) in config::provider_headers()? {
            req = req.header(name.as_str(), value.as_str());
        }
        let resp = req.send().context("request failed")?;
        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<f64>().ok());
        let body = resp.text().context("failed reading body")?;
        Ok(ProviderResponse {
            status,
            retry_after,
            body,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_millis(750),
            max_delay: Duration::from_secs(10),
            jitter: Duration::from_millis(250),
        }
    }
}

/// What one logical fetch actually did on the wire.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    pub attempts: u32,
    pub delays: Vec<Duration>,
}

#[derive(Debug)]
pub enum FetchOutcome {
    Success(ProviderResponse),
    /// Anything outside 200 and the retriable set, returned immediately for
    /// the caller to interpret (404 usually means "no data").
    NonRetriable(ProviderResponse),
    /// Attempt cap reached; carries the last response received.
    Exhausted(ProviderResponse),
    TransportFailed(String),
}

#[derive(Debug)]
pub struct FetchReport {
    pub outcome: FetchOutcome,
    pub state: RetryState,
}

/// The single retry/backoff abstraction every endpoint call goes through.
pub struct RetryingFetcher<T: Transport> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingFetcher<T> {
    pub fn new(transport: T) -> Self {
        Self::with_policy(transport, RetryPolicy::default())
    }

    pub fn with_policy(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// One logical GET. Sleeps between attempts; never panics, never returns
    /// early on a retriable status until the attempt cap is reached.
    pub fn fetch(&self, url: &str) -> FetchReport {
        let mut state = RetryState::default();
        loop {
            state.attempts += 1;
            match self.transport.get(url) {
                Ok(resp) if resp.status == 200 => {
                    return FetchReport {
                        outcome: FetchOutcome::Success(resp),
                        state,
                    };
                }
                Ok(resp) if is_retriable(resp.status) => {
                    if state.attempts >= self.policy.max_attempts {
                        return FetchReport {
                            outcome: FetchOutcome::Exhausted(resp),
                            state,
                        };
                    }
                    let delay = retry_delay(&self.policy, state.attempts, resp.retry_after);
                    state.delays.push(delay);
                    thread::sleep(delay);
                }
                Ok(resp) => {
                    return FetchReport {
                        outcome: FetchOutcome::NonRetriable(resp),
                        state,
                    };
                }
                Err(err) => {
                    if state.attempts >= self.policy.max_attempts {
                        return FetchReport {
                            outcome: FetchOutcome::TransportFailed(err.to_string()),
                            state,
                        };
                    }
                    let delay = retry_delay(&self.policy, state.attempts, None);
                    state.delays.push(delay);
                    thread::sleep(delay);
                }
            }
        }
    }
}

pub fn is_retriable(status: u16) -> bool {
    RETRIABLE_STATUSES.contains(&status)
}

/// Wait before attempt `attempt + 1`. A provider hint wins verbatim over the
/// computed backoff; otherwise `min(cap, base * 2^(attempt-1)) + jitter`.
pub fn retry_delay(policy: &RetryPolicy, attempt: u32, hint_secs: Option<f64>) -> Duration {
    if let Some(hint) = hint_secs
        && hint >= 0.0
        && hint.is_finite()
    {
        return Duration::from_secs_f64(hint);
    }

    let exponent = attempt.saturating_sub(1).min(16);
    let backoff = policy.base_delay.as_secs_f64() * f64::from(1u32 << exponent);
    let capped = backoff.min(policy.max_delay.as_secs_f64());
    let jitter_cap = policy.jitter.as_secs_f64();
    let jitter = if jitter_cap > 0.0 {
        rand::thread_rng().gen_range(0.0..jitter_cap)
    } else {
        0.0
    };
    Duration::from_secs_f64(capped + jitter)
}
