use anyhow::{Context, Result, anyhow};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const RATE_LIMIT_MAX_RETRIES: usize = 5;
const RATE_LIMIT_BASE_DELAY: Duration = Duration::from_secs(2);
const RATE_LIMIT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Sends the request built by `build` until it succeeds or stops being rate
/// limited, and returns the success body. `describe_error` pulls the
/// service's own message out of a failure body.
pub(crate) async fn post_with_retry(
    service: &str,
    build: impl Fn() -> RequestBuilder,
    describe_error: fn(&str) -> Option<String>,
) -> Result<String> {
    let mut backoff = Backoff::default();
    loop {
        debug!("{} request (attempt {})", service, backoff.attempt + 1);
        let response = build()
            .send()
            .await
            .with_context(|| format!("failed to reach {}", service))?;

        let status = response.status();
        let hint = retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            return Ok(body);
        }
        if is_rate_limited(status, &body)
            && let Some(wait) = backoff.next_wait(hint)
        {
            warn!(
                "{} rate limited, waiting {:.1}s before attempt {}/{}",
                service,
                wait.as_secs_f32(),
                backoff.attempt + 1,
                RATE_LIMIT_MAX_RETRIES
            );
            sleep(wait).await;
            continue;
        }
        let message = describe_error(&body).unwrap_or(body);
        return Err(anyhow!("{} error ({}): {}", service, status, message));
    }
}

/// Exponential wait between rate-limited attempts, capped at
/// `RATE_LIMIT_MAX_DELAY`. A longer `Retry-After` from the server wins.
#[derive(Debug)]
struct Backoff {
    attempt: usize,
    delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            attempt: 0,
            delay: RATE_LIMIT_BASE_DELAY,
        }
    }
}

impl Backoff {
    fn next_wait(&mut self, hint: Option<Duration>) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= RATE_LIMIT_MAX_RETRIES {
            return None;
        }
        let wait = hint.map_or(self.delay, |hint| hint.max(self.delay));
        self.delay = (self.delay * 2).clamp(RATE_LIMIT_BASE_DELAY, RATE_LIMIT_MAX_DELAY);
        Some(wait)
    }
}

fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    const MARKERS: [&str; 5] = ["rate limit", "rate_limit", "too many requests", "quota", "overloaded"];
    match status.as_u16() {
        429 | 503 | 529 => true,
        _ => {
            let body = body.to_lowercase();
            MARKERS.iter().any(|marker| body.contains(marker))
        }
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
