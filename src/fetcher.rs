use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use bytes::Bytes;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, StatusCode};
use tokio::sync::Semaphore;

use crate::progress::Progress;

const MAX_CONCURRENCY: usize = 4;

#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    semaphore: Arc<Semaphore>,
    progress: Option<Arc<Progress>>,
}

impl Fetcher {
    pub fn new(user_agent: &str, progress: Option<Arc<Progress>>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(Duration::from_secs(60))
            .build()
            .context("build reqwest client")?;
        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENCY)),
            progress,
        })
    }

    /// Sends the request produced by `build`, retrying on throttling.
    ///
    /// Any other status is handed back with its body so callers can pull a message out
    /// of error responses. `build` runs once per attempt because multipart bodies cannot
    /// be replayed.
    pub async fn send<F>(&self, label: &str, build: F) -> anyhow::Result<(StatusCode, Bytes)>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .context("acquire request permit")?;

        let mut backoff = Duration::from_millis(250);
        let max_attempts = 5usize;

        for attempt in 1..=max_attempts {
            if let Some(p) = &self.progress {
                p.http_start(label);
            }

            let resp = match build(&self.client).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if let Some(p) = &self.progress {
                        p.http_err(label);
                    }
                    return Err(e).with_context(|| label.to_string());
                }
            };

            let status = resp.status();
            let headers = resp.headers().clone();

            if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
            {
                let wait = retry_after_duration(&headers).unwrap_or(backoff);
                tracing::warn!(
                    %status,
                    attempt,
                    wait_ms = wait.as_millis(),
                    request = label,
                    "throttled; backing off"
                );
                if let Some(p) = &self.progress {
                    p.http_throttled(label, status.as_u16(), wait);
                }
                tokio::time::sleep(wait).await;
                backoff = (backoff * 2).min(Duration::from_secs(10));
                continue;
            }

            let body = match resp.bytes().await {
                Ok(body) => body,
                Err(e) => {
                    if let Some(p) = &self.progress {
                        p.http_err(label);
                    }
                    return Err(e).context("read response body");
                }
            };
            if let Some(p) = &self.progress {
                p.http_ok(label, body.len());
            }
            return Ok((status, body));
        }

        Err(anyhow!("{} failed after retries", label))
    }
}

fn retry_after_duration(headers: &HeaderMap) -> Option<Duration> {
    let v = headers.get(RETRY_AFTER)?;
    let s = v.to_str().ok()?.trim();
    let seconds: u64 = s.parse().ok()?;
    Some(Duration::from_secs(seconds))
}
