//! Retrying HTTP GET used by every network source.

use crate::config::HttpConfig;
use crate::error::{FetchError, FetchResult};
use crate::headers::{cache_busted, rotated_headers};
use crate::rate_limiter::DomainLimiter;
use fxpulse_telemetry::Metrics;
use reqwest::header::HeaderMap;
use reqwest::{Client, Url};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Shared HTTP fetcher. Cheap to clone.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    config: HttpConfig,
    limiter: Arc<DomainLimiter>,
}

impl HttpSource {
    /// Create a source with its own per-domain limiter.
    pub fn new(config: HttpConfig) -> FetchResult<Self> {
        let limiter = Arc::new(DomainLimiter::new(
            config.max_inflight_per_domain,
            config.max_requests_per_window,
            Duration::from_secs(config.window_secs),
        ));
        Self::with_limiter(config, limiter)
    }

    /// Create a source sharing `limiter` with other sources.
    pub fn with_limiter(config: HttpConfig, limiter: Arc<DomainLimiter>) -> FetchResult<Self> {
        config.validate().map_err(FetchError::Client)?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self {
            client,
            config,
            limiter,
        })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn limiter(&self) -> &Arc<DomainLimiter> {
        &self.limiter
    }

    /// Fetch with the configured number of attempts.
    pub async fn get(&self, url: &str, extra_headers: &HeaderMap) -> FetchResult<String> {
        self.fetch_with_retry(url, extra_headers, self.config.retry_attempts)
            .await
    }

    /// Fetch `url`, retrying retryable failures up to `attempts` times in total.
    ///
    /// Headers are re-rolled on every attempt. Rate-limited responses back off
    /// longer than other failures. Malformed input is returned immediately.
    pub async fn fetch_with_retry(
        &self,
        url: &str,
        extra_headers: &HeaderMap,
        attempts: u32,
    ) -> FetchResult<String> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.fetch(url, extra_headers).await {
                Ok(body) => return Ok(body),
                Err(err) if attempt < attempts && err.kind().is_retryable() => {
                    let delay = self.config.backoff.delay_for(&err);
                    warn!(
                        url,
                        attempt,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(url, attempt, error = %err, "Fetch failed");
                    return Err(err);
                }
            }
        }
    }

    /// One attempt: fresh headers, cache-busted URL, hard timeout.
    ///
    /// The timeout covers the wait for a domain permit as well as the request.
    pub async fn fetch(&self, url: &str, extra_headers: &HeaderMap) -> FetchResult<String> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        let host = parsed
            .host_str()
            .map(str::to_string)
            .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
        let target = cache_busted(&parsed);

        let mut headers = rotated_headers();
        for (name, value) in extra_headers {
            headers.insert(name.clone(), value.clone());
        }

        let start = Instant::now();
        let timeout = self.config.timeout();

        // Waiting on the domain limiter counts against the timeout
        let request = async {
            let _permit = self.limiter.acquire(&host).await?;
            self.send(target, headers, url).await
        };
        let result = match tokio::time::timeout(timeout, request).await {
            Ok(inner) => inner,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        Metrics::fetch_latency(&host, elapsed_ms);
        match &result {
            Ok(body) => {
                Metrics::fetch_attempt(&host, "ok");
                debug!(url, bytes = body.len(), elapsed_ms, "Fetched");
            }
            Err(err) => Metrics::fetch_attempt(&host, err.outcome_label()),
        }
        result
    }

    async fn send(&self, target: Url, headers: HeaderMap, url: &str) -> FetchResult<String> {
        let response = self
            .client
            .get(target)
            .headers(headers)
            .send()
            .await
            .map_err(|e| self.classify(e, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                code: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.text().await.map_err(|e| self.classify(e, url))
    }

    fn classify(&self, err: reqwest::Error, url: &str) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout_ms: self.config.timeout().as_millis() as u64,
            }
        } else if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}
