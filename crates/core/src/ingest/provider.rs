use crate::config::Settings;
use crate::ingest::types::{LookupApp, LookupResponse, RssResponse};
use anyhow::{Context, Result};
use std::fmt;
use std::time::Duration;

const DEFAULT_RSS_BASE_URL: &str = "https://rss.marketingtools.apple.com/api/v2";
const DEFAULT_LOOKUP_BASE_URL: &str = "https://itunes.apple.com";
const DEFAULT_TIMEOUT_SECS: u64 = 20;
const DEFAULT_RETRIES: u32 = 3;
const USER_AGENT: &str = "chartpulse/0.1";

pub fn valid_chart(chart: &str) -> bool {
    matches!(chart, "top-free" | "top-paid")
}

/// Yields ranked chart feeds. The returned string is the source URL the
/// feed was fetched from, persisted alongside the snapshot.
#[async_trait::async_trait]
pub trait ChartProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_top_chart(
        &self,
        country: &str,
        chart: &str,
        limit: i32,
    ) -> Result<(RssResponse, String)>;
}

#[derive(Debug)]
struct HttpStatusError {
    status: reqwest::StatusCode,
}

impl fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chart feed request failed: HTTP {}", self.status)
    }
}

impl std::error::Error for HttpStatusError {}

fn is_retryable(err: &anyhow::Error) -> bool {
    if let Some(status_err) = err.downcast_ref::<HttpStatusError>() {
        return status_err.status.is_server_error()
            || status_err.status == reqwest::StatusCode::TOO_MANY_REQUESTS;
    }
    // Transport-level failures (timeouts, connection resets) are retried.
    err.downcast_ref::<reqwest::Error>().is_some()
}

#[derive(Debug, Clone)]
pub struct RssChartClient {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
}

impl RssChartClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .rss_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_RSS_BASE_URL.to_string());

        let timeout_secs = std::env::var("CHART_FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("CHART_FETCH_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build chart feed http client")?;

        Ok(Self {
            http,
            base_url,
            retries,
        })
    }

    fn url(&self, country: &str, chart: &str, limit: i32) -> String {
        format!(
            "{}/{country}/apps/{chart}/{limit}/apps.json",
            self.base_url.trim_end_matches('/')
        )
    }

    async fn fetch_once(&self, url: &str) -> Result<RssResponse> {
        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("chart feed request failed")?;

        let status = res.status();
        if !status.is_success() {
            return Err(HttpStatusError { status }.into());
        }

        let parsed = res
            .json::<RssResponse>()
            .await
            .context("failed to parse chart feed response")?;
        Ok(parsed)
    }
}

#[async_trait::async_trait]
impl ChartProvider for RssChartClient {
    fn provider_name(&self) -> &'static str {
        "appstore_rss"
    }

    async fn fetch_top_chart(
        &self,
        country: &str,
        chart: &str,
        limit: i32,
    ) -> Result<(RssResponse, String)> {
        anyhow::ensure!(valid_chart(chart), "invalid chart: {chart}");

        let url = self.url(country, chart, limit);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(&url).await {
                Ok(parsed) => return Ok((parsed, url)),
                Err(err) => {
                    if attempt >= self.retries || !is_retryable(&err) {
                        return Err(err);
                    }
                    let backoff = Duration::from_millis(500 * u64::from(attempt));
                    tracing::warn!(attempt, ?backoff, error = %err, "chart feed fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// iTunes lookup client for per-app popularity enrichment. A lookup that
/// finds no match is `Ok(None)`, not an error; callers treat any failure
/// here as non-fatal.
#[derive(Debug, Clone)]
pub struct LookupClient {
    http: reqwest::Client,
    base_url: String,
}

impl LookupClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .lookup_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_LOOKUP_BASE_URL.to_string());

        let timeout_secs = std::env::var("CHART_FETCH_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build lookup http client")?;

        Ok(Self { http, base_url })
    }

    pub async fn lookup_app(&self, app_id: &str, country: &str) -> Result<Option<LookupApp>> {
        let url = format!("{}/lookup", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .get(url)
            .query(&[("id", app_id), ("country", country)])
            .send()
            .await
            .context("lookup request failed")?;

        let status = res.status();
        if !status.is_success() {
            anyhow::bail!("lookup request failed: HTTP {status}");
        }

        let parsed = res
            .json::<LookupResponse>()
            .await
            .context("failed to parse lookup response")?;

        if parsed.result_count < 1 || parsed.results.is_empty() {
            return Ok(None);
        }
        Ok(parsed.results.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_charts_only() {
        assert!(valid_chart("top-free"));
        assert!(valid_chart("top-paid"));
        assert!(!valid_chart("top-grossing"));
        assert!(!valid_chart(""));
    }

    #[test]
    fn builds_feed_url() {
        let settings = Settings {
            database_url: None,
            sentry_dsn: None,
            themes_path: None,
            country: None,
            chart: None,
            rss_base_url: Some("https://example.invalid/api/v2/".to_string()),
            lookup_base_url: None,
        };
        let client = RssChartClient::from_settings(&settings).unwrap();
        assert_eq!(
            client.url("kr", "top-free", 25),
            "https://example.invalid/api/v2/kr/apps/top-free/25/apps.json"
        );
    }

    #[test]
    fn status_errors_classify_for_retry() {
        let retryable = anyhow::Error::new(HttpStatusError {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        });
        assert!(is_retryable(&retryable));

        let throttled = anyhow::Error::new(HttpStatusError {
            status: reqwest::StatusCode::TOO_MANY_REQUESTS,
        });
        assert!(is_retryable(&throttled));

        let not_found = anyhow::Error::new(HttpStatusError {
            status: reqwest::StatusCode::NOT_FOUND,
        });
        assert!(!is_retryable(&not_found));
    }
}
