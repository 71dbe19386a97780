//! HTTP 工具：带指数退避重试的 GET 客户端

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, Jitter, RetryTransientMiddleware};
use tracing::debug;

/// 构建带重试的 HTTP 客户端
pub fn retry_client(timeout_secs: u64, max_retries: u32) -> Result<ClientWithMiddleware> {
    let retry_policy = ExponentialBackoff::builder()
        .retry_bounds(Duration::from_secs(1), Duration::from_secs(timeout_secs.max(1)))
        .jitter(Jitter::Bounded)
        .base(2)
        .build_with_max_retries(max_retries);

    let inner = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    Ok(ClientBuilder::new(inner)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// GET 并解析 JSON，非 2xx 视为错误
pub async fn get_json(
    client: &ClientWithMiddleware,
    url: &str,
    query: &[(&str, &str)],
) -> Result<serde_json::Value> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?;

    let status = response.status();
    if !status.is_success() {
        debug!("[HTTP Status Error] {:?}", response);
        anyhow::bail!("GET {} failed: HTTP {}", url, status);
    }

    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read body from {}", url))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Invalid JSON from {}", url))
}

/// 在 base_url 的路径后追加若干段，自动处理多余的 '/'
pub fn join_url(base_url: &str, extend: &str) -> Result<String> {
    let mut url =
        Url::parse(base_url).with_context(|| format!("Invalid base URL: {}", base_url))?;

    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("URL cannot be a base: {}", base_url))?
        .pop_if_empty()
        .extend(extend.split('/').filter(|s| !s.is_empty()));

    Ok(url.to_string())
}
