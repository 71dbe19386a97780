//! 行情数据提供者
//!
//! 抽象数据源，支持 AKTools HTTP 服务和本地 JSON 文件两种实现

use std::path::PathBuf;

use anyhow::{Context, Result};
use reqwest_middleware::ClientWithMiddleware;
use tracing::info;

use crate::config::AppConfig;
use crate::models::{DailyKline, Market, StockCode};
use crate::net;

use super::parser;

/// AKTools（akshare HTTP 封装）数据提供者
pub struct AkToolsProvider {
    client: ClientWithMiddleware,
    api: String,
    adjust: String,
}

impl AkToolsProvider {
    pub fn new(client: ClientWithMiddleware, api: &str, adjust: &str) -> Self {
        Self {
            client,
            api: api.to_string(),
            adjust: adjust.to_string(),
        }
    }

    /// 接口名与查询参数
    fn endpoint(&self, code: &StockCode) -> (&'static str, Vec<(&'static str, String)>) {
        match code.market {
            Market::HK => (
                "stock_hk_daily",
                vec![("symbol", code.code.clone()), ("adjust", self.adjust.clone())],
            ),
            Market::SH | Market::SZ => (
                "stock_zh_a_hist",
                vec![
                    ("symbol", code.code.clone()),
                    ("period", "daily".to_string()),
                    ("adjust", self.adjust.clone()),
                ],
            ),
        }
    }

    pub async fn daily_klines(&self, code: &StockCode) -> Result<Vec<DailyKline>> {
        let (name, params) = self.endpoint(code);
        let url = net::join_url(&self.api, &format!("/api/public/{}", name))?;
        let query: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();

        let json = net::get_json(&self.client, &url, &query).await?;
        parser::parse_daily_klines(&json)
    }

    pub fn name(&self) -> &str {
        "AKTools"
    }
}

/// 本地 JSON 文件数据提供者（离线复现）
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn daily_klines(&self, _code: &StockCode) -> Result<Vec<DailyKline>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read kline file: {}", self.path.display()))?;
        let json: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", self.path.display()))?;
        parser::parse_daily_klines(&json)
    }

    pub fn name(&self) -> &str {
        "JSON file"
    }
}

/// 数据源类型（枚举分发，无需 async_trait）
pub enum DataProviderKind {
    AkTools(AkToolsProvider),
    JsonFile(JsonFileProvider),
}

impl DataProviderKind {
    /// 根据配置创建数据提供者
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let ds = &config.data_source;
        match ds.source.as_str() {
            "file" => {
                let path = ds
                    .file_path
                    .as_deref()
                    .context("data_source.file_path is required when source = \"file\"")?;
                info!("Using local JSON kline file: {}", path);
                Ok(DataProviderKind::JsonFile(JsonFileProvider::new(path)))
            }
            "aktools" => {
                info!("Using AKTools data source at {}", ds.aktools_api);
                let client = net::retry_client(ds.timeout_secs, ds.max_retries)?;
                Ok(DataProviderKind::AkTools(AkToolsProvider::new(
                    client,
                    &ds.aktools_api,
                    &ds.adjust,
                )))
            }
            other => anyhow::bail!("Unknown data source: {}", other),
        }
    }

    /// 获取日K线（升序、按日期去重）
    pub async fn daily_klines(&self, code: &StockCode) -> Result<Vec<DailyKline>> {
        let klines = match self {
            DataProviderKind::AkTools(p) => p.daily_klines(code).await,
            DataProviderKind::JsonFile(p) => p.daily_klines(code).await,
        }
        .with_context(|| format!("Failed to fetch daily klines for {}", code))?;

        info!("Fetched {} daily klines for {} from {}", klines.len(), code, self.name());
        Ok(klines)
    }

    pub fn name(&self) -> &str {
        match self {
            DataProviderKind::AkTools(p) => p.name(),
            DataProviderKind::JsonFile(p) => p.name(),
        }
    }
}
