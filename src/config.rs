use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analysis::decision::{default_tiers, Tier};

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 通用配置
    #[serde(default)]
    pub general: GeneralConfig,

    /// 标的配置
    #[serde(default)]
    pub stock: StockConfig,

    /// 行情数据源配置
    #[serde(default)]
    pub data_source: DataSourceConfig,

    /// 交易日历配置
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// 分析与决策阈值
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// 推送配置
    #[serde(default)]
    pub notify: NotifyConfig,

    /// 决策记录存储配置
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockConfig {
    /// 股票代码，如 "HK.01810"
    #[serde(default = "default_stock_code")]
    pub code: String,

    /// 股票名称（仅用于日志与推送分组）
    #[serde(default = "default_stock_name")]
    pub name: String,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            code: default_stock_code(),
            name: default_stock_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
    /// 数据源类型: "aktools" | "file"
    #[serde(default = "default_source")]
    pub source: String,

    /// AKTools HTTP 服务地址
    #[serde(default = "default_aktools_api")]
    pub aktools_api: String,

    /// 复权方式："" 不复权 | "qfq" | "hfq"
    #[serde(default)]
    pub adjust: String,

    /// source = "file" 时读取的 JSON 文件
    pub file_path: Option<String>,

    /// 单次请求超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// 失败重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            aktools_api: default_aktools_api(),
            adjust: String::new(),
            file_path: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// 日历来源: "aktools" | "weekday"
    #[serde(default = "default_calendar_source")]
    pub source: String,

    /// 判断“今天”所用时区
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            source: default_calendar_source(),
            timezone: default_timezone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// 跌幅回看交易日数
    #[serde(default = "default_decline_lookback")]
    pub decline_lookback_days: usize,

    /// KDJ RSV 窗口
    #[serde(default = "default_kdj_window")]
    pub kdj_window: usize,

    /// 日线 KDJ 使用最近多少根K线
    #[serde(default = "default_daily_kdj_bars")]
    pub daily_kdj_bars: usize,

    /// 周线 KDJ 使用最近多少根K线
    #[serde(default = "default_weekly_kdj_bars")]
    pub weekly_kdj_bars: usize,

    /// 是否计算周线 KDJ
    #[serde(default = "default_true")]
    pub weekly_kdj_enabled: bool,

    /// 加仓分档（按顺序匹配，先写高档）
    #[serde(default = "default_tiers")]
    pub tiers: Vec<Tier>,

    /// 加仓冷却期（交易日）
    #[serde(default = "default_add_interval_days")]
    pub add_interval_days: usize,

    /// 定投起始日（每月该日及之后的第一个交易日）
    #[serde(default = "default_invest_start_day")]
    pub invest_start_day: u32,

    /// 定投手数
    #[serde(default = "default_invest_lots")]
    pub invest_lots: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            decline_lookback_days: default_decline_lookback(),
            kdj_window: default_kdj_window(),
            daily_kdj_bars: default_daily_kdj_bars(),
            weekly_kdj_bars: default_weekly_kdj_bars(),
            weekly_kdj_enabled: true,
            tiers: default_tiers(),
            add_interval_days: default_add_interval_days(),
            invest_start_day: default_invest_start_day(),
            invest_lots: default_invest_lots(),
        }
    }
}

impl AnalysisConfig {
    /// 跌幅提示阈值（最低档）
    pub fn decline_hint_threshold(&self) -> f64 {
        self.tiers
            .iter()
            .map(|t| t.decline)
            .fold(f64::INFINITY, f64::min)
    }

    /// 回撤提示阈值（最低档）
    pub fn drawdown_hint_threshold(&self) -> f64 {
        self.tiers
            .iter()
            .map(|t| t.drawdown)
            .fold(f64::INFINITY, f64::min)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Bark 服务地址
    #[serde(default = "default_bark_server")]
    pub bark_server: String,

    /// Bark 设备 token（环境变量 BARK_TOKEN 优先）
    pub bark_token: Option<String>,

    /// Bark 推送分组
    pub group: Option<String>,

    /// Webhook URL（可选，飞书/Slack）
    pub webhook_url: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            bark_server: default_bark_server(),
            bark_token: None,
            group: None,
            webhook_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// 存储后端: "notion" | "sqlite" | "none"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Notion integration token（环境变量 NOTION_TOKEN 优先）
    pub notion_token: Option<String>,

    /// Notion 数据库 ID（环境变量 NOTION_DATABASE_ID 优先）
    pub notion_database_id: Option<String>,

    /// Notion API 版本
    #[serde(default = "default_notion_version")]
    pub notion_version: String,

    /// SQLite 文件路径（留空则使用 ~/.config/hkwatch/decisions.db）
    pub sqlite_path: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            notion_token: None,
            notion_database_id: None,
            notion_version: default_notion_version(),
            sqlite_path: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_stock_code() -> String {
    "HK.01810".to_string()
}

fn default_stock_name() -> String {
    "小米集团".to_string()
}

fn default_source() -> String {
    "aktools".to_string()
}

fn default_aktools_api() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_calendar_source() -> String {
    "aktools".to_string()
}

fn default_timezone() -> String {
    "Asia/Hong_Kong".to_string()
}

fn default_decline_lookback() -> usize {
    20
}

fn default_kdj_window() -> usize {
    9
}

fn default_daily_kdj_bars() -> usize {
    60
}

fn default_weekly_kdj_bars() -> usize {
    30
}

fn default_add_interval_days() -> usize {
    10
}

fn default_invest_start_day() -> u32 {
    16
}

fn default_invest_lots() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_bark_server() -> String {
    "https://api.day.app".to_string()
}

fn default_store_backend() -> String {
    "notion".to_string()
}

fn default_notion_version() -> String {
    "2022-06-28".to_string()
}

impl AppConfig {
    /// 从文件加载配置
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
    }

    /// 解析 TOML 文本
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "Failed to parse config TOML")?;
        Ok(config)
    }

    /// 从默认位置加载，如果不存在则使用默认配置
    pub fn load_or_default() -> Self {
        let candidates = [
            PathBuf::from("config/config.toml"),
            PathBuf::from("config.toml"),
            config_dir().join("config.toml"),
        ];

        for path in &candidates {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }

        tracing::info!("Using default configuration");
        Self::default()
    }

    /// 用环境变量覆盖敏感配置
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    fn apply_env_with(&mut self, get: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("BARK_TOKEN") {
            self.notify.bark_token = Some(token);
        }
        if let Some(token) = non_empty("NOTION_TOKEN") {
            self.store.notion_token = Some(token);
        }
        if let Some(id) = non_empty("NOTION_DATABASE_ID") {
            self.store.notion_database_id = Some(id);
        }
    }
}

/// 配置与本地数据目录：~/.config/hkwatch
pub fn config_dir() -> PathBuf {
    dirs_home().join(".config/hkwatch")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.stock.code, "HK.01810");
        assert_eq!(config.analysis.decline_lookback_days, 20);
        assert_eq!(config.analysis.add_interval_days, 10);
        assert_eq!(config.analysis.tiers.len(), 3);
        assert_eq!(config.analysis.tiers[0].lots, 5);
        assert_eq!(config.store.backend, "notion");
        assert_eq!(config.calendar.timezone, "Asia/Hong_Kong");
        assert!(config.analysis.weekly_kdj_enabled);
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            [stock]
            code = "HK.00700"

            [analysis]
            weekly_kdj_enabled = false
            tiers = [
                { decline = 0.3, drawdown = 0.3, lots = 2 },
            ]

            [store]
            backend = "sqlite"
            "#,
        )
        .unwrap();
        assert_eq!(config.stock.code, "HK.00700");
        assert_eq!(config.stock.name, "小米集团");
        assert!(!config.analysis.weekly_kdj_enabled);
        assert_eq!(config.analysis.tiers.len(), 1);
        assert_eq!(config.analysis.kdj_window, 9);
        assert_eq!(config.store.backend, "sqlite");
        assert_eq!(config.store.notion_version, "2022-06-28");
    }

    #[test]
    fn test_hint_thresholds_use_lowest_tier() {
        let config = AnalysisConfig::default();
        assert_eq!(config.decline_hint_threshold(), 0.10);
        assert_eq!(config.drawdown_hint_threshold(), 0.15);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("BARK_TOKEN", "bark123"),
            ("NOTION_TOKEN", "secret_abc"),
            ("NOTION_DATABASE_ID", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.store.notion_database_id = Some("from-file".to_string());
        config.apply_env_with(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.notify.bark_token.as_deref(), Some("bark123"));
        assert_eq!(config.store.notion_token.as_deref(), Some("secret_abc"));
        // 空白环境变量不覆盖文件配置
        assert_eq!(config.store.notion_database_id.as_deref(), Some("from-file"));
    }
}
