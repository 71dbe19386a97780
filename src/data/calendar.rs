//! 交易日历：AKTools 历史交易日 / 工作日兜底

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use reqwest_middleware::ClientWithMiddleware;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::net;

use super::parser;

/// 指定时区下的“今天”
pub fn today_in(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// 解析时区名，如 "Asia/Hong_Kong"
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| anyhow::anyhow!("Unknown timezone: {}", name))
}

/// 周一至周五视为交易日
pub struct WeekdayCalendar;

impl WeekdayCalendar {
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

/// AKTools `tool_trade_date_hist_sina` 交易日历
pub struct AkToolsCalendar {
    client: ClientWithMiddleware,
    api: String,
}

impl AkToolsCalendar {
    pub fn new(client: ClientWithMiddleware, api: &str) -> Self {
        Self {
            client,
            api: api.to_string(),
        }
    }

    pub async fn trade_dates(&self) -> Result<Vec<NaiveDate>> {
        let url = net::join_url(&self.api, "/api/public/tool_trade_date_hist_sina")?;
        let json = net::get_json(&self.client, &url, &[]).await?;
        parser::parse_trade_dates(&json)
    }

    pub async fn is_trading_day(&self, date: NaiveDate) -> Result<bool> {
        let dates = self.trade_dates().await?;
        Ok(lookup(&dates, date).unwrap_or_else(|| {
            warn!("Trade calendar does not cover {}, falling back to weekday check", date);
            WeekdayCalendar.is_trading_day(date)
        }))
    }
}

/// 在已排序日历中查找；日期超出日历范围时返回 None
fn lookup(dates: &[NaiveDate], date: NaiveDate) -> Option<bool> {
    let (first, last) = (dates.first()?, dates.last()?);
    if date < *first || date > *last {
        return None;
    }
    Some(dates.binary_search(&date).is_ok())
}

/// 日历类型（枚举分发）
pub enum TradingCalendarKind {
    AkTools(AkToolsCalendar),
    Weekday(WeekdayCalendar),
}

impl TradingCalendarKind {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        match config.calendar.source.as_str() {
            "aktools" => {
                let ds = &config.data_source;
                let client = net::retry_client(ds.timeout_secs, ds.max_retries)?;
                Ok(TradingCalendarKind::AkTools(AkToolsCalendar::new(
                    client,
                    &ds.aktools_api,
                )))
            }
            "weekday" => Ok(TradingCalendarKind::Weekday(WeekdayCalendar)),
            other => anyhow::bail!("Unknown calendar source: {}", other),
        }
    }

    pub async fn is_trading_day(&self, date: NaiveDate) -> Result<bool> {
        let result = match self {
            TradingCalendarKind::AkTools(c) => c
                .is_trading_day(date)
                .await
                .context("Failed to load trade calendar")?,
            TradingCalendarKind::Weekday(c) => c.is_trading_day(date),
        };
        info!("{} trading day check: {}", date, result);
        Ok(result)
    }
}
