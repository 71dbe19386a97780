//! AKTools / akshare JSON 解析
//!
//! 行情行格式：`{"date": "2024-01-02T00:00:00.000", "open": 1.0, ...}`，
//! A 股接口使用中文列名（日期/开盘/最高/最低/收盘/成交量）。

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::warn;

use crate::models::DailyKline;

/// 解析日期，只取前 10 个字符（兼容 ISO 日期时间）
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let head = s.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// 数字字段：JSON 数字或数字字符串
fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

/// 按候选列名依次取值
fn field<'a>(row: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| row.get(*k))
}

fn rows(json: &Value) -> Result<&Vec<Value>> {
    json.as_array()
        .ok_or_else(|| anyhow::anyhow!("Expected JSON array, got: {}", short(json)))
}

fn short(json: &Value) -> String {
    let s = json.to_string();
    s.chars().take(120).collect()
}

/// 解析日K线数组：无效行跳过，按日期升序去重（后出现的覆盖）
pub fn parse_daily_klines(json: &Value) -> Result<Vec<DailyKline>> {
    let mut by_date: BTreeMap<NaiveDate, DailyKline> = BTreeMap::new();
    let mut skipped = 0usize;

    for row in rows(json)? {
        match parse_kline_row(row) {
            Some(k) => {
                by_date.insert(k.date, k);
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!("Skipped {} invalid kline rows", skipped);
    }

    Ok(by_date.into_values().collect())
}

fn parse_kline_row(row: &Value) -> Option<DailyKline> {
    let date = field(row, &["date", "日期"])?.as_str().and_then(parse_date)?;
    Some(DailyKline {
        date,
        open: number(field(row, &["open", "开盘"])?)?,
        high: number(field(row, &["high", "最高"])?)?,
        low: number(field(row, &["low", "最低"])?)?,
        close: number(field(row, &["close", "收盘"])?)?,
        volume: field(row, &["volume", "成交量"])
            .and_then(number)
            .unwrap_or(0.0),
    })
}

/// 解析交易日历：`[{"trade_date": "1990-12-19"}, ...]`
pub fn parse_trade_dates(json: &Value) -> Result<Vec<NaiveDate>> {
    let mut dates: Vec<NaiveDate> = rows(json)?
        .iter()
        .filter_map(|row| {
            let v = row.get("trade_date").unwrap_or(row);
            v.as_str().and_then(parse_date)
        })
        .collect();
    dates.sort();
    dates.dedup();
    Ok(dates)
}
