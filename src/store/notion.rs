//! Notion 数据库存储
//!
//! 每条决策一页（一行），用户在 Notion 中手动回填“已执行操作”。

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::models::{Category, DecisionRecord, ExecutedAction};

const NOTION_API: &str = "https://api.notion.com/v1";

/// 列名
mod prop {
    pub const TITLE: &str = "当前股价（涨跌幅）";
    pub const DATE: &str = "日期";
    pub const CATEGORY: &str = "类型";
    pub const DECLINE: &str = "20日跌幅";
    pub const DRAWDOWN: &str = "回撤";
    pub const KDJ_DAILY: &str = "KDJ 日线 J";
    pub const KDJ_WEEKLY: &str = "KDJ 周线 J";
    pub const ADVICE: &str = "建议操作";
    pub const EXECUTED: &str = "已执行操作";
    pub const NOTE: &str = "备注";
}

/// 单次查询最多翻页次数
const MAX_PAGES: usize = 20;

pub struct NotionStore {
    client: reqwest::Client,
    api: String,
    token: String,
    database_id: String,
    version: String,
}

impl NotionStore {
    pub fn new(token: &str, database_id: &str, version: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build Notion HTTP client")?;
        Ok(Self {
            client,
            api: NOTION_API.to_string(),
            token: token.to_string(),
            database_id: database_id.to_string(),
            version: version.to_string(),
        })
    }

    /// 替换 API 地址（自建代理）
    pub fn with_api(mut self, api: &str) -> Self {
        self.api = api.trim_end_matches('/').to_string();
        self
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.api, path);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.version)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;

        let status = resp.status();
        let json: Value = resp.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            anyhow::bail!(
                "Notion API {} failed: HTTP {} {}",
                path,
                status,
                json.get("message").and_then(|m| m.as_str()).unwrap_or("")
            );
        }
        Ok(json)
    }

    /// 查询 since 及之后的记录（自动翻页）
    pub async fn recent_records(&self, since: NaiveDate) -> Result<Vec<DecisionRecord>> {
        let path = format!("/databases/{}/query", self.database_id);
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let body = query_body(since, cursor.as_deref());
            let json = self.post(&path, &body).await?;
            let (mut page, next) = parse_query_response(&json)?;
            records.append(&mut page);

            cursor = next;
            if cursor.is_none() {
                break;
            }
        }

        if cursor.is_some() {
            warn!(
                "Notion query stopped after {} pages with more results pending; cooldown check may be incomplete",
                MAX_PAGES
            );
        }

        debug!("Notion returned {} records since {}", records.len(), since);
        Ok(records)
    }

    /// 新建一行
    pub async fn insert(&self, record: &DecisionRecord) -> Result<()> {
        let body = page_body(&self.database_id, record);
        let json = self.post("/pages", &body).await?;
        info!(
            "Notion page created: {}",
            json.get("id").and_then(|v| v.as_str()).unwrap_or("?")
        );
        Ok(())
    }
}

/// 查询请求体：日期 on_or_after since
pub fn query_body(since: NaiveDate, cursor: Option<&str>) -> Value {
    let mut body = json!({
        "filter": {
            "property": prop::DATE,
            "date": { "on_or_after": since.format("%Y-%m-%d").to_string() }
        },
        "page_size": 100
    });
    if let Some(c) = cursor {
        body["start_cursor"] = json!(c);
    }
    body
}

fn rich_text(content: &str) -> Value {
    json!([{ "text": { "content": content } }])
}

fn select(name: &str) -> Value {
    json!({ "name": name })
}

/// 新建页面请求体
pub fn page_body(database_id: &str, record: &DecisionRecord) -> Value {
    let mut props = serde_json::Map::new();
    props.insert(prop::TITLE.into(), json!({ "title": rich_text(&record.title) }));
    props.insert(
        prop::DATE.into(),
        json!({ "date": { "start": record.date.format("%Y-%m-%d").to_string() } }),
    );
    props.insert(
        prop::CATEGORY.into(),
        json!({ "select": select(record.category.as_str()) }),
    );
    props.insert(prop::DECLINE.into(), json!({ "rich_text": rich_text(&record.decline_text) }));
    props.insert(prop::DRAWDOWN.into(), json!({ "rich_text": rich_text(&record.drawdown_text) }));
    props.insert(prop::KDJ_DAILY.into(), json!({ "number": record.kdj_daily_j }));
    props.insert(prop::KDJ_WEEKLY.into(), json!({ "number": record.kdj_weekly_j }));
    props.insert(prop::ADVICE.into(), json!({ "select": select(&record.advice) }));
    props.insert(
        prop::EXECUTED.into(),
        json!({ "select": select(record.executed.as_str()) }),
    );
    props.insert(prop::NOTE.into(), json!({ "rich_text": rich_text(&record.note) }));

    json!({
        "parent": { "database_id": database_id },
        "properties": Value::Object(props),
    })
}

/// 解析查询结果，返回 (记录, next_cursor)
pub fn parse_query_response(json: &Value) -> Result<(Vec<DecisionRecord>, Option<String>)> {
    let results = json
        .get("results")
        .and_then(|r| r.as_array())
        .context("Notion query response has no results array")?;

    let records = results
        .iter()
        .filter_map(|page| page.get("properties").and_then(parse_page))
        .collect();

    let has_more = json.get("has_more").and_then(|v| v.as_bool()).unwrap_or(false);
    let next = if has_more {
        json.get("next_cursor")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    } else {
        None
    };

    Ok((records, next))
}

fn select_name<'a>(props: &'a Value, key: &str) -> Option<&'a str> {
    props.get(key)?.get("select")?.get("name")?.as_str()
}

fn plain_text(props: &Value, key: &str, kind: &str) -> String {
    props
        .get(key)
        .and_then(|p| p.get(kind))
        .and_then(|v| v.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|t| {
                    t.get("plain_text")
                        .or_else(|| t.get("text").and_then(|x| x.get("content")))
                        .and_then(|s| s.as_str())
                })
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn parse_page(props: &Value) -> Option<DecisionRecord> {
    let date_str = props.get(prop::DATE)?.get("date")?.get("start")?.as_str()?;
    let date = NaiveDate::parse_from_str(date_str.get(..10)?, "%Y-%m-%d").ok()?;

    let number = |key: &str| props.get(key).and_then(|p| p.get("number")).and_then(|n| n.as_f64());

    Some(DecisionRecord {
        date,
        title: plain_text(props, prop::TITLE, "title"),
        category: select_name(props, prop::CATEGORY)
            .and_then(Category::from_name)
            .unwrap_or(Category::NoAction),
        decline_text: plain_text(props, prop::DECLINE, "rich_text"),
        drawdown_text: plain_text(props, prop::DRAWDOWN, "rich_text"),
        kdj_daily_j: number(prop::KDJ_DAILY),
        kdj_weekly_j: number(prop::KDJ_WEEKLY),
        advice: select_name(props, prop::ADVICE).unwrap_or_default().to_string(),
        executed: ExecutedAction::from_name(select_name(props, prop::EXECUTED).unwrap_or("")),
        note: plain_text(props, prop::NOTE, "rich_text"),
    })
}
