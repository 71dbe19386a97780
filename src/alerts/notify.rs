//! 通知渠道：终端输出 + Bark + Webhook

use anyhow::{Context, Result};
use chrono::Local;
use reqwest::Url;
use reqwest_middleware::ClientWithMiddleware;
use tracing::{error, info, warn};

use crate::config::NotifyConfig;

/// 一条推送
#[derive(Debug, Clone)]
pub struct Notification {
    /// 标题（操作类型）
    pub title: String,
    /// 正文
    pub body: String,
    /// Bark 分组
    pub group: Option<String>,
}

/// 通知器
pub struct Notifier {
    /// Bark 服务地址
    bark_server: String,
    /// Bark 设备 token
    bark_token: Option<String>,
    /// Webhook URL
    webhook_url: Option<String>,
    /// HTTP 客户端
    http_client: ClientWithMiddleware,
}

impl Notifier {
    pub fn new(config: &NotifyConfig, http_client: ClientWithMiddleware) -> Self {
        Self {
            bark_server: config.bark_server.clone(),
            bark_token: config.bark_token.clone(),
            webhook_url: config.webhook_url.clone(),
            http_client,
        }
    }

    /// 发送通知，任一远程渠道失败时返回错误（终端输出总是执行）
    pub async fn send(&self, notification: &Notification) -> Result<()> {
        self.send_terminal(notification);

        let mut failures = Vec::new();

        match &self.bark_token {
            Some(token) => {
                if let Err(e) = self.send_bark(token, notification).await {
                    error!("Bark push failed: {:#}", e);
                    failures.push("bark");
                }
            }
            None => warn!("BARK_TOKEN not configured, skipping Bark push"),
        }

        if let Some(url) = &self.webhook_url {
            if let Err(e) = self.send_webhook(url, notification).await {
                error!("Webhook error: {:#}", e);
                failures.push("webhook");
            }
        }

        if !failures.is_empty() {
            anyhow::bail!("Notification failed on: {}", failures.join(", "));
        }
        Ok(())
    }

    /// 终端输出通知
    fn send_terminal(&self, notification: &Notification) {
        info!("📣 [{}]\n{}", notification.title, notification.body);
    }

    /// Bark 推送：GET {server}/{token}/{title}/{body}?group=
    async fn send_bark(&self, token: &str, notification: &Notification) -> Result<()> {
        let url = bark_url(&self.bark_server, token, notification)?;

        let resp = self
            .http_client
            .get(url)
            .send()
            .await
            .context("Bark request failed")?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("Bark failed: HTTP {}", status);
        }

        let json: serde_json::Value = resp.json().await.context("Invalid Bark response")?;
        check_bark_response(&json)?;
        info!("Bark push delivered: {}", notification.title);
        Ok(())
    }

    /// Webhook 通知（支持飞书/Slack 格式）
    async fn send_webhook(&self, url: &str, notification: &Notification) -> Result<()> {
        let payload = webhook_payload(url, notification);

        let resp = self
            .http_client
            .post(url)
            .body(payload.to_string())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .context("Webhook request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("Webhook failed: HTTP {}", resp.status());
        }
        Ok(())
    }
}

/// 构造 Bark URL，标题与正文作为路径段自动转义
pub fn bark_url(server: &str, token: &str, notification: &Notification) -> Result<Url> {
    let mut url = Url::parse(server).with_context(|| format!("Invalid Bark server: {}", server))?;

    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Bark server cannot be a base: {}", server))?
        .pop_if_empty()
        .push(token)
        .push(&notification.title)
        .push(&notification.body);

    if let Some(group) = &notification.group {
        url.query_pairs_mut().append_pair("group", group);
    }

    Ok(url)
}

/// Bark 返回 `{"code":200,"message":"success"}`
fn check_bark_response(json: &serde_json::Value) -> Result<()> {
    match json.get("code").and_then(|c| c.as_i64()) {
        Some(200) => Ok(()),
        Some(code) => anyhow::bail!(
            "Bark rejected push: code={} message={}",
            code,
            json.get("message").and_then(|m| m.as_str()).unwrap_or("")
        ),
        None => anyhow::bail!("Unexpected Bark response: {}", json),
    }
}

/// 通用 JSON payload（兼容飞书和 Slack）
fn webhook_payload(url: &str, notification: &Notification) -> serde_json::Value {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S");
    if url.contains("feishu") || url.contains("lark") {
        // 飞书格式
        serde_json::json!({
            "msg_type": "text",
            "content": {
                "text": format!("[{}]\n{}\n时间: {}", notification.title, notification.body, now)
            }
        })
    } else {
        // Slack 格式
        serde_json::json!({
            "text": format!("*[{}]*\n{}\n_时间: {}_", notification.title, notification.body, now)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn notification(group: Option<&str>) -> Notification {
        Notification {
            title: "加仓".to_string(),
            body: "📅 日期：2025-05-19\n📌 建议操作：✅ 加仓 3 手".to_string(),
            group: group.map(|g| g.to_string()),
        }
    }

    #[test]
    fn test_bark_url_encodes_segments() {
        let url = bark_url("https://api.day.app/", "abc123", &notification(Some("小米"))).unwrap();
        let s = url.as_str();
        assert!(s.starts_with("https://api.day.app/abc123/"));
        // 换行与中文需转义，原文不得出现在 URL 中
        assert!(!s.contains('\n'));
        assert!(s.contains("%0A"));
        assert!(s.contains("group="));

        let segments: Vec<&str> = url.path_segments().unwrap().collect();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], "abc123");
    }

    #[test]
    fn test_bark_url_without_group() {
        let url = bark_url("https://bark.example.com/push", "t", &notification(None)).unwrap();
        assert!(url.as_str().starts_with("https://bark.example.com/push/t/"));
        assert!(url.query().is_none());
    }

    #[test]
    fn test_check_bark_response() {
        assert!(check_bark_response(&json!({"code": 200, "message": "success"})).is_ok());
        assert!(check_bark_response(&json!({"code": 400, "message": "failed to get device token"})).is_err());
        assert!(check_bark_response(&json!({})).is_err());
    }

    #[test]
    fn test_webhook_payload_formats() {
        let n = notification(None);
        let feishu = webhook_payload("https://open.feishu.cn/open-apis/bot/v2/hook/x", &n);
        assert_eq!(feishu["msg_type"], "text");
        assert!(feishu["content"]["text"].as_str().unwrap().starts_with("[加仓]"));

        let slack = webhook_payload("https://hooks.slack.com/services/x", &n);
        assert!(slack["text"].as_str().unwrap().starts_with("*[加仓]*"));
    }
}
