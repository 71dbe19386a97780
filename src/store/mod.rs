//! 决策记录存储：Notion 数据库 / 本地 SQLite / 不存储

pub mod notion;
pub mod sqlite;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::{self, AppConfig};
use crate::models::DecisionRecord;

use notion::NotionStore;
use sqlite::SqliteStore;

/// 存储类型（枚举分发）
pub enum DecisionStoreKind {
    Notion(NotionStore),
    Sqlite(SqliteStore),
    None,
}

impl DecisionStoreKind {
    /// 根据配置创建存储；Notion 凭据缺失时退化为不存储
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::build(config, false)
    }

    /// 只读存储（dry-run）：SQLite 文件不存在时不创建，视为无存储
    pub fn from_config_read_only(config: &AppConfig) -> Result<Self> {
        Self::build(config, true)
    }

    fn build(config: &AppConfig, read_only: bool) -> Result<Self> {
        let sc = &config.store;
        match sc.backend.as_str() {
            "notion" => match (&sc.notion_token, &sc.notion_database_id) {
                (Some(token), Some(db)) => {
                    info!("Using Notion decision store");
                    Ok(DecisionStoreKind::Notion(NotionStore::new(
                        token,
                        db,
                        &sc.notion_version,
                        config.data_source.timeout_secs,
                    )?))
                }
                _ => {
                    warn!("NOTION_TOKEN / NOTION_DATABASE_ID not configured, decisions will not be recorded");
                    Ok(DecisionStoreKind::None)
                }
            },
            "sqlite" => {
                let path = sc
                    .sqlite_path
                    .as_ref()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| config::config_dir().join("decisions.db"));
                if !read_only {
                    info!("Using SQLite decision store at {}", path.display());
                    return Ok(DecisionStoreKind::Sqlite(SqliteStore::open(&path)?));
                }
                if !path.exists() {
                    info!("{} does not exist, no decision history", path.display());
                    return Ok(DecisionStoreKind::None);
                }
                info!("Using SQLite decision store at {} (read-only)", path.display());
                Ok(DecisionStoreKind::Sqlite(SqliteStore::open_read_only(&path)?))
            }
            "none" => Ok(DecisionStoreKind::None),
            other => anyhow::bail!("Unknown store backend: {}", other),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DecisionStoreKind::Notion(_) => "Notion",
            DecisionStoreKind::Sqlite(_) => "SQLite",
            DecisionStoreKind::None => "none",
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, DecisionStoreKind::None)
    }

    /// 查询 since 及之后的记录
    pub async fn recent_records(&self, since: NaiveDate) -> Result<Vec<DecisionRecord>> {
        let result = match self {
            DecisionStoreKind::Notion(s) => s.recent_records(since).await,
            DecisionStoreKind::Sqlite(s) => s.recent_records(since),
            DecisionStoreKind::None => Ok(Vec::new()),
        };
        result.with_context(|| format!("Failed to query {} store", self.name()))
    }

    /// 写入一条记录
    pub async fn insert(&self, record: &DecisionRecord) -> Result<()> {
        let result = match self {
            DecisionStoreKind::Notion(s) => s.insert(record).await,
            DecisionStoreKind::Sqlite(s) => s.insert(record),
            DecisionStoreKind::None => Ok(()),
        };
        result.with_context(|| format!("Failed to write {} store", self.name()))
    }
}
