//! 本地 SQLite 决策记录
//!
//! 与 Notion 数据库同构的一张表，“已执行操作”通过 `hkwatch mark` 回填。

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OpenFlags};
use tracing::info;

use crate::models::{Category, DecisionRecord, ExecutedAction};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS decisions (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    date        TEXT NOT NULL,
    title       TEXT NOT NULL,
    category    TEXT NOT NULL,
    decline     TEXT NOT NULL,
    drawdown    TEXT NOT NULL,
    kdj_daily   REAL,
    kdj_weekly  REAL,
    advice      TEXT NOT NULL,
    executed    TEXT NOT NULL DEFAULT '无操作',
    note        TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_decisions_date ON decisions(date);
";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// 打开（必要时创建）数据库文件
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create dir: {}", dir.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open decision DB: {}", path.display()))?;
        Self::with_connection(conn)
    }

    /// 只读打开已有数据库，不建目录、不建表
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open decision DB read-only: {}", path.display()))?;
        Ok(Self { conn })
    }

    /// 内存数据库
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize decisions table")?;
        Ok(Self { conn })
    }

    /// 查询 since 及之后的记录（按日期升序）
    pub fn recent_records(&self, since: NaiveDate) -> Result<Vec<DecisionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, title, category, decline, drawdown, kdj_daily, kdj_weekly, advice, executed, note
             FROM decisions WHERE date >= ?1 ORDER BY date, id",
        )?;

        let rows = stmt.query_map(params![since.format("%Y-%m-%d").to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<f64>>(5)?,
                row.get::<_, Option<f64>>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (date, title, category, decline, drawdown, kd, kw, advice, executed, note) = row?;
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date in decisions table: {}", date))?;
            records.push(DecisionRecord {
                date,
                title,
                category: Category::from_name(&category).unwrap_or(Category::NoAction),
                decline_text: decline,
                drawdown_text: drawdown,
                kdj_daily_j: kd,
                kdj_weekly_j: kw,
                advice,
                executed: ExecutedAction::from_name(&executed),
                note,
            });
        }

        Ok(records)
    }

    /// 新增一行
    pub fn insert(&self, record: &DecisionRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO decisions (date, title, category, decline, drawdown, kdj_daily, kdj_weekly, advice, executed, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.date.format("%Y-%m-%d").to_string(),
                record.title,
                record.category.as_str(),
                record.decline_text,
                record.drawdown_text,
                record.kdj_daily_j,
                record.kdj_weekly_j,
                record.advice,
                record.executed.as_str(),
                record.note,
            ],
        )?;
        info!("Decision for {} saved to SQLite", record.date);
        Ok(())
    }

    /// 回填某日的已执行操作，返回更新行数
    pub fn mark_executed(
        &self,
        date: NaiveDate,
        executed: &ExecutedAction,
        note: Option<&str>,
    ) -> Result<usize> {
        let updated = match note {
            Some(note) => self.conn.execute(
                "UPDATE decisions SET executed = ?1, note = ?2 WHERE date = ?3",
                params![executed.as_str(), note, date.format("%Y-%m-%d").to_string()],
            )?,
            None => self.conn.execute(
                "UPDATE decisions SET executed = ?1 WHERE date = ?2",
                params![executed.as_str(), date.format("%Y-%m-%d").to_string()],
            )?,
        };
        Ok(updated)
    }
}
