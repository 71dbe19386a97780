//! 单次执行流程：交易日 → 行情 → 指标 → 冷却期 → 推送 → 落库

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::alerts::notify::{Notification, Notifier};
use crate::analysis::decision;
use crate::analysis::engine::{self, DailyReport};
use crate::config::{AnalysisConfig, AppConfig};
use crate::data::calendar::TradingCalendarKind;
use crate::data::provider::DataProviderKind;
use crate::models::StockCode;
use crate::net;
use crate::store::DecisionStoreKind;

/// 执行选项
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// 视为“今天”的日期
    pub today: NaiveDate,
    /// 忽略交易日历
    pub force: bool,
    /// 只计算，不推送、不写入
    pub dry_run: bool,
}

/// 执行结果
#[derive(Debug)]
pub enum RunOutcome {
    /// 非交易日
    Skipped,
    /// dry-run：只有日报
    DryRun(DailyReport),
    Completed {
        report: DailyReport,
        /// 推送是否成功
        pushed: bool,
        /// 是否已写入存储
        recorded: bool,
    },
}

pub struct Pipeline {
    pub code: StockCode,
    pub calendar: TradingCalendarKind,
    pub provider: DataProviderKind,
    pub store: DecisionStoreKind,
    pub notifier: Notifier,
    /// 推送分组
    pub group: Option<String>,
    pub analysis: AnalysisConfig,
}

impl Pipeline {
    /// 按配置组装；dry-run 时存储只读打开
    pub fn from_config(config: &AppConfig, code: StockCode, dry_run: bool) -> Result<Self> {
        let store = if dry_run {
            DecisionStoreKind::from_config_read_only(config)?
        } else {
            DecisionStoreKind::from_config(config)?
        };
        let http_client =
            net::retry_client(config.data_source.timeout_secs, config.data_source.max_retries)?;

        Ok(Self {
            code,
            calendar: TradingCalendarKind::from_config(config)?,
            provider: DataProviderKind::from_config(config)?,
            store,
            notifier: Notifier::new(&config.notify, http_client),
            group: config
                .notify
                .group
                .clone()
                .or_else(|| Some(config.stock.name.clone())),
            analysis: config.analysis.clone(),
        })
    }

    pub async fn run(&self, opts: RunOptions) -> Result<RunOutcome> {
        let today = opts.today;

        // 交易日判断
        if !opts.force && !self.calendar.is_trading_day(today).await? {
            info!("❌ {} 不是交易日，跳过执行", today);
            return Ok(RunOutcome::Skipped);
        }

        // 行情 + 指标
        let klines = self.provider.daily_klines(&self.code).await?;
        let snapshot = engine::analyze(&self.code, &klines, today, &self.analysis)?;

        // 冷却期查询
        let recently_added = match snapshot.cooldown_start(self.analysis.add_interval_days) {
            Some(since) if self.store.is_enabled() => {
                let records = self.store.recent_records(since).await?;
                info!("{} 条决策记录位于冷却期（自 {}）", records.len(), since);
                decision::recently_added(&records)
            }
            _ => false,
        };

        let report = snapshot.conclude(recently_added, &self.analysis);

        if opts.dry_run {
            return Ok(RunOutcome::DryRun(report));
        }

        // 推送失败不影响落库
        let notification = Notification {
            title: report.title().to_string(),
            body: report.message(),
            group: self.group.clone(),
        };
        let pushed = match self.notifier.send(&notification).await {
            Ok(()) => true,
            Err(e) => {
                warn!("推送失败: {:#}", e);
                false
            }
        };

        let recorded = self.store.is_enabled();
        if recorded {
            self.store.insert(&report.to_record()).await?;
            info!("✅ 决策已写入 {}（默认操作为无操作）", self.store.name());
        } else {
            info!("未配置存储，决策未记录");
        }

        Ok(RunOutcome::Completed {
            report,
            pushed,
            recorded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotifyConfig;
    use crate::data::calendar::WeekdayCalendar;
    use crate::data::provider::JsonFileProvider;
    use crate::models::{
        Advice, Category, DailyKline, DecisionRecord, ExecutedAction, Market,
    };
    use crate::store::sqlite::SqliteStore;
    use chrono::{Datelike, Duration, Weekday};
    use std::path::PathBuf;

    fn is_weekend(date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// 从 2025-03-03 起逐个工作日生成K线
    fn make_klines(closes: &[f64]) -> Vec<DailyKline> {
        let mut date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let mut out = Vec::new();
        for &c in closes {
            out.push(DailyKline {
                date,
                open: c,
                high: c + 0.5,
                low: c - 0.5,
                close: c,
                volume: 1_000_000.0,
            });
            date += Duration::days(1);
            while is_weekend(date) {
                date += Duration::days(1);
            }
        }
        out
    }

    /// 回撤约 28%，无冷却时命中最高档
    fn deep_drop() -> Vec<DailyKline> {
        let mut closes = vec![50.0; 5];
        closes.extend([55.0, 60.0, 58.0]);
        closes.extend((0..21).map(|i| 57.0 - i as f64 * 0.7));
        make_klines(&closes)
    }

    fn next_trading_day(date: NaiveDate) -> NaiveDate {
        let mut next = date + Duration::days(1);
        while is_weekend(next) {
            next += Duration::days(1);
        }
        next
    }

    fn write_klines(name: &str, klines: &[DailyKline]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "hkwatch-pipeline-{}-{}.json",
            name,
            std::process::id()
        ));
        std::fs::write(&path, serde_json::to_string(klines).unwrap()).unwrap();
        path
    }

    /// Bark 指向不可达地址，推送必然失败
    fn unreachable_notifier() -> Notifier {
        let config = NotifyConfig {
            bark_server: "http://127.0.0.1:1".to_string(),
            bark_token: Some("token".to_string()),
            group: None,
            webhook_url: None,
        };
        Notifier::new(&config, net::retry_client(2, 0).unwrap())
    }

    fn pipeline(path: PathBuf) -> Pipeline {
        Pipeline {
            code: StockCode::new(Market::HK, "01810"),
            calendar: TradingCalendarKind::Weekday(WeekdayCalendar),
            provider: DataProviderKind::JsonFile(JsonFileProvider::new(path)),
            store: DecisionStoreKind::Sqlite(SqliteStore::in_memory().unwrap()),
            notifier: unreachable_notifier(),
            group: Some("小米".to_string()),
            analysis: AnalysisConfig::default(),
        }
    }

    fn opts(today: NaiveDate, dry_run: bool) -> RunOptions {
        RunOptions {
            today,
            force: false,
            dry_run,
        }
    }

    fn added_record(date: NaiveDate) -> DecisionRecord {
        DecisionRecord {
            date,
            title: "HK$45.00（-1.00%）".to_string(),
            category: Category::AddPosition,
            decline_text: String::new(),
            drawdown_text: String::new(),
            kdj_daily_j: None,
            kdj_weekly_j: None,
            advice: "✅ 加仓 5 手".to_string(),
            executed: ExecutedAction::Added,
            note: String::new(),
        }
    }

    fn dry_run_report(outcome: RunOutcome) -> DailyReport {
        match outcome {
            RunOutcome::DryRun(report) => report,
            other => panic!("expected a dry run, got {:?}", other),
        }
    }

    fn epoch() -> NaiveDate {
        NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn test_push_failure_still_records() {
        let klines = deep_drop();
        let last = klines.last().unwrap().date;
        let path = write_klines("push-fail", &klines);
        let p = pipeline(path.clone());

        let outcome = p.run(opts(next_trading_day(last), false)).await.unwrap();
        let (report, pushed, recorded) = match outcome {
            RunOutcome::Completed {
                report,
                pushed,
                recorded,
            } => (report, pushed, recorded),
            other => panic!("expected a completed run, got {:?}", other),
        };
        assert!(!pushed);
        assert!(recorded);
        assert_eq!(report.advice, Advice::AddPosition { lots: 5 });

        let rows = p.store.recent_records(epoch()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, last);
        assert_eq!(rows[0].executed, ExecutedAction::None);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let klines = deep_drop();
        let last = klines.last().unwrap().date;
        let path = write_klines("dry-run", &klines);
        let p = pipeline(path.clone());

        let outcome = p.run(opts(next_trading_day(last), true)).await.unwrap();
        let report = dry_run_report(outcome);
        assert_eq!(report.category(), Category::AddPosition);
        assert!(p.store.recent_records(epoch()).await.unwrap().is_empty());
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_recent_add_blocks_add_position() {
        let klines = deep_drop();
        let last = klines.last().unwrap().date;
        let previous = klines[klines.len() - 2].date;
        let path = write_klines("cooldown", &klines);
        let p = pipeline(path.clone());

        if let DecisionStoreKind::Sqlite(store) = &p.store {
            store.insert(&added_record(previous)).unwrap();
        }

        let outcome = p.run(opts(next_trading_day(last), true)).await.unwrap();
        let report = dry_run_report(outcome);
        assert!(report.recently_added);
        assert_eq!(report.advice, Advice::NoAction);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_add_outside_cooldown_window_is_ignored() {
        let klines = deep_drop();
        let last = klines.last().unwrap().date;
        let path = write_klines("old-add", &klines);
        let p = pipeline(path.clone());

        if let DecisionStoreKind::Sqlite(store) = &p.store {
            store.insert(&added_record(klines[0].date)).unwrap();
        }

        let outcome = p.run(opts(next_trading_day(last), true)).await.unwrap();
        let report = dry_run_report(outcome);
        assert!(!report.recently_added);
        assert_eq!(report.advice, Advice::AddPosition { lots: 5 });
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_weekend_skips_before_fetch() {
        // 文件不存在：若进入取数阶段会报错
        let p = pipeline(std::env::temp_dir().join("hkwatch-pipeline-missing.json"));
        let saturday = NaiveDate::from_ymd_opt(2025, 6, 7).unwrap();

        let outcome = p.run(opts(saturday, false)).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Skipped));
        assert!(p.store.recent_records(epoch()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_force_ignores_calendar() {
        let klines = make_klines(&[50.0, 50.5, 51.0]);
        let path = write_klines("force", &klines);
        let p = pipeline(path.clone());
        let saturday = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();

        let outcome = p
            .run(RunOptions {
                today: saturday,
                force: true,
                dry_run: true,
            })
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::DryRun(_)));
        let _ = std::fs::remove_file(path);
    }
}
