mod alerts;
mod analysis;
mod config;
mod data;
mod models;
mod net;
mod pipeline;
mod store;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::analysis::engine;
use crate::analysis::indicators;
use crate::config::AppConfig;
use crate::data::calendar::{self, TradingCalendarKind};
use crate::data::provider::DataProviderKind;
use crate::models::{ExecutedAction, StockCode};
use crate::pipeline::{Pipeline, RunOutcome};
use crate::store::DecisionStoreKind;

#[derive(Parser)]
#[command(name = "hkwatch", about = "港股定投加仓提醒")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 执行一次：判断交易日 → 拉取行情 → 计算 → 推送 → 记录
    Run {
        /// 以指定日期作为“今天”（YYYY-MM-DD）
        #[arg(long)]
        date: Option<NaiveDate>,
        /// 忽略交易日历
        #[arg(long)]
        force: bool,
        /// 只计算并打印，不推送、不写入
        #[arg(long)]
        dry_run: bool,
    },
    /// 计算并打印日报（等同 run --force --dry-run）
    Check {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// 查询某日是否为交易日
    Calendar {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// 打印最近的日线 K/D/J
    Kdj {
        /// 显示行数
        #[arg(short = 'n', long, default_value_t = 10)]
        days: usize,
    },
    /// 回填某日的已执行操作（仅 SQLite 存储）
    Mark {
        #[arg(long)]
        date: NaiveDate,
        /// 已加仓 / 已定投 / 无操作
        #[arg(long)]
        action: String,
        #[arg(long)]
        note: Option<String>,
    },
}

/// 命令行执行选项
#[derive(Debug, Clone, Copy)]
struct RunOptions {
    date: Option<NaiveDate>,
    force: bool,
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(std::path::Path::new(path))?,
        None => AppConfig::load_or_default(),
    };
    config.apply_env();

    // 初始化日志
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.general.log_level.parse().unwrap_or_default());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Run {
            date,
            force,
            dry_run,
        } => {
            cmd_run(
                &config,
                RunOptions {
                    date,
                    force,
                    dry_run,
                },
            )
            .await
        }
        Commands::Check { date } => {
            cmd_run(
                &config,
                RunOptions {
                    date,
                    force: true,
                    dry_run: true,
                },
            )
            .await
        }
        Commands::Calendar { date } => cmd_calendar(&config, date).await,
        Commands::Kdj { days } => cmd_kdj(&config, days).await,
        Commands::Mark { date, action, note } => cmd_mark(&config, date, &action, note.as_deref()),
    }
}

fn stock_code(config: &AppConfig) -> Result<StockCode> {
    StockCode::parse(&config.stock.code)
        .with_context(|| format!("Invalid stock code: {}", config.stock.code))
}

/// 命令行指定日期优先，否则取配置时区下的今天
fn resolve_today(config: &AppConfig, date: Option<NaiveDate>) -> Result<NaiveDate> {
    match date {
        Some(d) => Ok(d),
        None => {
            let tz = calendar::parse_timezone(&config.calendar.timezone)?;
            Ok(calendar::today_in(tz, Utc::now()))
        }
    }
}

/// 完整流程
async fn cmd_run(config: &AppConfig, opts: RunOptions) -> Result<()> {
    let code = stock_code(config)?;
    let today = resolve_today(config, opts.date)?;
    info!("hkwatch 启动: {} {} 今天={}", code, config.stock.name, today);

    let runner = Pipeline::from_config(config, code, opts.dry_run)?;
    let outcome = runner
        .run(pipeline::RunOptions {
            today,
            force: opts.force,
            dry_run: opts.dry_run,
        })
        .await?;

    match outcome {
        RunOutcome::Skipped => {}
        RunOutcome::DryRun(report) => println!("[{}]\n{}", report.title(), report.message()),
        RunOutcome::Completed { pushed, .. } if !pushed => {
            warn!("本次推送未送达，决策已照常处理");
        }
        RunOutcome::Completed { .. } => info!("✅ 执行完成"),
    }

    Ok(())
}

/// 查询交易日
async fn cmd_calendar(config: &AppConfig, date: Option<NaiveDate>) -> Result<()> {
    let date = resolve_today(config, date)?;
    let calendar = TradingCalendarKind::from_config(config)?;
    let trading = calendar.is_trading_day(date).await?;
    println!(
        "{} {}",
        date,
        if trading { "✓ 交易日" } else { "✗ 非交易日" }
    );
    Ok(())
}

/// 打印最近的 K/D/J
async fn cmd_kdj(config: &AppConfig, days: usize) -> Result<()> {
    let code = stock_code(config)?;
    let today = resolve_today(config, None)?;
    let provider = DataProviderKind::from_config(config)?;
    let klines = provider.daily_klines(&code).await?;

    let bars = engine::completed_bars(&klines, today);
    let start = bars.len().saturating_sub(config.analysis.daily_kdj_bars);
    let window = &bars[start..];
    let result = indicators::kdj(window, config.analysis.kdj_window);

    println!("{} 日线 KDJ（最近 {} 根）", code.display_code(), window.len());
    println!("{:-<60}", "");
    println!(
        "{:<12} {:>10} {:>10} {:>10} {:>10}",
        "日期", "收盘", "K", "D", "J"
    );
    println!("{:-<60}", "");

    let fmt = |v: Option<f64>| v.map(|x| format!("{:.2}", x)).unwrap_or_else(|| "-".to_string());
    let skip = window.len().saturating_sub(days);
    for (i, bar) in window.iter().enumerate().skip(skip) {
        println!(
            "{:<12} {:>10.2} {:>10} {:>10} {:>10}",
            bar.date,
            bar.close,
            fmt(result.k[i]),
            fmt(result.d[i]),
            fmt(result.j[i])
        );
    }

    Ok(())
}

/// 回填已执行操作
fn cmd_mark(config: &AppConfig, date: NaiveDate, action: &str, note: Option<&str>) -> Result<()> {
    let executed = ExecutedAction::from_name(action);
    match DecisionStoreKind::from_config(config)? {
        DecisionStoreKind::Sqlite(store) => {
            let updated = store.mark_executed(date, &executed, note)?;
            if updated == 0 {
                anyhow::bail!("{} 没有决策记录", date);
            }
            println!("✓ {} 已标记为 {}（{} 行）", date, executed, updated);
            Ok(())
        }
        DecisionStoreKind::Notion(_) => {
            anyhow::bail!("Notion 存储请直接在数据库中编辑“已执行操作”列")
        }
        DecisionStoreKind::None => anyhow::bail!("未配置决策存储"),
    }
}
