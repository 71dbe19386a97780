//! 分析引擎：K线 → 指标快照 → 结合冷却期得出日报

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::config::AnalysisConfig;
use crate::models::{Advice, Category, DailyKline, DecisionRecord, ExecutedAction, StockCode};

use super::decision::{self, DecisionInput};
use super::indicators;
use super::metrics::{self, PriceMetrics};
use super::weekly;

/// 指标快照（尚未查询冷却期）
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub code: StockCode,
    /// 最近一个完整交易日
    pub last_date: NaiveDate,
    pub metrics: PriceMetrics,
    pub kdj_daily_j: Option<f64>,
    pub kdj_weekly_j: Option<f64>,
    /// 是否计算并展示周线 J
    pub weekly_enabled: bool,
    /// 跌幅回看交易日数
    pub decline_lookback: usize,
    /// 参与计算的全部交易日（升序）
    pub trade_dates: Vec<NaiveDate>,
}

/// 日报：推送与落库的内容
#[derive(Debug, Clone)]
pub struct DailyReport {
    pub snapshot: Snapshot,
    pub recently_added: bool,
    pub invest_day: bool,
    pub advice: Advice,
    pub decline_text: String,
    pub drawdown_text: String,
}

/// 只保留 today 之前的K线（当日未收盘数据不参与计算）
pub fn completed_bars(klines: &[DailyKline], today: NaiveDate) -> Vec<DailyKline> {
    let mut bars: Vec<DailyKline> = klines
        .iter()
        .filter(|k| k.date < today)
        .cloned()
        .collect();
    bars.sort_by_key(|k| k.date);
    bars
}

/// 计算指标快照
pub fn analyze(
    code: &StockCode,
    klines: &[DailyKline],
    today: NaiveDate,
    config: &AnalysisConfig,
) -> Result<Snapshot> {
    let bars = completed_bars(klines, today);
    let Some(last) = bars.last() else {
        anyhow::bail!("{} 在 {} 之前没有任何K线数据", code, today);
    };
    let last_date = last.date;

    let metrics = metrics::compute(&bars, config.decline_lookback_days)
        .ok_or_else(|| anyhow::anyhow!("{} 指标计算失败", code))?;

    let kdj_daily_j =
        indicators::kdj_latest_j(&bars, config.kdj_window, config.daily_kdj_bars);

    let kdj_weekly_j = if config.weekly_kdj_enabled {
        let weekly_bars = weekly::resample_weekly(&bars);
        indicators::kdj_latest_j(&weekly_bars, config.kdj_window, config.weekly_kdj_bars)
    } else {
        None
    };

    debug!(
        "{} bars={} last={} decline={:.4} drawdown={:.4} J(d)={:?} J(w)={:?}",
        code,
        bars.len(),
        last_date,
        metrics.decline,
        metrics.drawdown,
        kdj_daily_j,
        kdj_weekly_j
    );

    Ok(Snapshot {
        code: code.clone(),
        last_date,
        metrics,
        kdj_daily_j,
        kdj_weekly_j,
        weekly_enabled: config.weekly_kdj_enabled,
        decline_lookback: config.decline_lookback_days,
        trade_dates: bars.iter().map(|b| b.date).collect(),
    })
}

impl Snapshot {
    /// 冷却期起点：查询该日及之后的决策记录
    pub fn cooldown_start(&self, interval: usize) -> Option<NaiveDate> {
        decision::cooldown_start(&self.trade_dates, self.last_date, interval)
    }

    /// 最近交易日是否为定投日
    pub fn is_invest_day(&self, start_day: u32) -> bool {
        decision::is_invest_day(&self.trade_dates, self.last_date, start_day)
    }

    /// 结合冷却期得出建议
    pub fn conclude(self, recently_added: bool, config: &AnalysisConfig) -> DailyReport {
        let invest_day = self.is_invest_day(config.invest_start_day);
        let input = DecisionInput {
            decline: self.metrics.decline,
            drawdown: self.metrics.drawdown,
            recently_added,
            invest_day,
        };
        let advice = decision::decide(&input, &config.tiers, config.invest_lots);
        info!("{} {} 建议: {}", self.code, self.last_date, advice);

        DailyReport {
            decline_text: decision::decline_hint(
                self.metrics.decline,
                config.decline_hint_threshold(),
            ),
            drawdown_text: decision::drawdown_hint(
                self.metrics.drawdown,
                config.drawdown_hint_threshold(),
            ),
            snapshot: self,
            recently_added,
            invest_day,
            advice,
        }
    }
}

impl DailyReport {
    /// 推送标题：操作类型
    pub fn title(&self) -> &'static str {
        self.advice.category().as_str()
    }

    pub fn category(&self) -> Category {
        self.advice.category()
    }

    /// 价格行："HK$52.30（+1.25%）"
    pub fn price_line(&self) -> String {
        format!(
            "{}{:.2}（{}）",
            self.snapshot.code.market.currency_prefix(),
            self.snapshot.metrics.price,
            decision::format_signed_pct(self.snapshot.metrics.change_ratio)
        )
    }

    /// 推送正文
    pub fn message(&self) -> String {
        let mut lines = vec![
            format!("📅 日期：{}", self.snapshot.last_date.format("%Y-%m-%d")),
            format!("📈 当前股价：{}", self.price_line()),
            format!(
                "📉 跌幅（{}日）：{}",
                self.snapshot.decline_lookback, self.decline_text
            ),
            format!("📉 回撤（近高点）：{}", self.drawdown_text),
            format!("\n📐 KDJ 日线 J 值：{}", format_j(self.snapshot.kdj_daily_j)),
        ];
        if self.snapshot.weekly_enabled {
            lines.push(format!(
                "📐 KDJ 周线 J 值：{}",
                format_j(self.snapshot.kdj_weekly_j)
            ));
        }
        lines.push(format!("\n📌 建议操作：{}", self.advice));
        lines.join("\n")
    }

    /// 落库记录，已执行操作默认“无操作”
    pub fn to_record(&self) -> DecisionRecord {
        DecisionRecord {
            date: self.snapshot.last_date,
            title: self.price_line(),
            category: self.category(),
            decline_text: self.decline_text.clone(),
            drawdown_text: self.drawdown_text.clone(),
            kdj_daily_j: self.snapshot.kdj_daily_j.map(round2),
            kdj_weekly_j: self.snapshot.kdj_weekly_j.map(round2),
            advice: self.advice.to_string(),
            executed: ExecutedAction::None,
            note: String::new(),
        }
    }
}

fn format_j(j: Option<f64>) -> String {
    match j {
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
