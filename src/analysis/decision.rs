//! 加仓 / 定投决策：阈值分档 + 冷却期 + 定投日
//!
//! 优先级：冷却期外按分档加仓 → 定投日定投 → 不建议操作

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{Advice, DecisionRecord, ExecutedAction};

/// 加仓分档：跌幅或回撤任一达到即命中
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    /// 近 N 日跌幅阈值
    pub decline: f64,
    /// 回撤阈值
    pub drawdown: f64,
    /// 加仓手数
    pub lots: u32,
}

impl Tier {
    pub fn matches(&self, decline: f64, drawdown: f64) -> bool {
        decline >= self.decline || drawdown >= self.drawdown
    }
}

/// 默认分档（从高到低）
pub fn default_tiers() -> Vec<Tier> {
    vec![
        Tier { decline: 0.20, drawdown: 0.25, lots: 5 },
        Tier { decline: 0.15, drawdown: 0.20, lots: 4 },
        Tier { decline: 0.10, drawdown: 0.15, lots: 3 },
    ]
}

/// 决策输入
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionInput {
    pub decline: f64,
    pub drawdown: f64,
    /// 冷却期内是否已加过仓
    pub recently_added: bool,
    /// 今天是否为定投日
    pub invest_day: bool,
}

/// 按优先级得出建议操作，tiers 按顺序匹配
pub fn decide(input: &DecisionInput, tiers: &[Tier], invest_lots: u32) -> Advice {
    let mut advice = Advice::NoAction;

    if !input.recently_added {
        if let Some(tier) = tiers
            .iter()
            .find(|t| t.matches(input.decline, input.drawdown))
        {
            advice = Advice::AddPosition { lots: tier.lots };
        }
    } else {
        warn!("⚠️ 冷却期内已加仓过，今日不建议重复加仓");
    }

    if advice == Advice::NoAction && input.invest_day {
        advice = Advice::Invest { lots: invest_lots };
    }

    advice
}

/// 定投日：当月（同年同月）日期 >= start_day 的第一个交易日
pub fn is_invest_day(trade_dates: &[NaiveDate], last: NaiveDate, start_day: u32) -> bool {
    if last.day() < start_day {
        return false;
    }
    trade_dates
        .iter()
        .filter(|d| d.year() == last.year() && d.month() == last.month() && d.day() >= start_day)
        .min()
        .is_some_and(|first| *first == last)
}

/// 冷却期起点：last 之前倒数第 interval 个交易日
///
/// interval 为 0 或交易日不足 interval 个时取最早的一个。
pub fn cooldown_start(
    trade_dates: &[NaiveDate],
    last: NaiveDate,
    interval: usize,
) -> Option<NaiveDate> {
    let past: Vec<NaiveDate> = trade_dates.iter().copied().filter(|d| *d < last).collect();
    if past.is_empty() {
        return None;
    }
    if interval == 0 || past.len() < interval {
        return past.first().copied();
    }
    past.get(past.len() - interval).copied()
}

/// 记录中是否存在“已加仓”
pub fn recently_added(records: &[DecisionRecord]) -> bool {
    records
        .iter()
        .any(|r| r.executed == ExecutedAction::Added)
}

/// 跌幅提示文本："12.34% ｜ ✅ 建议买入（跌幅大）"
pub fn decline_hint(decline: f64, threshold: f64) -> String {
    let verdict = if decline >= threshold {
        "✅ 建议买入（跌幅大）"
    } else {
        "❌ 跌幅不足"
    };
    format!("{} ｜ {}", format_pct(decline), verdict)
}

/// 回撤提示文本："18.00% ｜ ✅ 建议买入（回撤深）"
pub fn drawdown_hint(drawdown: f64, threshold: f64) -> String {
    let verdict = if drawdown >= threshold {
        "✅ 建议买入（回撤深）"
    } else {
        "❌ 回撤不足"
    };
    format!("{} ｜ {}", format_pct(drawdown), verdict)
}

/// 比例格式化为两位小数百分比
pub fn format_pct(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

/// 带符号百分比："+1.25%"
pub fn format_signed_pct(ratio: f64) -> String {
    format!("{:+.2}%", ratio * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    fn input(decline: f64, drawdown: f64) -> DecisionInput {
        DecisionInput {
            decline,
            drawdown,
            recently_added: false,
            invest_day: false,
        }
    }

    fn record(executed: ExecutedAction) -> DecisionRecord {
        DecisionRecord {
            date: d(5, 2),
            title: String::new(),
            category: Category::AddPosition,
            decline_text: String::new(),
            drawdown_text: String::new(),
            kdj_daily_j: None,
            kdj_weekly_j: None,
            advice: String::new(),
            executed,
            note: String::new(),
        }
    }

    #[test]
    fn test_tiers_priority() {
        let tiers = default_tiers();
        assert_eq!(decide(&input(0.21, 0.0), &tiers, 1), Advice::AddPosition { lots: 5 });
        assert_eq!(decide(&input(0.0, 0.25), &tiers, 1), Advice::AddPosition { lots: 5 });
        assert_eq!(decide(&input(0.15, 0.0), &tiers, 1), Advice::AddPosition { lots: 4 });
        assert_eq!(decide(&input(0.05, 0.20), &tiers, 1), Advice::AddPosition { lots: 4 });
        assert_eq!(decide(&input(0.10, 0.0), &tiers, 1), Advice::AddPosition { lots: 3 });
        assert_eq!(decide(&input(0.0, 0.15), &tiers, 1), Advice::AddPosition { lots: 3 });
        assert_eq!(decide(&input(0.09, 0.14), &tiers, 1), Advice::NoAction);
        // 上涨时跌幅为负
        assert_eq!(decide(&input(-0.3, 0.0), &tiers, 1), Advice::NoAction);
    }

    #[test]
    fn test_cooldown_blocks_add_but_not_invest() {
        let tiers = default_tiers();
        let mut i = input(0.30, 0.30);
        i.recently_added = true;
        assert_eq!(decide(&i, &tiers, 1), Advice::NoAction);

        i.invest_day = true;
        assert_eq!(decide(&i, &tiers, 1), Advice::Invest { lots: 1 });
    }

    #[test]
    fn test_add_position_wins_over_invest_day() {
        let mut i = input(0.12, 0.0);
        i.invest_day = true;
        assert_eq!(decide(&i, &default_tiers(), 1), Advice::AddPosition { lots: 3 });

        let mut i = input(0.0, 0.0);
        i.invest_day = true;
        assert_eq!(decide(&i, &default_tiers(), 2), Advice::Invest { lots: 2 });
    }

    #[test]
    fn test_is_invest_day() {
        let dates = vec![d(5, 14), d(5, 15), d(5, 19), d(5, 20), d(6, 16), d(6, 17)];
        assert!(is_invest_day(&dates, d(5, 19), 16));
        assert!(!is_invest_day(&dates, d(5, 20), 16));
        assert!(!is_invest_day(&dates, d(5, 15), 16));
        assert!(is_invest_day(&dates, d(6, 16), 16));
        assert!(!is_invest_day(&dates, d(6, 17), 16));
    }

    #[test]
    fn test_invest_day_ignores_other_years() {
        let last_year = NaiveDate::from_ymd_opt(2024, 5, 16).unwrap();
        let dates = vec![last_year, d(5, 19)];
        assert!(is_invest_day(&dates, d(5, 19), 16));
        assert!(is_invest_day(&dates, last_year, 16));
    }

    #[test]
    fn test_cooldown_start() {
        let dates: Vec<NaiveDate> = (1..=15).map(|i| d(3, i)).collect();
        // last = 3/15，之前 14 个交易日，倒数第 10 个是 3/5
        assert_eq!(cooldown_start(&dates, d(3, 15), 10), Some(d(3, 5)));
        // 不足 interval 个时取最早
        assert_eq!(cooldown_start(&dates[..5], d(3, 5), 10), Some(d(3, 1)));
        assert_eq!(cooldown_start(&dates[..1], d(3, 1), 10), None);
        assert_eq!(cooldown_start(&dates, d(3, 15), 14), Some(d(3, 1)));
    }

    #[test]
    fn test_cooldown_start_zero_interval_uses_earliest() {
        let dates: Vec<NaiveDate> = (1..=15).map(|i| d(3, i)).collect();
        assert_eq!(cooldown_start(&dates, d(3, 15), 0), Some(d(3, 1)));
        assert_eq!(cooldown_start(&dates, d(3, 15), 1), Some(d(3, 14)));
    }

    #[test]
    fn test_recently_added() {
        assert!(!recently_added(&[]));
        assert!(!recently_added(&[record(ExecutedAction::None), record(ExecutedAction::Invested)]));
        assert!(recently_added(&[record(ExecutedAction::None), record(ExecutedAction::Added)]));
    }

    #[test]
    fn test_hints() {
        assert_eq!(decline_hint(0.1234, 0.10), "12.34% ｜ ✅ 建议买入（跌幅大）");
        assert_eq!(decline_hint(0.05, 0.10), "5.00% ｜ ❌ 跌幅不足");
        assert_eq!(drawdown_hint(0.18, 0.15), "18.00% ｜ ✅ 建议买入（回撤深）");
        assert_eq!(drawdown_hint(0.0, 0.15), "0.00% ｜ ❌ 回撤不足");
        assert_eq!(format_signed_pct(0.0125), "+1.25%");
        assert_eq!(format_signed_pct(-0.034), "-3.40%");
    }
}
