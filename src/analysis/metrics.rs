//! 跌幅 / 回撤 / 当日涨跌幅

use crate::models::DailyKline;

/// 近 N 日跌幅与回撤
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceMetrics {
    /// 最新收盘价
    pub price: f64,
    /// 当日涨跌幅（相对开盘价）
    pub change_ratio: f64,
    /// 近 N 个交易日跌幅，正值表示下跌
    pub decline: f64,
    /// 相对区间最高收盘价的回撤
    pub drawdown: f64,
}

/// 当日涨跌幅 = (close - open) / open
pub fn change_ratio(bar: &DailyKline) -> f64 {
    if bar.open == 0.0 {
        return 0.0;
    }
    (bar.close - bar.open) / bar.open
}

/// 近 lookback 个交易日跌幅：以 lookback 根之前的收盘价为基准，数据不足时为 0
pub fn decline(bars: &[DailyKline], lookback: usize) -> f64 {
    let Some(last) = bars.last() else {
        return 0.0;
    };
    let last_idx = bars.len() - 1;
    if last_idx < lookback {
        return 0.0;
    }
    let base = bars[last_idx - lookback].close;
    if base == 0.0 {
        return 0.0;
    }
    (base - last.close) / base
}

/// 相对全部已取数据中最高收盘价的回撤
pub fn drawdown(bars: &[DailyKline]) -> f64 {
    let Some(last) = bars.last() else {
        return 0.0;
    };
    let high = bars.iter().map(|b| b.close).fold(f64::NEG_INFINITY, f64::max);
    if high <= 0.0 {
        return 0.0;
    }
    (high - last.close) / high
}

/// 计算全部价格指标，bars 为空时返回 None
pub fn compute(bars: &[DailyKline], lookback: usize) -> Option<PriceMetrics> {
    let last = bars.last()?;
    Some(PriceMetrics {
        price: last.close,
        change_ratio: change_ratio(last),
        decline: decline(bars, lookback),
        drawdown: drawdown(bars),
    })
}
