//! 技术指标纯计算函数
//!
//! 滚动最高/最低、EWM (center of mass)、KDJ 随机指标

use crate::models::DailyKline;

/// KDJ 默认 RSV 窗口
pub const KDJ_WINDOW: usize = 9;
/// K/D 平滑的 center of mass（α = 1/3）
pub const KDJ_COM: f64 = 2.0;

/// 滚动最小值，前 period-1 个位置使用已有全部数据（min_periods = 1）
pub fn rolling_min(data: &[f64], period: usize) -> Vec<f64> {
    rolling_by(data, period, f64::min)
}

/// 滚动最大值，前 period-1 个位置使用已有全部数据（min_periods = 1）
pub fn rolling_max(data: &[f64], period: usize) -> Vec<f64> {
    rolling_by(data, period, f64::max)
}

fn rolling_by(data: &[f64], period: usize, pick: fn(f64, f64) -> f64) -> Vec<f64> {
    let period = period.max(1);
    let mut result = Vec::with_capacity(data.len());

    for i in 0..data.len() {
        let start = (i + 1).saturating_sub(period);
        let value = data[start..=i]
            .iter()
            .copied()
            .reduce(pick)
            .unwrap_or(f64::NAN);
        result.push(value);
    }

    result
}

/// 指数加权移动平均（adjust 形式）
///
/// α = 1 / (1 + com)，y_t = Σ (1-α)^(t-i)·x_i / Σ (1-α)^(t-i)。
/// 缺失值不贡献权重，但已有权重照常衰减；首个有效值之前输出 None。
pub fn ewm_mean(data: &[Option<f64>], com: f64) -> Vec<Option<f64>> {
    let alpha = 1.0 / (1.0 + com.max(0.0));
    let decay = 1.0 - alpha;

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    let mut result = Vec::with_capacity(data.len());

    for value in data {
        weighted_sum *= decay;
        weight_total *= decay;

        if let Some(v) = value.filter(|v| v.is_finite()) {
            weighted_sum += v;
            weight_total += 1.0;
        }

        if weight_total > 0.0 {
            result.push(Some(weighted_sum / weight_total));
        } else {
            result.push(None);
        }
    }

    result
}

/// KDJ 计算结果
#[derive(Debug, Clone, Default)]
pub struct KdjResult {
    pub rsv: Vec<Option<f64>>,
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
    pub j: Vec<Option<f64>>,
}

impl KdjResult {
    /// 最新 J 值
    pub fn latest_j(&self) -> Option<f64> {
        self.j.last().copied().flatten()
    }
}

/// 计算 KDJ 序列
///
/// RSV = (close - 滚动最低) / (滚动最高 - 滚动最低) × 100，
/// 滚动最高等于滚动最低时 RSV 记为缺失。
/// K = EWM(RSV)，D = EWM(K)，J = 3K - 2D。
pub fn kdj(bars: &[DailyKline], period: usize) -> KdjResult {
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();

    let high_n = rolling_max(&highs, period);
    let low_n = rolling_min(&lows, period);

    let rsv: Vec<Option<f64>> = bars
        .iter()
        .zip(high_n.iter().zip(low_n.iter()))
        .map(|(bar, (&hh, &ll))| {
            let range = hh - ll;
            if range.abs() < f64::EPSILON || !range.is_finite() {
                None
            } else {
                Some((bar.close - ll) / range * 100.0)
            }
        })
        .collect();

    let k = ewm_mean(&rsv, KDJ_COM);
    let d = ewm_mean(&k, KDJ_COM);

    let j = k
        .iter()
        .zip(d.iter())
        .map(|(k, d)| match (k, d) {
            (Some(k), Some(d)) => Some(3.0 * k - 2.0 * d),
            _ => None,
        })
        .collect();

    KdjResult { rsv, k, d, j }
}

/// 取最近 tail 根K线计算最新 J 值
pub fn kdj_latest_j(bars: &[DailyKline], period: usize, tail: usize) -> Option<f64> {
    let start = bars.len().saturating_sub(tail);
    kdj(&bars[start..], period).latest_j()
}
