//! 日K线 → 周K线（以周五为周期结束日，等价 W-FRI）

use chrono::{Datelike, Duration, NaiveDate};

use crate::models::DailyKline;

/// 该日期所属周的周五（周六、周日归入下一个周五）
pub fn week_ending_friday(date: NaiveDate) -> NaiveDate {
    let weekday = date.weekday().num_days_from_monday() as i64;
    let days_to_friday = (4 - weekday).rem_euclid(7);
    date + Duration::days(days_to_friday)
}

/// 聚合周K线：open 取首、high 取最大、low 取最小、close 取末，volume 求和
///
/// 输入须按日期升序；输出的 date 为周五标签，无数据的周不输出。
pub fn resample_weekly(daily: &[DailyKline]) -> Vec<DailyKline> {
    let mut weeks: Vec<DailyKline> = Vec::new();

    for bar in daily {
        let label = week_ending_friday(bar.date);
        match weeks.last_mut() {
            Some(week) if week.date == label => {
                week.high = week.high.max(bar.high);
                week.low = week.low.min(bar.low);
                week.close = bar.close;
                week.volume += bar.volume;
            }
            _ => weeks.push(DailyKline {
                date: label,
                ..bar.clone()
            }),
        }
    }

    weeks
}
