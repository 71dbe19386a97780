use chrono::NaiveDate;
use std::fmt;

/// 市场类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Market {
    /// 港股
    HK,
    /// 沪市 A 股
    SH,
    /// 深市 A 股
    SZ,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Market::HK => write!(f, "HK"),
            Market::SH => write!(f, "SH"),
            Market::SZ => write!(f, "SZ"),
        }
    }
}

impl Market {
    /// 价格显示前缀
    pub fn currency_prefix(&self) -> &'static str {
        match self {
            Market::HK => "HK$",
            Market::SH | Market::SZ => "¥",
        }
    }
}

/// 股票代码
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct StockCode {
    /// 市场
    pub market: Market,
    /// 代码（纯数字部分）
    pub code: String,
}

impl StockCode {
    pub fn new(market: Market, code: impl Into<String>) -> Self {
        Self {
            market,
            code: code.into(),
        }
    }

    /// 解析 "HK.01810" / "01810.HK" / "01810" 格式，纯 5 位数字视为港股
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (market_str, code) = match s.split_once('.') {
            Some((a, b)) if a.chars().all(|c| c.is_ascii_digit()) => (b, a),
            Some((a, b)) => (a, b),
            None => {
                if s.len() == 5 && s.chars().all(|c| c.is_ascii_digit()) {
                    return Some(Self::new(Market::HK, s));
                }
                return None;
            }
        };
        let market = match market_str.to_ascii_uppercase().as_str() {
            "HK" => Market::HK,
            "SH" => Market::SH,
            "SZ" => Market::SZ,
            _ => return None,
        };
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(Self::new(market, code))
    }

    /// 返回用于显示的完整代码，如 "HK.01810"
    pub fn display_code(&self) -> String {
        format!("{}.{}", self.market, self.code)
    }
}

impl fmt::Display for StockCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.market, self.code)
    }
}

/// 日K线数据
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DailyKline {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// 操作类型（推送标题 / 数据库“类型”列）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// 加仓
    AddPosition,
    /// 定投
    Invest,
    /// 不建议操作
    NoAction,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::AddPosition => "加仓",
            Category::Invest => "定投",
            Category::NoAction => "不建议操作",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "加仓" => Some(Category::AddPosition),
            "定投" => Some(Category::Invest),
            "不建议操作" => Some(Category::NoAction),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 建议操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advice {
    /// 加仓 N 手
    AddPosition { lots: u32 },
    /// 定投 N 手
    Invest { lots: u32 },
    /// 不建议操作
    NoAction,
}

impl Advice {
    pub fn category(&self) -> Category {
        match self {
            Advice::AddPosition { .. } => Category::AddPosition,
            Advice::Invest { .. } => Category::Invest,
            Advice::NoAction => Category::NoAction,
        }
    }
}

impl fmt::Display for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advice::AddPosition { lots } => write!(f, "✅ 加仓 {} 手", lots),
            Advice::Invest { lots } => write!(f, "✅ 定投 {} 手", lots),
            Advice::NoAction => write!(f, "❌ 不建议操作"),
        }
    }
}

/// 实际执行的操作（由用户在数据库中手动回填）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutedAction {
    /// 已加仓
    Added,
    /// 已定投
    Invested,
    /// 无操作（写入时的默认值）
    None,
    /// 其他自定义取值
    Other(String),
}

impl ExecutedAction {
    pub fn from_name(name: &str) -> Self {
        match name {
            "已加仓" => ExecutedAction::Added,
            "已定投" => ExecutedAction::Invested,
            "无操作" | "" => ExecutedAction::None,
            other => ExecutedAction::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ExecutedAction::Added => "已加仓",
            ExecutedAction::Invested => "已定投",
            ExecutedAction::None => "无操作",
            ExecutedAction::Other(s) => s,
        }
    }
}

impl fmt::Display for ExecutedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 决策记录（一行）
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRecord {
    /// 最近交易日
    pub date: NaiveDate,
    /// 标题："HK$52.30（+1.25%）"
    pub title: String,
    /// 类型
    pub category: Category,
    /// 20 日跌幅文本
    pub decline_text: String,
    /// 回撤文本
    pub drawdown_text: String,
    /// 日线 J 值（保留两位）
    pub kdj_daily_j: Option<f64>,
    /// 周线 J 值（保留两位）
    pub kdj_weekly_j: Option<f64>,
    /// 建议操作文本
    pub advice: String,
    /// 已执行操作
    pub executed: ExecutedAction,
    /// 备注
    pub note: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stock_code() {
        let code = StockCode::parse("HK.01810").unwrap();
        assert_eq!(code.market, Market::HK);
        assert_eq!(code.code, "01810");

        let code = StockCode::parse("01810.hk").unwrap();
        assert_eq!(code, StockCode::new(Market::HK, "01810"));

        let code = StockCode::parse("00700").unwrap();
        assert_eq!(code.market, Market::HK);

        let code = StockCode::parse("SH.600519").unwrap();
        assert_eq!(code.market, Market::SH);

        assert!(StockCode::parse("AAPL").is_none());
        assert!(StockCode::parse("US.TSLA").is_none());
        assert!(StockCode::parse("HK.").is_none());
    }

    #[test]
    fn test_advice_text_and_category() {
        assert_eq!(Advice::AddPosition { lots: 5 }.to_string(), "✅ 加仓 5 手");
        assert_eq!(Advice::Invest { lots: 1 }.to_string(), "✅ 定投 1 手");
        assert_eq!(Advice::NoAction.to_string(), "❌ 不建议操作");
        assert_eq!(Advice::AddPosition { lots: 3 }.category(), Category::AddPosition);
        assert_eq!(Advice::NoAction.category().to_string(), "不建议操作");
    }

    #[test]
    fn test_executed_action_names() {
        assert_eq!(ExecutedAction::from_name("已加仓"), ExecutedAction::Added);
        assert_eq!(ExecutedAction::from_name(""), ExecutedAction::None);
        assert_eq!(
            ExecutedAction::from_name("部分加仓"),
            ExecutedAction::Other("部分加仓".to_string())
        );
        assert_eq!(ExecutedAction::Other("x".into()).as_str(), "x");
        assert_eq!(Category::from_name("定投"), Some(Category::Invest));
    }
}
