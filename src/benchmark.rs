use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::PreflightError;

/// 未配置行业使用的平均 CPA
pub const DEFAULT_AVERAGE_CPA: f64 = 50.0;

/// 行业分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Industry {
    #[serde(rename = "FIN")]
    Finance,
    #[serde(rename = "ECOMM")]
    Ecommerce,
    #[serde(rename = "BEAUTY")]
    Beauty,
    #[serde(rename = "FNB")]
    FoodAndBeverage,
    #[serde(rename = "TECH")]
    Tech,
    #[serde(rename = "TRAVEL")]
    Travel,
    #[serde(rename = "OTHER")]
    Other,
}

impl Industry {
    pub const ALL: [Industry; 7] = [
        Industry::Finance,
        Industry::Ecommerce,
        Industry::Beauty,
        Industry::FoodAndBeverage,
        Industry::Tech,
        Industry::Travel,
        Industry::Other,
    ];

    /// 行业代码（与请求字段一致）
    pub fn code(&self) -> &'static str {
        match self {
            Industry::Finance => "FIN",
            Industry::Ecommerce => "ECOMM",
            Industry::Beauty => "BEAUTY",
            Industry::FoodAndBeverage => "FNB",
            Industry::Tech => "TECH",
            Industry::Travel => "TRAVEL",
            Industry::Other => "OTHER",
        }
    }
}

impl fmt::Display for Industry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Industry {
    type Err = PreflightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let industry = match normalized.as_str() {
            "fin" | "finance" | "financial services" => Industry::Finance,
            "ecomm" | "ecommerce" | "e-commerce" | "e-commerce (non-app)" => Industry::Ecommerce,
            "beauty" | "beauty & personal care" => Industry::Beauty,
            "fnb" | "food & beverage" | "food and beverage" => Industry::FoodAndBeverage,
            "tech" | "tech & electronics" => Industry::Tech,
            "travel" => Industry::Travel,
            "other" => Industry::Other,
            _ => return Err(PreflightError::InvalidInput(format!("unknown industry: {}", s))),
        };
        Ok(industry)
    }
}

/// 行业平均 CPA 表，构造后只读
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkTable {
    averages: HashMap<Industry, f64>,
    fallback: f64,
}

impl Default for BenchmarkTable {
    fn default() -> Self {
        let averages = HashMap::from([
            (Industry::Finance, 750.0),
            (Industry::Ecommerce, 325.0),
            (Industry::Beauty, 350.0),
            (Industry::FoodAndBeverage, 260.0),
            (Industry::Tech, 500.0),
            (Industry::Travel, 380.0),
            (Industry::Other, DEFAULT_AVERAGE_CPA),
        ]);
        Self {
            averages,
            fallback: DEFAULT_AVERAGE_CPA,
        }
    }
}

impl BenchmarkTable {
    pub fn new(averages: HashMap<Industry, f64>) -> Self {
        Self {
            averages,
            fallback: DEFAULT_AVERAGE_CPA,
        }
    }

    /// 在默认表的基础上覆盖部分行业
    pub fn with_overrides(overrides: &HashMap<Industry, f64>) -> Self {
        let mut table = Self::default();
        table.averages.extend(overrides.iter().map(|(k, v)| (*k, *v)));
        table
    }

    pub fn average_cpa(&self, industry: Industry) -> f64 {
        self.averages.get(&industry).copied().unwrap_or(self.fallback)
    }

    /// 基准分 = min(100, 目标 CPA / 行业平均 CPA × 100)
    ///
    /// 平均值不为正数时返回 0。
    pub fn score(&self, target_cpa: f64, industry: Industry) -> f64 {
        let average = self.average_cpa(industry);
        if !(average > 0.0) {
            return 0.0;
        }
        ((target_cpa / average) * 100.0).min(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finance_benchmark() {
        let table = BenchmarkTable::default();
        assert!((table.score(150.0, Industry::Finance) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_capped_at_hundred() {
        let table = BenchmarkTable::default();
        assert_eq!(table.score(5000.0, Industry::Tech), 100.0);
    }

    #[test]
    fn test_zero_average_yields_zero() {
        let table = BenchmarkTable::with_overrides(&HashMap::from([(Industry::Travel, 0.0)]));
        assert_eq!(table.score(100.0, Industry::Travel), 0.0);
    }

    #[test]
    fn test_missing_entry_uses_fallback() {
        let table = BenchmarkTable::new(HashMap::new());
        assert_eq!(table.average_cpa(Industry::Beauty), 50.0);
        assert_eq!(table.score(25.0, Industry::Beauty), 50.0);
    }

    #[test]
    fn test_default_table_has_seven_buckets() {
        let table = BenchmarkTable::default();
        for industry in Industry::ALL {
            assert!(table.average_cpa(industry) > 0.0);
        }
        assert_eq!(table.average_cpa(Industry::Other), 50.0);
        assert_eq!(table.average_cpa(Industry::FoodAndBeverage), 260.0);
    }

    #[test]
    fn test_parse_codes_and_aliases() {
        assert_eq!("FIN".parse::<Industry>().unwrap(), Industry::Finance);
        assert_eq!("ecomm".parse::<Industry>().unwrap(), Industry::Ecommerce);
        assert_eq!(" Food & Beverage ".parse::<Industry>().unwrap(), Industry::FoodAndBeverage);
        assert!("GAMES".parse::<Industry>().is_err());
    }

    #[test]
    fn test_serde_uses_codes() {
        assert_eq!(serde_json::to_value(Industry::Ecommerce).unwrap(), "ECOMM");
        let parsed: Industry = serde_json::from_str("\"FNB\"").unwrap();
        assert_eq!(parsed, Industry::FoodAndBeverage);
    }
}
