use serde::{Deserialize, Serialize};
use std::fmt;

use crate::metadata::CreativeMetrics;
use crate::pacing::round2;
use crate::policy::PolicyVerdict;

pub const HOOK_WEIGHT: f64 = 0.6;
pub const PACING_WEIGHT: f64 = 0.4;
pub const DNA_WEIGHT: f64 = 0.7;
pub const BENCHMARK_WEIGHT: f64 = 0.3;

/// 高于该分数评为绿灯
pub const GREEN_THRESHOLD: f64 = 80.0;
/// 不低于该分数评为黄灯
pub const YELLOW_THRESHOLD: f64 = 50.0;

/// 红绿灯评级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    Green,
    Yellow,
    Red,
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rating::Green => "Green",
            Rating::Yellow => "Yellow",
            Rating::Red => "Red",
        };
        f.write_str(s)
    }
}

/// 评分结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub benchmark_score: f64,
    pub dna_score: f64,
    pub predictive_score: f64,
    pub rating: Rating,
}

/// DNA 分 = 钩子 × 0.6 + 节奏 × 0.4；没有创意指标时为 0
pub fn dna_score(metrics: Option<&CreativeMetrics>) -> f64 {
    metrics
        .map(|m| m.hook_score * HOOK_WEIGHT + m.pacing_score * PACING_WEIGHT)
        .unwrap_or(0.0)
}

/// 预测分 = DNA × 0.7 + 基准 × 0.3，保留两位小数
///
/// 审核不通过时直接为 0，不做折算。
pub fn predictive_score(dna_score: f64, benchmark_score: f64, policy: &PolicyVerdict) -> f64 {
    if !policy.is_safe {
        return 0.0;
    }
    round2(dna_score * DNA_WEIGHT + benchmark_score * BENCHMARK_WEIGHT)
}

pub fn rating(score: f64, is_safe: bool) -> Rating {
    if !is_safe {
        Rating::Red
    } else if score > GREEN_THRESHOLD {
        Rating::Green
    } else if score >= YELLOW_THRESHOLD {
        Rating::Yellow
    } else {
        Rating::Red
    }
}

/// 合并创意指标、基准分和审核结论
pub fn score(metrics: Option<&CreativeMetrics>, benchmark_score: f64, policy: &PolicyVerdict) -> ScoreResult {
    let dna = dna_score(metrics);
    let predictive = predictive_score(dna, benchmark_score, policy);
    ScoreResult {
        benchmark_score,
        dna_score: dna,
        predictive_score: predictive,
        rating: rating(predictive, policy.is_safe),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(hook: f64, pacing: f64) -> CreativeMetrics {
        CreativeMetrics {
            hook_score: hook,
            pacing_score: pacing,
            safe_zone: true,
            duration_seconds: 20.0,
        }
    }

    #[test]
    fn test_yellow_campaign() {
        let m = metrics(85.0, 70.0);
        let result = score(Some(&m), 20.0, &PolicyVerdict::safe("Policy Safe"));
        assert!((result.dna_score - 79.0).abs() < 1e-9);
        assert!((result.predictive_score - 61.3).abs() < 1e-9);
        assert_eq!(result.rating, Rating::Yellow);
    }

    #[test]
    fn test_unsafe_policy_zeroes_score() {
        let m = metrics(100.0, 100.0);
        let policy = PolicyVerdict::unsafe_because("Video: Weapons");
        let result = score(Some(&m), 100.0, &policy);
        assert_eq!(result.predictive_score, 0.0);
        assert_eq!(result.rating, Rating::Red);
        assert!((result.dna_score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_gate_holds_for_any_inputs() {
        let policy = PolicyVerdict::unsafe_because("x");
        for hook in [0.0, 30.0, 70.0, 100.0] {
            for pacing in [40.0, 50.0, 80.0, 100.0] {
                for benchmark in [0.0, 20.0, 100.0] {
                    let result = score(Some(&metrics(hook, pacing)), benchmark, &policy);
                    assert_eq!(result.predictive_score, 0.0);
                    assert_eq!(result.rating, Rating::Red);
                }
            }
        }
    }

    #[test]
    fn test_missing_metrics_give_zero_dna() {
        let result = score(None, 100.0, &PolicyVerdict::safe("Policy Safe"));
        assert_eq!(result.dna_score, 0.0);
        assert_eq!(result.predictive_score, 30.0);
        assert_eq!(result.rating, Rating::Red);
    }

    #[test]
    fn test_rating_boundaries() {
        assert_eq!(rating(80.01, true), Rating::Green);
        assert_eq!(rating(80.0, true), Rating::Yellow);
        assert_eq!(rating(50.0, true), Rating::Yellow);
        assert_eq!(rating(49.99, true), Rating::Red);
        assert_eq!(rating(99.0, false), Rating::Red);
    }

    #[test]
    fn test_green_campaign() {
        let m = metrics(100.0, 100.0);
        let result = score(Some(&m), 100.0, &PolicyVerdict::safe("Policy Safe"));
        assert_eq!(result.predictive_score, 100.0);
        assert_eq!(result.rating, Rating::Green);
    }

    #[test]
    fn test_rating_serializes_as_name() {
        assert_eq!(serde_json::to_value(Rating::Yellow).unwrap(), "Yellow");
    }
}
