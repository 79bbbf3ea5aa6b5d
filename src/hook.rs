use serde::{Deserialize, Serialize};

/// 开头钩子的观察窗口（秒）
pub const HOOK_WINDOW_SECONDS: f64 = 3.0;

/// 基础分：没有其它信号时的保底
pub const HOOK_BASELINE: f64 = 30.0;

/// 窗口内出现快切的加分
pub const FAST_CUT_BONUS: f64 = 40.0;

/// 钩子因素
///
/// `has_text` 和 `has_human` 需要 OCR / 目标检测，目前固定为 false，保留字段以兼容输出格式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookFactors {
    pub has_text: bool,
    pub has_fast_cut: bool,
    pub has_human: bool,
}

/// 钩子分析结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HookAnalysis {
    /// 0-100
    pub hook_score: f64,
    pub hook_factors: HookFactors,
}

/// 根据前 3 秒的切换点给开头打分
pub fn score_hook(scene_cuts: &[f64]) -> HookAnalysis {
    let mut hook_score = HOOK_BASELINE;
    let mut hook_factors = HookFactors::default();

    if scene_cuts.iter().any(|&cut| cut <= HOOK_WINDOW_SECONDS) {
        hook_score += FAST_CUT_BONUS;
        hook_factors.has_fast_cut = true;
    }

    HookAnalysis {
        hook_score: hook_score.min(100.0),
        hook_factors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_cuts_scores_baseline() {
        let hook = score_hook(&[]);
        assert_eq!(hook.hook_score, 30.0);
        assert_eq!(hook.hook_factors, HookFactors::default());
    }

    #[test]
    fn test_fast_cut_within_window() {
        let hook = score_hook(&[1.0, 2.4, 8.0]);
        assert_eq!(hook.hook_score, 70.0);
        assert!(hook.hook_factors.has_fast_cut);
        assert!(!hook.hook_factors.has_text);
        assert!(!hook.hook_factors.has_human);
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        assert!(score_hook(&[3.0]).hook_factors.has_fast_cut);
        assert!(!score_hook(&[3.01, 6.0]).hook_factors.has_fast_cut);
    }

    #[test]
    fn test_serialized_factor_names() {
        let json = serde_json::to_value(score_hook(&[0.5])).unwrap();
        assert_eq!(json["hook_factors"]["has_text"], false);
        assert_eq!(json["hook_factors"]["has_fast_cut"], true);
        assert_eq!(json["hook_factors"]["has_human"], false);
    }
}
