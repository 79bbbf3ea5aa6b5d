use serde::{Deserialize, Serialize};

use crate::hook::HookFactors;
use crate::pacing::NEUTRAL_PACING_SCORE;

/// 场景分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAnalysisResult {
    /// 切换点时间戳（秒），严格递增
    #[serde(rename = "scene_cuts_timestamp")]
    pub scene_cuts: Vec<f64>,
    /// 场景数量 = 切换点数量 + 1
    pub number_of_scenes: usize,
    /// 平均每个场景的秒数
    pub pacing_rate_sec_per_scene: f64,
    /// 节奏分
    pub pacing_score: u32,
}

impl SceneAnalysisResult {
    /// 分析失败时的中性结果
    pub fn neutral(duration_seconds: f64) -> Self {
        Self {
            scene_cuts: Vec::new(),
            number_of_scenes: 1,
            pacing_rate_sec_per_scene: duration_seconds,
            pacing_score: NEUTRAL_PACING_SCORE,
        }
    }
}

/// 时长校验结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationAnalysis {
    pub duration_seconds: f64,
    pub is_valid_duration: bool,
}

/// 音频信号（未实现，固定占位值）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSummary {
    pub music_tempo_bpm: u32,
    pub audio_vibe: String,
    pub has_voiceover: bool,
}

impl Default for AudioSummary {
    fn default() -> Self {
        Self {
            music_tempo_bpm: 0,
            audio_vibe: "unknown".to_string(),
            has_voiceover: false,
        }
    }
}

/// 创意质量指标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreativeMetrics {
    pub hook_score: f64,
    pub pacing_score: f64,
    /// 安全区检测尚未实现，有指标时固定为 true
    pub safe_zone: bool,
    pub duration_seconds: f64,
}

impl Default for CreativeMetrics {
    /// 没有本地分析结果时返回给调用方的零值
    fn default() -> Self {
        Self {
            hook_score: 0.0,
            pacing_score: 0.0,
            safe_zone: false,
            duration_seconds: 0.0,
        }
    }
}

/// 创意分析的明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativeDetails {
    pub hook_factors: HookFactors,
    pub pacing_data: SceneAnalysisResult,
    pub duration: DurationAnalysis,
    pub audio: AudioSummary,
}

/// 一次本地创意分析的完整输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativeAnalysis {
    pub metrics: CreativeMetrics,
    pub details: CreativeDetails,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_scene_result() {
        let result = SceneAnalysisResult::neutral(12.5);
        assert!(result.scene_cuts.is_empty());
        assert_eq!(result.number_of_scenes, 1);
        assert_eq!(result.pacing_rate_sec_per_scene, 12.5);
        assert_eq!(result.pacing_score, 50);
    }

    #[test]
    fn test_scene_result_field_names() {
        let json = serde_json::to_value(SceneAnalysisResult::neutral(1.0)).unwrap();
        assert!(json.get("scene_cuts_timestamp").is_some());
        assert!(json.get("number_of_scenes").is_some());
        assert!(json.get("pacing_rate_sec_per_scene").is_some());
        assert!(json.get("pacing_score").is_some());
    }

    #[test]
    fn test_absent_metrics_are_zeroed() {
        let metrics = CreativeMetrics::default();
        assert_eq!(metrics.hook_score, 0.0);
        assert_eq!(metrics.pacing_score, 0.0);
        assert!(!metrics.safe_zone);
        assert_eq!(metrics.duration_seconds, 0.0);
    }
}
