use anyhow::Result;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};

use crate::frame_source::FrameSource;
use crate::hook::score_hook;
use crate::metadata::{AudioSummary, CreativeAnalysis, CreativeDetails, CreativeMetrics, DurationAnalysis};
use crate::pacing::{is_valid_duration, round2};
use crate::scene_detector::{
    SceneDetector, DEFAULT_CORRELATION_THRESHOLD, DEFAULT_FRAME_STEP, DEFAULT_THUMBNAIL_SIZE,
};
use crate::video_processor::VideoProcessor;

/// 创意分析配置
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// 场景切换的相关系数阈值
    pub scene_threshold: f64,
    /// 采样步长（帧）
    pub frame_step: u64,
    /// 缩略图边长（像素）
    pub thumbnail_size: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            scene_threshold: DEFAULT_CORRELATION_THRESHOLD,
            frame_step: DEFAULT_FRAME_STEP,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
        }
    }
}

impl AnalysisConfig {
    pub fn scene_detector(&self) -> SceneDetector {
        SceneDetector::new(self.scene_threshold, self.frame_step, self.thumbnail_size)
    }
}

/// 依次执行时长校验、场景分析和钩子评分，组装创意指标
///
/// 帧来源只借用，由调用方持有并负责释放。
pub fn analyze_creative(source: &mut dyn FrameSource, config: &AnalysisConfig) -> CreativeAnalysis {
    let total_start = Instant::now();

    // 1. 时长
    let duration_seconds = source.duration_seconds();
    let duration = DurationAnalysis {
        duration_seconds: round2(duration_seconds),
        is_valid_duration: is_valid_duration(duration_seconds),
    };
    info!(
        "[创意分析] 时长 {:.2}s，有效: {}",
        duration.duration_seconds, duration.is_valid_duration
    );

    // 2. 场景和节奏
    let scene_start = Instant::now();
    let scenes = config.scene_detector().analyze(source);
    info!(
        "[创意分析] 场景分析完成，耗时 {:.2}s: {} 个场景，节奏 {:.2} 秒/场景，节奏分 {}",
        scene_start.elapsed().as_secs_f64(),
        scenes.number_of_scenes,
        scenes.pacing_rate_sec_per_scene,
        scenes.pacing_score
    );

    // 3. 前 3 秒钩子
    let hook = score_hook(&scenes.scene_cuts);
    info!("[创意分析] 钩子分 {}，快切: {}", hook.hook_score, hook.hook_factors.has_fast_cut);

    let metrics = CreativeMetrics {
        hook_score: hook.hook_score,
        pacing_score: scenes.pacing_score as f64,
        safe_zone: true,
        duration_seconds: duration.duration_seconds,
    };

    info!("[创意分析] 总耗时 {:.2}s", total_start.elapsed().as_secs_f64());

    CreativeAnalysis {
        metrics,
        details: CreativeDetails {
            hook_factors: hook.hook_factors,
            pacing_data: scenes,
            duration,
            audio: AudioSummary::default(),
        },
    }
}

/// 打开本地视频文件并分析
///
/// 文件无法打开时返回错误；打开之后的解码错误在场景分析中降级处理。
/// 解码器在函数返回时释放。
pub fn analyze_video_file(input_video_path: impl AsRef<Path>, config: &AnalysisConfig) -> Result<CreativeAnalysis> {
    let input_video_path = input_video_path.as_ref();
    info!("🎬 [创意分析] 开始分析视频: {}", input_video_path.display());

    let mut processor = VideoProcessor::open(input_video_path)
        .map_err(|e| {
            error!("❌ [创意分析] 打开视频失败: {:#}", e);
            e
        })?;
    let (width, height) = processor.resolution();
    info!("  • 分辨率: {}x{}", width, height);
    info!("  • 帧率: {:.2} fps", processor.fps());

    Ok(analyze_creative(&mut processor, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_source::MemoryFrameSource;
    use image::RgbImage;

    fn frames(parts: &[([u8; 3], usize)]) -> Vec<RgbImage> {
        parts
            .iter()
            .flat_map(|&(rgb, count)| std::iter::repeat(RgbImage::from_pixel(16, 16, image::Rgb(rgb))).take(count))
            .collect()
    }

    #[test]
    fn test_static_twenty_second_video() {
        let mut source = MemoryFrameSource::new(frames(&[([200, 30, 30], 600)]), 30.0);
        let analysis = analyze_creative(&mut source, &AnalysisConfig::default());

        assert_eq!(analysis.details.pacing_data.number_of_scenes, 1);
        assert_eq!(analysis.details.pacing_data.pacing_rate_sec_per_scene, 20.0);
        assert_eq!(analysis.metrics.pacing_score, 40.0);
        assert_eq!(analysis.metrics.hook_score, 30.0);
        assert!(analysis.metrics.safe_zone);
        assert_eq!(analysis.metrics.duration_seconds, 20.0);
        assert!(analysis.details.duration.is_valid_duration);
        assert!(!analysis.details.hook_factors.has_fast_cut);
    }

    #[test]
    fn test_early_cut_lifts_hook() {
        // 第 2 秒切换，总长 16 秒
        let mut source = MemoryFrameSource::new(
            frames(&[([200, 30, 30], 20), ([30, 30, 200], 140)]),
            10.0,
        );
        let analysis = analyze_creative(&mut source, &AnalysisConfig::default());

        assert_eq!(analysis.details.pacing_data.scene_cuts, vec![2.0]);
        assert_eq!(analysis.metrics.hook_score, 70.0);
        assert!(analysis.details.hook_factors.has_fast_cut);
        // 16 秒 / 2 个场景 = 8 秒/场景
        assert_eq!(analysis.metrics.pacing_score, 40.0);
    }

    #[test]
    fn test_short_video_flags_invalid_duration() {
        let mut source = MemoryFrameSource::new(frames(&[([30, 200, 30], 50)]), 10.0);
        let analysis = analyze_creative(&mut source, &AnalysisConfig::default());
        assert!(!analysis.details.duration.is_valid_duration);
        assert_eq!(analysis.metrics.duration_seconds, 5.0);
    }

    #[test]
    fn test_audio_placeholder() {
        let mut source = MemoryFrameSource::new(frames(&[([30, 200, 30], 10)]), 10.0);
        let analysis = analyze_creative(&mut source, &AnalysisConfig::default());
        assert_eq!(analysis.details.audio.music_tempo_bpm, 0);
        assert_eq!(analysis.details.audio.audio_vibe, "unknown");
        assert!(!analysis.details.audio.has_voiceover);
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-video.mp4");
        std::fs::write(&path, b"definitely not a video").unwrap();
        assert!(analyze_video_file(&path, &AnalysisConfig::default()).is_err());
    }
}
