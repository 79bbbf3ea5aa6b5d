use anyhow::{bail, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::{debug, warn};

use crate::frame_source::FrameSource;
use crate::metadata::SceneAnalysisResult;
use crate::pacing::{pacing_score, round2};

/// 色调直方图的桶数
pub const HUE_BINS: usize = 256;

/// 默认相关系数阈值：低于该值视为镜头切换
pub const DEFAULT_CORRELATION_THRESHOLD: f64 = 0.7;

/// 默认采样步长：每 5 帧取 1 帧
pub const DEFAULT_FRAME_STEP: u64 = 5;

/// 默认缩略图边长
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 64;

/// 场景检测器，用于检测视频中的镜头切换点
///
/// 每隔 `frame_step` 帧取一帧，缩放到固定的小正方形，统计色调直方图并做 L2 归一化，
/// 与上一采样帧的直方图计算相关系数，低于 `threshold` 即记为一次切换。
/// 单帧开销与源分辨率无关；代价是色调分布相近的硬切会被漏掉。
#[derive(Debug, Clone)]
pub struct SceneDetector {
    /// 相关系数阈值
    threshold: f64,
    /// 采样步长（帧）
    frame_step: u64,
    /// 缩略图边长（像素）
    thumbnail_size: u32,
}

impl Default for SceneDetector {
    fn default() -> Self {
        Self::new(DEFAULT_CORRELATION_THRESHOLD, DEFAULT_FRAME_STEP, DEFAULT_THUMBNAIL_SIZE)
    }
}

impl SceneDetector {
    pub fn new(threshold: f64, frame_step: u64, thumbnail_size: u32) -> Self {
        Self {
            threshold,
            frame_step: frame_step.max(1),
            thumbnail_size: thumbnail_size.max(1),
        }
    }

    /// 分析整个帧来源，失败时返回中性结果，从不向调用方抛错
    pub fn analyze(&self, source: &mut dyn FrameSource) -> SceneAnalysisResult {
        let duration = source.duration_seconds();

        match self.detect_scene_cuts(source) {
            Ok(scene_cuts) => {
                let number_of_scenes = scene_cuts.len() + 1;
                let pacing_rate = duration / number_of_scenes as f64;
                debug!(
                    "检测到 {} 个切换点，{} 个场景，节奏 {:.2} 秒/场景",
                    scene_cuts.len(), number_of_scenes, pacing_rate
                );
                SceneAnalysisResult {
                    scene_cuts,
                    number_of_scenes,
                    pacing_rate_sec_per_scene: round2(pacing_rate),
                    pacing_score: pacing_score(pacing_rate),
                }
            }
            Err(e) => {
                warn!("场景分析失败，使用中性评分: {:#}", e);
                SceneAnalysisResult::neutral(duration)
            }
        }
    }

    /// 检测场景变化点
    /// 返回切换发生的时间戳（秒），严格递增
    pub fn detect_scene_cuts(&self, source: &mut dyn FrameSource) -> Result<Vec<f64>> {
        let fps = source.fps();
        if !(fps > 0.0) {
            bail!("无效的帧率: {}", fps);
        }

        let mut scene_cuts = Vec::new();
        let mut prev_hist: Option<[f64; HUE_BINS]> = None;

        while let Some(frame) = source.next_frame()? {
            let hist = self.hue_histogram(&frame.image)?;

            if let Some(prev) = prev_hist.as_ref() {
                let score = correlation(prev, &hist);
                if score < self.threshold {
                    scene_cuts.push(frame.index as f64 / fps);
                }
            }
            prev_hist = Some(hist);

            // 跳过后续 frame_step - 1 帧
            let mut exhausted = false;
            for _ in 1..self.frame_step {
                if !source.skip_frame()? {
                    exhausted = true;
                    break;
                }
            }
            if exhausted {
                break;
            }
        }

        Ok(scene_cuts)
    }

    /// 缩略图的色调直方图（L2 归一化）
    ///
    /// 色调使用 8 位 HSV 的刻度（0-179）。
    pub fn hue_histogram(&self, image: &RgbImage) -> Result<[f64; HUE_BINS]> {
        if image.width() == 0 || image.height() == 0 {
            bail!("空图像: {}x{}", image.width(), image.height());
        }

        let thumbnail = imageops::resize(
            image,
            self.thumbnail_size,
            self.thumbnail_size,
            FilterType::Triangle,
        );

        let mut hist = [0f64; HUE_BINS];
        for pixel in thumbnail.pixels() {
            let hue = rgb_to_hue(pixel[0], pixel[1], pixel[2]);
            let bin = ((hue / 2.0).round() as usize).min(HUE_BINS - 1);
            hist[bin] += 1.0;
        }

        let norm = hist.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in hist.iter_mut() {
                *v /= norm;
            }
        }

        Ok(hist)
    }
}

/// RGB 转色调（0-360 度）
fn rgb_to_hue(r: u8, g: u8, b: u8) -> f64 {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;

    let max = r.max(g.max(b));
    let min = r.min(g.min(b));
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta) % 6.0)
    } else if max == g {
        60.0 * (((b - r) / delta) + 2.0)
    } else {
        60.0 * (((r - g) / delta) + 4.0)
    };

    if h < 0.0 { h + 360.0 } else { h }
}

/// 两个直方图的皮尔逊相关系数，范围 [-1, 1]
///
/// 任一直方图方差为 0 时返回 1.0（无法判断为切换）。
pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 1.0;
    }

    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;

    let mut num = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a[..n].iter().zip(&b[..n]) {
        let da = x - mean_a;
        let db = y - mean_b;
        num += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denom = (var_a * var_b).sqrt();
    if denom <= f64::EPSILON {
        1.0
    } else {
        num / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_source::{FrameSample, MemoryFrameSource};
    use crate::pacing::NEUTRAL_PACING_SCORE;

    fn solid(r: u8, g: u8, b: u8) -> RgbImage {
        RgbImage::from_pixel(32, 32, image::Rgb([r, g, b]))
    }

    /// 按 (颜色, 帧数) 拼接帧序列
    fn sequence(parts: &[((u8, u8, u8), usize)]) -> Vec<RgbImage> {
        parts
            .iter()
            .flat_map(|&((r, g, b), count)| std::iter::repeat(solid(r, g, b)).take(count))
            .collect()
    }

    const RED: (u8, u8, u8) = (220, 20, 20);
    const BLUE: (u8, u8, u8) = (20, 20, 220);
    const GREEN: (u8, u8, u8) = (20, 200, 20);

    #[test]
    fn test_identical_histograms_correlate() {
        let detector = SceneDetector::default();
        let a = detector.hue_histogram(&solid(RED.0, RED.1, RED.2)).unwrap();
        let b = detector.hue_histogram(&solid(RED.0, RED.1, RED.2)).unwrap();
        assert!((correlation(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_different_hues_fall_below_threshold() {
        let detector = SceneDetector::default();
        let a = detector.hue_histogram(&solid(RED.0, RED.1, RED.2)).unwrap();
        let b = detector.hue_histogram(&solid(BLUE.0, BLUE.1, BLUE.2)).unwrap();
        let score = correlation(&a, &b);
        assert!(score < DEFAULT_CORRELATION_THRESHOLD);
        assert!(score >= -1.0);
    }

    #[test]
    fn test_histogram_is_l2_normalized() {
        let detector = SceneDetector::default();
        let hist = detector.hue_histogram(&solid(GREEN.0, GREEN.1, GREEN.2)).unwrap();
        let norm = hist.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_image_is_an_error() {
        let detector = SceneDetector::default();
        assert!(detector.hue_histogram(&RgbImage::new(0, 0)).is_err());
    }

    #[test]
    fn test_no_cuts_over_twenty_seconds() {
        let detector = SceneDetector::default();
        let mut source = MemoryFrameSource::new(sequence(&[(RED, 200)]), 10.0);

        let result = detector.analyze(&mut source);
        assert!(result.scene_cuts.is_empty());
        assert_eq!(result.number_of_scenes, 1);
        assert!((result.pacing_rate_sec_per_scene - 20.0).abs() < 1e-9);
        assert_eq!(result.pacing_score, 40);
    }

    #[test]
    fn test_cuts_every_two_seconds() {
        let detector = SceneDetector::default();
        let frames = sequence(&[
            (RED, 20),
            (BLUE, 20),
            (GREEN, 20),
            (RED, 20),
            (BLUE, 20),
            (GREEN, 20),
        ]);
        let mut source = MemoryFrameSource::new(frames, 10.0);

        let result = detector.analyze(&mut source);
        assert_eq!(result.scene_cuts, vec![2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(result.number_of_scenes, 6);
        assert!((result.pacing_rate_sec_per_scene - 2.0).abs() < 1e-9);
        assert_eq!(result.pacing_score, 100);
    }

    #[test]
    fn test_cut_reported_at_sampled_frame() {
        // 切换发生在第 22 帧，第一个采样到的新画面是第 25 帧
        let detector = SceneDetector::default();
        let mut source = MemoryFrameSource::new(sequence(&[(RED, 22), (BLUE, 28)]), 10.0);

        let cuts = detector.detect_scene_cuts(&mut source).unwrap();
        assert_eq!(cuts, vec![2.5]);
    }

    #[test]
    fn test_scene_count_is_cuts_plus_one() {
        let detector = SceneDetector::default();
        for cuts in 0..4usize {
            let mut parts = Vec::new();
            for i in 0..=cuts {
                parts.push((if i % 2 == 0 { RED } else { BLUE }, 10));
            }
            let mut source = MemoryFrameSource::new(sequence(&parts), 5.0);
            let result = detector.analyze(&mut source);
            assert_eq!(result.scene_cuts.len(), cuts);
            assert_eq!(result.number_of_scenes, cuts + 1);
        }
    }

    #[test]
    fn test_rerun_is_deterministic() {
        let detector = SceneDetector::default();
        let frames = sequence(&[(RED, 15), (GREEN, 15), (BLUE, 30)]);

        let first = detector.analyze(&mut MemoryFrameSource::new(frames.clone(), 10.0));
        let second = detector.analyze(&mut MemoryFrameSource::new(frames, 10.0));
        assert_eq!(first, second);
    }

    #[test]
    fn test_cuts_strictly_increasing() {
        let detector = SceneDetector::new(0.7, 1, 16);
        let frames = sequence(&[(RED, 3), (BLUE, 3), (GREEN, 3), (RED, 3)]);
        let mut source = MemoryFrameSource::new(frames, 3.0);
        let cuts = detector.detect_scene_cuts(&mut source).unwrap();
        assert_eq!(cuts.len(), 3);
        assert!(cuts.windows(2).all(|w| w[0] < w[1]));
    }

    /// 在指定帧序号处解码失败的帧来源
    struct FailingSource {
        inner: MemoryFrameSource,
        fail_at: u64,
        position: u64,
    }

    impl FrameSource for FailingSource {
        fn fps(&self) -> f64 {
            self.inner.fps()
        }

        fn frame_count(&self) -> u64 {
            self.inner.frame_count()
        }

        fn next_frame(&mut self) -> Result<Option<FrameSample>> {
            if self.position == self.fail_at {
                bail!("corrupt packet");
            }
            self.position += 1;
            self.inner.next_frame()
        }

        fn skip_frame(&mut self) -> Result<bool> {
            if self.position == self.fail_at {
                bail!("corrupt packet");
            }
            self.position += 1;
            self.inner.skip_frame()
        }
    }

    #[test]
    fn test_decode_failure_degrades_to_neutral() {
        let detector = SceneDetector::default();
        let mut source = FailingSource {
            inner: MemoryFrameSource::new(sequence(&[(RED, 20), (BLUE, 180)]), 10.0),
            fail_at: 42,
            position: 0,
        };

        let result = detector.analyze(&mut source);
        assert!(result.scene_cuts.is_empty());
        assert_eq!(result.number_of_scenes, 1);
        assert_eq!(result.pacing_score, NEUTRAL_PACING_SCORE);
        assert!((result.pacing_rate_sec_per_scene - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_fps_degrades_to_neutral() {
        let detector = SceneDetector::default();
        let mut source = MemoryFrameSource::new(sequence(&[(RED, 10)]), 0.0);
        let result = detector.analyze(&mut source);
        assert_eq!(result.pacing_score, NEUTRAL_PACING_SCORE);
        assert_eq!(result.pacing_rate_sec_per_scene, 0.0);
    }
}
