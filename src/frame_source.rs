use anyhow::Result;
use image::RgbImage;

/// 单个解码帧
#[derive(Debug, Clone)]
pub struct FrameSample {
    /// 帧序号（从 0 开始）
    pub index: u64,
    /// 时间戳（秒）= index / fps
    pub timestamp: f64,
    /// RGB 图像
    pub image: RgbImage,
}

impl FrameSample {
    pub fn new(index: u64, fps: f64, image: RgbImage) -> Self {
        let timestamp = if fps > 0.0 { index as f64 / fps } else { 0.0 };
        Self {
            index,
            timestamp,
            image,
        }
    }
}

/// 帧来源：按顺序产出解码帧，只能消费一次
///
/// 实现者拥有底层解码资源，资源随实现者一起 drop 释放。
pub trait FrameSource {
    /// 帧率
    fn fps(&self) -> f64;

    /// 总帧数
    fn frame_count(&self) -> u64;

    /// 视频时长（秒），未知时为 0
    fn duration_seconds(&self) -> f64 {
        let fps = self.fps();
        if fps > 0.0 {
            self.frame_count() as f64 / fps
        } else {
            0.0
        }
    }

    /// 解码下一帧，流结束时返回 `Ok(None)`
    fn next_frame(&mut self) -> Result<Option<FrameSample>>;

    /// 跳过下一帧，返回是否还有帧
    ///
    /// 默认实现直接解码后丢弃；解码器可以覆盖它以省去像素格式转换。
    fn skip_frame(&mut self) -> Result<bool> {
        Ok(self.next_frame()?.is_some())
    }
}

/// 内存中的帧序列（已解码的字节流、测试数据）
#[derive(Debug, Clone)]
pub struct MemoryFrameSource {
    frames: Vec<RgbImage>,
    fps: f64,
    cursor: usize,
}

impl MemoryFrameSource {
    pub fn new(frames: Vec<RgbImage>, fps: f64) -> Self {
        Self {
            frames,
            fps,
            cursor: 0,
        }
    }
}

impl FrameSource for MemoryFrameSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> u64 {
        self.frames.len() as u64
    }

    fn next_frame(&mut self) -> Result<Option<FrameSample>> {
        let Some(image) = self.frames.get(self.cursor) else {
            return Ok(None);
        };
        let sample = FrameSample::new(self.cursor as u64, self.fps, image.clone());
        self.cursor += 1;
        Ok(Some(sample))
    }

    fn skip_frame(&mut self) -> Result<bool> {
        if self.cursor < self.frames.len() {
            self.cursor += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_timestamps() {
        let frames = vec![RgbImage::new(4, 4); 3];
        let mut source = MemoryFrameSource::new(frames, 2.0);

        assert_eq!(source.frame_count(), 3);
        assert!((source.duration_seconds() - 1.5).abs() < 1e-9);

        assert!(source.skip_frame().unwrap());
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.index, 1);
        assert!((frame.timestamp - 0.5).abs() < 1e-9);

        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
        assert!(!source.skip_frame().unwrap());
    }

    #[test]
    fn test_zero_fps_duration() {
        let source = MemoryFrameSource::new(vec![RgbImage::new(1, 1)], 0.0);
        assert_eq!(source.duration_seconds(), 0.0);
    }
}
