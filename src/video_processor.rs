use ffmpeg_next as ffmpeg;
use anyhow::{Context, Result};
use image::RgbImage;
use std::path::Path;

use crate::frame_source::{FrameSample, FrameSource};

/// 视频处理器，基于 FFmpeg 按顺序解码本地视频文件
///
/// 打开时获取解码器句柄，处理器 drop 时释放，不在请求之间共享。
pub struct VideoProcessor {
    ictx: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    fps: f64,
    frame_count: u64,
    width: u32,
    height: u32,
    next_index: u64,
    eof_sent: bool,
    finished: bool,
}

impl VideoProcessor {
    pub fn open(input_path: impl AsRef<Path>) -> Result<Self> {
        ffmpeg::init().context("初始化 FFmpeg 失败")?;

        // 只显示错误和致命错误
        ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);

        let input_path = input_path.as_ref().to_string_lossy().to_string();
        let ictx = ffmpeg::format::input(&input_path)
            .with_context(|| format!("无法打开视频文件: {}", input_path))?;

        let video_stream = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .context("未找到视频流")?;
        let stream_index = video_stream.index();

        let fps = Self::stream_fps(&video_stream);

        let decoder_context = ffmpeg::codec::context::Context::from_parameters(video_stream.parameters())
            .context("无法创建解码器上下文")?;
        let decoder = decoder_context.decoder()
            .video()
            .context("无法创建视频解码器")?;

        // 容器没有记录帧数时，用容器时长估算
        let frame_count = if video_stream.frames() > 0 {
            video_stream.frames() as u64
        } else if ictx.duration() > 0 && fps > 0.0 {
            let duration = ictx.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64;
            (duration * fps).round() as u64
        } else {
            0
        };

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg::format::Pixel::RGB24,
            width,
            height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        ).context("无法创建缩放器")?;

        tracing::debug!(
            "打开视频: {} ({}x{}, {:.2} fps, {} 帧)",
            input_path, width, height, fps, frame_count
        );

        Ok(Self {
            ictx,
            decoder,
            scaler,
            stream_index,
            fps,
            frame_count,
            width,
            height,
            next_index: 0,
            eof_sent: false,
            finished: false,
        })
    }

    fn stream_fps(stream: &ffmpeg::format::stream::Stream) -> f64 {
        let rational_to_f64 = |r: ffmpeg::Rational| {
            if r.denominator() > 0 && r.numerator() > 0 {
                Some(r.numerator() as f64 / r.denominator() as f64)
            } else {
                None
            }
        };
        rational_to_f64(stream.avg_frame_rate())
            .or_else(|| rational_to_f64(stream.rate()))
            .unwrap_or(0.0)
    }

    /// 分辨率（宽, 高）
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// 从解码器取出下一帧原始数据，必要时继续读包
    fn decode_next(&mut self) -> Result<Option<ffmpeg::frame::Video>> {
        if self.finished {
            return Ok(None);
        }

        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => return Ok(Some(decoded)),
                Err(ffmpeg::Error::Eof) => {
                    self.finished = true;
                    return Ok(None);
                }
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::util::error::EAGAIN => {}
                Err(e) => return Err(e).context("解码视频帧失败"),
            }

            if self.eof_sent {
                self.finished = true;
                return Ok(None);
            }

            let mut packet = ffmpeg::Packet::empty();
            match packet.read(&mut self.ictx) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        self.decoder.send_packet(&packet)
                            .context("发送数据包到解码器失败")?;
                    }
                }
                Err(ffmpeg::Error::Eof) => {
                    self.decoder.send_eof().context("刷新解码器失败")?;
                    self.eof_sent = true;
                }
                Err(e) => return Err(e).context("读取数据包失败"),
            }
        }
    }

    /// 将 RGB24 帧转换为 RgbImage（按行拷贝，跳过 stride 填充）
    fn frame_to_image(&self, frame: &ffmpeg::frame::Video) -> Result<RgbImage> {
        let width = frame.width();
        let height = frame.height();
        let stride = frame.stride(0);
        let data = frame.data(0);
        let row_len = width as usize * 3;

        let mut buf = Vec::with_capacity(row_len * height as usize);
        for y in 0..height as usize {
            let start = y * stride;
            let row = data.get(start..start + row_len)
                .context("帧数据长度不足")?;
            buf.extend_from_slice(row);
        }

        RgbImage::from_raw(width, height, buf).context("构建 RGB 图像失败")
    }
}

impl FrameSource for VideoProcessor {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn next_frame(&mut self) -> Result<Option<FrameSample>> {
        let Some(decoded) = self.decode_next()? else {
            return Ok(None);
        };

        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler.run(&decoded, &mut rgb_frame)
            .context("像素格式转换失败")?;
        let image = self.frame_to_image(&rgb_frame)?;

        let sample = FrameSample::new(self.next_index, self.fps, image);
        self.next_index += 1;
        Ok(Some(sample))
    }

    fn skip_frame(&mut self) -> Result<bool> {
        let has_frame = self.decode_next()?.is_some();
        if has_frame {
            self.next_index += 1;
        }
        Ok(has_frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file() {
        let result = VideoProcessor::open("/nonexistent/ad-preflight/video.mp4");
        assert!(result.is_err());
    }
}
