/// FFmpeg采集过滤器模块
/// FFmpeg capture filter module
use crossbeam_channel::{Sender, TrySendError};
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;
use std::time::Instant;
use tracing::{debug, info, warn};

/// FFmpeg采集过滤器: 摄像头 → RGB24帧 → 采集通道
///
/// 上游滤镜链已输出 rgb24, 这里只做逐行拷贝(去掉 linesize 填充).
#[derive(Clone)]
pub struct CaptureFilter {
    tx: Sender<RgbImage>,
    device_index: usize,
    count: usize,
    last: Instant,
    dropped_frames: usize, // 消费者来不及处理而丢弃的帧
    total_frames: usize,
}

impl CaptureFilter {
    pub fn new(tx: Sender<RgbImage>, device_index: usize) -> Self {
        Self {
            tx,
            device_index,
            count: 0,
            last: Instant::now(),
            dropped_frames: 0,
            total_frames: 0,
        }
    }
}

impl FrameFilter for CaptureFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        info!("✅ 摄像头 #{} 采集线程启动", self.device_index);
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        self.total_frames += 1;

        // SAFETY: 空指针已检查, 读取范围受 width/height/linesize 约束
        let image = unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width as usize;
            let h = (*frame.as_ptr()).height as usize;
            let plane = (*frame.as_ptr()).data[0];
            let stride = (*frame.as_ptr()).linesize[0] as usize;

            if w == 0 || h == 0 || plane.is_null() || stride < w * 3 {
                self.dropped_frames += 1;
                if self.total_frames <= 10 {
                    warn!("⚠️ 丢弃帧 #{}: 非法帧 {}x{} stride={}", self.total_frames, w, h, stride);
                }
                return Ok(None);
            }

            let mut rgb = Vec::with_capacity(w * h * 3);
            for row in 0..h {
                let line = std::slice::from_raw_parts(plane.add(row * stride), w * 3);
                rgb.extend_from_slice(line);
            }
            match RgbImage::from_raw(w as u32, h as u32, rgb) {
                Some(image) => image,
                None => return Ok(None),
            }
        };

        self.count += 1;
        if self.last.elapsed().as_secs_f64() >= 1.0 {
            let fps = self.count as f64 / self.last.elapsed().as_secs_f64();
            debug!(
                "📺 采集统计: 实际{:.1}fps | 总帧{} | 丢弃{}",
                fps, self.total_frames, self.dropped_frames
            );
            self.last = Instant::now();
            self.count = 0;
        }

        match self.tx.try_send(image) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => self.dropped_frames += 1,
            // 读端已释放: 停止采集
            Err(TrySendError::Disconnected(_)) => return Err("capture receiver closed".to_string()),
        }

        Ok(Some(frame))
    }
}
