//! 摄像头输入模块 - 基于 FFmpeg 的本地摄像头
//!
//! 处理本地摄像头输入,支持 DirectShow(Windows) / AVFoundation(macOS) / V4L2(Linux)

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use crossbeam_channel::{bounded, Receiver};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use image::RgbImage;
use tracing::{info, warn};

use super::camera::{CameraOpener, FrameSource};
use super::decode_filter::CaptureFilter;

/// 按索引打开 FFmpeg 摄像头
pub struct FfmpegCameraOpener {
    width: u32,
    height: u32,
    open_timeout: Duration,
}

impl FfmpegCameraOpener {
    pub fn new(width: u32, height: u32, open_timeout: Duration) -> Self {
        Self {
            width,
            height,
            open_timeout,
        }
    }
}

impl CameraOpener for FfmpegCameraOpener {
    fn open(&self, index: usize) -> Result<Box<dyn FrameSource>> {
        let camera_url = format_camera_url(index)?;
        info!("🔗 摄像头 #{} URL: {} (格式: {})", index, camera_url, input_format());

        // 容量很小: 检测跟不上时丢帧, 不积压
        let (tx, rx) = bounded(2);

        // 构建帧处理管线
        let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
        let pipe = pipe.filter("capture", Box::new(CaptureFilter::new(tx, index)));
        let out = create_null_output().add_frame_pipeline(pipe);

        let input = Input::new(camera_url).set_format(input_format());
        let filter_desc = format!("scale={}:{},format=rgb24", self.width, self.height);

        let ctx = FfmpegContext::builder()
            .input(input)
            .filter_descs(vec![filter_desc.as_str()])
            .output(out)
            .build()
            .map_err(|e| anyhow!("摄像头构建失败: {}", e))?;

        let sch = ctx.start().map_err(|e| anyhow!("摄像头启动失败: {}", e))?;
        let abort: Box<dyn FnOnce()> = Box::new(move || {
            sch.abort();
        });

        // 以首帧到达作为"已打开"
        match rx.recv_timeout(self.open_timeout) {
            Ok(first) => Ok(Box::new(FfmpegCamera {
                index,
                rx,
                pending: Some(first),
                abort: Some(abort),
            })),
            Err(e) => {
                abort();
                bail!("{:?} 内未收到画面: {}", self.open_timeout, e)
            }
        }
    }
}

/// 运行中的 FFmpeg 摄像头
pub struct FfmpegCamera {
    index: usize,
    rx: Receiver<RgbImage>,
    pending: Option<RgbImage>,
    abort: Option<Box<dyn FnOnce()>>,
}

impl FrameSource for FfmpegCamera {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }
        if self.abort.is_none() {
            bail!("摄像头 #{} 已释放", self.index);
        }
        // 发送端随解码管线结束而关闭 → 设备断开
        Ok(self.rx.recv().ok())
    }

    fn release(&mut self) -> Result<()> {
        match self.abort.take() {
            Some(abort) => {
                abort();
                info!("📷 摄像头 #{} 已释放", self.index);
                Ok(())
            }
            None => bail!("摄像头 #{} 重复释放", self.index),
        }
    }

    fn describe(&self) -> String {
        format!("ffmpeg:{}#{}", input_format(), self.index)
    }
}

impl Drop for FfmpegCamera {
    fn drop(&mut self) {
        if let Some(abort) = self.abort.take() {
            warn!("⚠️ 摄像头 #{} 未显式释放, 在析构时中止", self.index);
            abort();
        }
    }
}

fn input_format() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "dshow" // DirectShow
    }
    #[cfg(target_os = "macos")]
    {
        "avfoundation" // AVFoundation
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        "v4l2" // Video4Linux2
    }
}

/// 格式化摄像头URL - 根据平台选择
fn format_camera_url(index: usize) -> Result<String> {
    #[cfg(target_os = "windows")]
    {
        // dshow 只认设备名
        let devices = get_camera_devices();
        match devices.into_iter().find(|(i, _)| *i == index) {
            Some((_, name)) => Ok(format!("video={}", name)),
            None => bail!("设备索引 {} 不存在", index),
        }
    }
    #[cfg(target_os = "macos")]
    {
        Ok(format!("{}", index))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        Ok(format!("/dev/video{}", index))
    }
}

/// 获取可用的摄像头设备列表
pub fn get_camera_devices() -> Vec<(usize, String)> {
    match ez_ffmpeg::device::get_input_video_devices() {
        Ok(devices) => devices.into_iter().enumerate().collect(),
        Err(e) => {
            warn!("⚠️ 获取摄像头列表失败: {}", e);
            vec![]
        }
    }
}
