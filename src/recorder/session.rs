//! 会话录像: 每次激活一个输出文件, 按采集顺序写入标注帧

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;
use chrono::{DateTime, Local};
use image::{imageops, RgbImage};
use tracing::info;

use super::avi::MjpegAviWriter;
use crate::error::ScasError;

/// 录像输出: 按顺序追加帧, 结束时定稿
pub trait FrameSink {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
    fn frames_written(&self) -> u64;
}

/// 固定的录像规格
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub quality: u8,
}

impl Default for VideoSpec {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 20,
            quality: 80,
        }
    }
}

pub trait SinkFactory: Send + Sync {
    fn create(&self, path: &Path, spec: &VideoSpec) -> Result<Box<dyn FrameSink>>;
}

/// MJPEG AVI 文件输出
pub struct AviSinkFactory;

impl SinkFactory for AviSinkFactory {
    fn create(&self, path: &Path, spec: &VideoSpec) -> Result<Box<dyn FrameSink>> {
        let file = BufWriter::new(File::create(path)?);
        let writer = MjpegAviWriter::new(file, spec.width, spec.height, spec.fps, spec.quality)?;
        Ok(Box::new(writer))
    }
}

/// 每用户固定的录像目录
#[derive(Debug, Clone)]
pub struct RecordingsDir {
    path: PathBuf,
}

impl RecordingsDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 不存在时创建
    pub fn ensure(&self) -> crate::Result<&Path> {
        fs::create_dir_all(&self.path)?;
        Ok(&self.path)
    }

    /// 用系统文件管理器打开录像目录
    pub fn reveal(&self) -> crate::Result<()> {
        let dir = self.ensure()?;

        #[cfg(target_os = "windows")]
        let program = "explorer";
        #[cfg(target_os = "macos")]
        let program = "open";
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let program = "xdg-open";

        Command::new(program).arg(dir).spawn()?;
        info!("📂 打开录像目录: {}", dir.display());
        Ok(())
    }
}

/// 由会话开始时间生成文件名
pub fn session_file_name(started: &DateTime<Local>) -> String {
    format!("scas_event_{}.avi", crate::time_string(started, "_"))
}

/// 单个会话的录像器
pub struct SessionRecorder {
    sink: Option<Box<dyn FrameSink>>,
    path: PathBuf,
    spec: VideoSpec,
    frames: u64,
}

impl SessionRecorder {
    pub fn start(
        dir: &RecordingsDir,
        factory: &dyn SinkFactory,
        spec: VideoSpec,
        started: &DateTime<Local>,
    ) -> crate::Result<Self> {
        let path = dir.ensure()?.join(session_file_name(started));
        let sink = factory.create(&path, &spec).map_err(|e| ScasError::Recorder {
            path: path.clone(),
            reason: format!("{:#}", e),
        })?;

        info!(
            "🎬 开始录像: {} ({}x{} @ {}fps)",
            path.display(),
            spec.width,
            spec.height,
            spec.fps
        );

        Ok(Self {
            sink: Some(sink),
            path,
            spec,
            frames: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    pub fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    /// 写入一帧, 尺寸不符时先缩放. 失败的帧直接丢弃, 不重试
    pub fn record(&mut self, image: &RgbImage) -> crate::Result<()> {
        let Some(sink) = self.sink.as_mut() else {
            return Err(self.error("录像已关闭"));
        };

        let result = if image.dimensions() == (self.spec.width, self.spec.height) {
            sink.write_frame(image)
        } else {
            let resized = imageops::resize(
                image,
                self.spec.width,
                self.spec.height,
                imageops::FilterType::Triangle,
            );
            sink.write_frame(&resized)
        };

        match result {
            Ok(()) => {
                self.frames += 1;
                Ok(())
            }
            Err(e) => Err(self.error(format!("{:#}", e))),
        }
    }

    /// 定稿并关闭; 重复调用无副作用
    pub fn finish(&mut self) -> crate::Result<u64> {
        match self.sink.take() {
            Some(mut sink) => {
                sink.finish()
                    .map_err(|e| self.error(format!("{:#}", e)))?;
                info!("💾 录像已保存: {} ({} 帧)", self.path.display(), self.frames);
                Ok(self.frames)
            }
            None => Ok(self.frames),
        }
    }

    fn error(&self, reason: impl Into<String>) -> ScasError {
        ScasError::Recorder {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 16, 9, 30, 5).unwrap()
    }

    #[test]
    fn file_name_is_derived_from_start_time() {
        assert_eq!(
            session_file_name(&started()),
            "scas_event_2026_10_16_09_30_05_000.avi"
        );
    }

    #[test]
    fn start_creates_directory_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = RecordingsDir::new(tmp.path().join("scas_recordings"));

        let recorder =
            SessionRecorder::start(&dir, &AviSinkFactory, VideoSpec::default(), &started()).unwrap();

        assert!(recorder.path().exists());
        assert!(recorder.path().starts_with(dir.path()));
    }

    #[test]
    fn frames_are_resized_to_target() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = RecordingsDir::new(tmp.path());
        let spec = VideoSpec {
            width: 32,
            height: 24,
            fps: 20,
            quality: 70,
        };
        let mut recorder = SessionRecorder::start(&dir, &AviSinkFactory, spec, &started()).unwrap();

        recorder.record(&RgbImage::new(320, 240)).unwrap();
        recorder.record(&RgbImage::new(32, 24)).unwrap();

        assert_eq!(recorder.frames_written(), 2);
        assert_eq!(recorder.finish().unwrap(), 2);
        let bytes = fs::read(recorder.path()).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
    }

    #[test]
    fn finish_is_idempotent_and_closes() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = RecordingsDir::new(tmp.path());
        let mut recorder =
            SessionRecorder::start(&dir, &AviSinkFactory, VideoSpec::default(), &started()).unwrap();

        recorder.finish().unwrap();
        recorder.finish().unwrap();

        assert!(!recorder.is_open());
        assert!(recorder.record(&RgbImage::new(640, 480)).is_err());
    }
}
