/// 视频输入系统 (Video Input System)
///
/// 由采集工作线程独占使用
/// - FrameSource / CameraOpener: 帧源接口, 按优先顺序打开摄像头
/// - FfmpegCamera: 本地摄像头 (DirectShow/AVFoundation/V4L2, camera 功能)
/// - CaptureFilter: FFmpeg 帧 → RGB 图像
pub mod camera;

#[cfg(feature = "camera")]
pub mod decode_filter;
#[cfg(feature = "camera")]
pub mod ffmpeg_camera;

pub use camera::{open_first, CameraOpener, FrameSource};

#[cfg(feature = "camera")]
pub use decode_filter::CaptureFilter;
#[cfg(feature = "camera")]
pub use ffmpeg_camera::{get_camera_devices, FfmpegCamera, FfmpegCameraOpener};
