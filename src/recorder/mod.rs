/// 录像系统 (Recording System)
///
/// - Session: 会话录像器 + 录像目录
/// - Avi:     Motion-JPEG AVI 写入器
pub mod avi;
pub mod session;

pub use avi::MjpegAviWriter;
pub use session::{
    session_file_name, AviSinkFactory, FrameSink, RecordingsDir, SessionRecorder, SinkFactory,
    VideoSpec,
};
