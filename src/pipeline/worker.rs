//! 采集工作线程: 打开摄像头 → 检测循环 → 单一清理路径
//!
//! 摄像头和录像句柄只在本线程内持有. 无论循环如何结束 (停用请求、读帧失败、
//! 中途 panic), 清理路径都会执行且只执行一次, 并以拆除完成信号收尾.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{debug, error, info, warn};

use super::frame_buffer::SharedFrameBuffer;
use super::lifecycle::{ControlHandle, ControllerEvent, PipelineParts, PipelineSettings};
use crate::alert::AlertDispatcher;
use crate::detection::{Detection, Frame};
use crate::error::ScasError;
use crate::input::{open_first, FrameSource};
use crate::recorder::SessionRecorder;

pub(crate) struct SessionContext {
    pub(crate) control: Arc<ControlHandle>,
    pub(crate) frames: Arc<SharedFrameBuffer>,
    pub(crate) parts: PipelineParts,
    pub(crate) settings: Arc<PipelineSettings>,
}

/// 清理路径之外的 panic: 停止警报、清空画面后放行下一次激活
struct TeardownGuard<'a> {
    ctx: &'a SessionContext,
}

impl Drop for TeardownGuard<'_> {
    fn drop(&mut self) {
        // 正常路径已在清理末尾置位; 此处再置位可能误放行下一个会话
        if !thread::panicking() {
            return;
        }
        error!("❌ 工作线程 panic, 强制完成拆除");
        let alarm = &self.ctx.parts.alarm;
        if alarm.is_playing() {
            if let Err(e) = alarm.stop() {
                warn!("⚠️ 警报声停止失败: {:#}", e);
            }
        }
        self.ctx.frames.clear();
        self.ctx.control.finish_teardown();
    }
}

/// 一次激活持有的资源
struct Session {
    camera_index: usize,
    camera: Option<Box<dyn FrameSource>>,
    recorder: Option<SessionRecorder>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub frames: u64,
    pub person_frames: u64,
    pub recorded: u64,
    pub record_errors: u64,
    pub detect_errors: u64,
}

/// 每秒打印一次帧率
struct RateMeter {
    window_start: Instant,
    window_frames: u32,
}

impl RateMeter {
    fn new() -> Self {
        Self {
            window_start: Instant::now(),
            window_frames: 0,
        }
    }

    fn tick(&mut self, stats: &SessionStats) {
        self.window_frames += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let fps = self.window_frames as f64 / elapsed.as_secs_f64();
            debug!(
                "📊 采集 {:.1} fps | 总帧数 {} | 有人 {} | 已录 {}",
                fps, stats.frames, stats.person_frames, stats.recorded
            );
            self.window_start = Instant::now();
            self.window_frames = 0;
        }
    }
}

pub(crate) fn run(ctx: SessionContext) {
    let _guard = TeardownGuard { ctx: &ctx };

    if !ctx.settings.camera_settle.is_zero() {
        thread::sleep(ctx.settings.camera_settle);
    }

    let mut session = match open_session(&ctx) {
        Ok(session) => session,
        Err(e) => {
            error!("❌ 激活失败: {}", e);
            let event = if matches!(e, ScasError::DeviceUnavailable { .. }) {
                ControllerEvent::DeviceUnavailable(e.to_string())
            } else {
                ControllerEvent::ActivationFailed(e.to_string())
            };
            ctx.control.emit(event);
            // 没有会话资源, 无需等待释放
            ctx.control.finish_teardown();
            return;
        }
    };

    let mut stats = SessionStats::default();
    if ctx.control.mark_active() {
        info!("🟢 监控已启动 (摄像头 #{})", session.camera_index);
        let looped = panic::catch_unwind(AssertUnwindSafe(|| {
            detection_loop(&ctx, &mut session, &mut stats)
        }));
        if looped.is_err() {
            error!("❌ 检测循环 panic, 转入清理");
        }
    } else {
        info!("⏹️ 初始化期间收到停用请求");
    }

    // 读帧失败时也走停用流程
    ctx.control.request_stop();
    cleanup(&ctx, &mut session, &stats);
}

/// 打开摄像头并创建录像文件; 录像创建失败时释放已打开的摄像头
fn open_session(ctx: &SessionContext) -> crate::Result<Session> {
    let (camera_index, mut camera) =
        open_first(ctx.parts.camera.as_ref(), &ctx.settings.camera_indices)?;

    let started = Local::now();
    let recorder = match SessionRecorder::start(
        &ctx.settings.recordings,
        ctx.parts.sinks.as_ref(),
        ctx.settings.video,
        &started,
    ) {
        Ok(recorder) => recorder,
        Err(e) => {
            if let Err(release_err) = camera.release() {
                warn!("⚠️ 摄像头释放失败: {:#}", release_err);
            }
            return Err(e);
        }
    };

    ctx.control.emit(ControllerEvent::SessionStarted {
        camera: camera_index,
        recording: recorder.path().to_path_buf(),
    });

    Ok(Session {
        camera_index,
        camera: Some(camera),
        recorder: Some(recorder),
    })
}

fn detection_loop(ctx: &SessionContext, session: &mut Session, stats: &mut SessionStats) {
    let settings = &ctx.settings;
    let mut dispatcher = AlertDispatcher::new(
        ctx.parts.notifier.clone(),
        ctx.parts.alarm.clone(),
        settings.notification_title.clone(),
        settings.notification_body.clone(),
    );
    let mut meter = RateMeter::new();

    while ctx.control.should_continue() {
        let Some(camera) = session.camera.as_mut() else {
            break;
        };
        let image = match camera.read() {
            Ok(Some(image)) => image,
            Ok(None) => {
                warn!("📹 摄像头 #{} 无画面, 结束会话", session.camera_index);
                break;
            }
            Err(e) => {
                warn!("📹 摄像头 #{} 读帧失败: {:#}", session.camera_index, e);
                break;
            }
        };

        let mut frame = Frame::new(image, stats.frames);
        let detections = detect(ctx, &frame, stats);
        let people = settings.filter.select(&detections);
        let person_detected = !people.is_empty();

        // 检测在标注之前, 标注过的帧不会再送入检测
        ctx.parts.annotator.draw(&mut frame.image, &people);
        dispatcher.update(person_detected);

        if let Some(recorder) = session.recorder.as_mut() {
            match recorder.record(&frame.image) {
                Ok(()) => stats.recorded += 1,
                Err(e) => {
                    stats.record_errors += 1;
                    warn!("⚠️ 帧 #{} 写入失败, 已丢弃: {}", frame.index, e);
                }
            }
        }

        ctx.frames.publish(frame);

        stats.frames += 1;
        if person_detected {
            stats.person_frames += 1;
        }
        meter.tick(stats);
    }
}

/// 检测失败按"无检测结果"处理
fn detect(ctx: &SessionContext, frame: &Frame, stats: &mut SessionStats) -> Vec<Detection> {
    let mut detector = ctx
        .parts
        .detector
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    match detector.detect(&frame.image) {
        Ok(detections) => detections,
        Err(e) => {
            stats.detect_errors += 1;
            warn!("⚠️ 帧 #{} 检测失败: {:#}", frame.index, e);
            Vec::new()
        }
    }
}

/// 单一清理路径: 每一步独立执行, 前一步失败不影响后一步
fn cleanup(ctx: &SessionContext, session: &mut Session, stats: &SessionStats) {
    info!("🧹 开始清理会话");

    if let Some(mut camera) = session.camera.take() {
        match camera.release() {
            Ok(()) => info!("📹 摄像头 #{} 已释放", session.camera_index),
            Err(e) => warn!("⚠️ 摄像头释放失败: {:#}", e),
        }
    }

    if let Some(mut recorder) = session.recorder.take() {
        if let Err(e) = recorder.finish() {
            warn!("⚠️ 录像定稿失败: {}", e);
        }
    }

    if ctx.parts.alarm.is_playing() {
        if let Err(e) = ctx.parts.alarm.stop() {
            warn!("⚠️ 警报声停止失败: {:#}", e);
        }
    }

    ctx.frames.clear();

    if !ctx.settings.release_grace.is_zero() {
        thread::sleep(ctx.settings.release_grace);
    }

    info!(
        "🔴 会话结束: {} 帧, 录制 {} 帧, 写入失败 {}, 检测失败 {}",
        stats.frames, stats.recorded, stats.record_errors, stats.detect_errors
    );
    ctx.control.emit(ControllerEvent::SessionEnded {
        frames: stats.frames,
        recorded: stats.recorded,
    });
    ctx.control.finish_teardown();
}
