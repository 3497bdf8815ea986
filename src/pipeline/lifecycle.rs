//! 生命周期控制器 (Lifecycle Controller)
//!
//! 状态机: Inactive → Initializing → Active → Disconnecting → Inactive
//!
//! "拆除完成"标志是防止两个会话重叠的唯一机制: 新的激活尝试开始时清除一次,
//! 会话清理路径结束时置位一次. 标志未置位时的激活请求直接拒绝, 不排队.

use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{error, info, warn};

use super::frame_buffer::SharedFrameBuffer;
use super::worker::{self, SessionContext};
use crate::alert::{Alarm, Notifier};
use crate::config::ScasConfig;
use crate::detection::{Annotator, PersonFilter, SharedDetector};
use crate::input::CameraOpener;
use crate::recorder::{RecordingsDir, SinkFactory, VideoSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Inactive,
    Initializing,
    Active,
    Disconnecting,
}

impl LifecycleState {
    pub fn status_text(&self) -> &'static str {
        match self {
            LifecycleState::Inactive => "Status: Inactive",
            LifecycleState::Initializing => "Status: Initializing...",
            LifecycleState::Active => "Status: Active",
            LifecycleState::Disconnecting => "Status: Disconnecting...",
        }
    }
}

/// 激活请求的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Started,
    /// 上一个会话仍在拆除, 请稍候 (提示, 不是错误)
    TeardownPending,
}

/// 控制器事件 (工作线程 → 界面)
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    StateChanged(LifecycleState),
    ActivationRejected,
    DeviceUnavailable(String),
    ActivationFailed(String),
    SessionStarted { camera: usize, recording: PathBuf },
    SessionEnded { frames: u64, recorded: u64 },
}

struct ControlState {
    state: LifecycleState,
    stop_requested: bool,
    teardown_complete: bool,
}

/// 生命周期状态 + 协作停止标志 + 拆除完成标志, 同一把锁保护
pub(crate) struct ControlHandle {
    inner: Mutex<ControlState>,
    changed: Condvar,
    events: Sender<ControllerEvent>,
}

impl ControlHandle {
    fn new(events: Sender<ControllerEvent>) -> Self {
        Self {
            inner: Mutex::new(ControlState {
                state: LifecycleState::Inactive,
                stop_requested: false,
                teardown_complete: true,
            }),
            changed: Condvar::new(),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn emit(&self, event: ControllerEvent) {
        // 界面不消费时丢弃, 不阻塞工作线程
        let _ = self.events.try_send(event);
    }

    fn transition(&self, guard: &mut ControlState, next: LifecycleState) {
        if guard.state != next {
            info!("🔄 状态: {:?} → {:?}", guard.state, next);
            guard.state = next;
            self.emit(ControllerEvent::StateChanged(next));
        }
    }

    pub(crate) fn state(&self) -> LifecycleState {
        self.lock().state
    }

    pub(crate) fn teardown_complete(&self) -> bool {
        self.lock().teardown_complete
    }

    fn begin_activation(&self) -> Activation {
        let mut guard = self.lock();
        if !guard.teardown_complete {
            drop(guard);
            warn!("⏳ 系统仍在停用中, 请稍候");
            self.emit(ControllerEvent::ActivationRejected);
            return Activation::TeardownPending;
        }
        guard.teardown_complete = false;
        guard.stop_requested = false;
        self.transition(&mut guard, LifecycleState::Initializing);
        Activation::Started
    }

    /// Initializing → Active; 初始化期间已请求停止则返回 false
    pub(crate) fn mark_active(&self) -> bool {
        let mut guard = self.lock();
        if guard.stop_requested {
            return false;
        }
        self.transition(&mut guard, LifecycleState::Active);
        true
    }

    /// 设置协作停止标志, 不等待工作线程
    pub(crate) fn request_stop(&self) -> bool {
        let mut guard = self.lock();
        match guard.state {
            LifecycleState::Initializing | LifecycleState::Active => {
                guard.stop_requested = true;
                self.transition(&mut guard, LifecycleState::Disconnecting);
                true
            }
            LifecycleState::Inactive | LifecycleState::Disconnecting => false,
        }
    }

    pub(crate) fn should_continue(&self) -> bool {
        !self.lock().stop_requested
    }

    /// 清理路径的最后一步: 回到 Inactive 并允许重新激活
    pub(crate) fn finish_teardown(&self) {
        let mut guard = self.lock();
        if guard.teardown_complete {
            return;
        }
        guard.stop_requested = false;
        self.transition(&mut guard, LifecycleState::Inactive);
        guard.teardown_complete = true;
        drop(guard);
        self.changed.notify_all();
    }

    fn wait_for_teardown(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock();
        while !guard.teardown_complete {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = match self.changed.wait_timeout(guard, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}

/// 会话所需的外部能力, 进程内只创建一次
#[derive(Clone)]
pub struct PipelineParts {
    pub camera: Arc<dyn CameraOpener>,
    pub detector: SharedDetector,
    pub notifier: Arc<dyn Notifier>,
    pub alarm: Arc<dyn Alarm>,
    pub sinks: Arc<dyn SinkFactory>,
    pub annotator: Arc<Annotator>,
}

/// 会话参数
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub camera_indices: Vec<usize>,
    pub filter: PersonFilter,
    pub recordings: RecordingsDir,
    pub video: VideoSpec,
    pub notification_title: String,
    pub notification_body: String,
    pub camera_settle: Duration,
    pub release_grace: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &ScasConfig) -> Self {
        Self {
            camera_indices: config.camera_indices.clone(),
            filter: PersonFilter::new(config.confidence_threshold, config.person_label.clone()),
            recordings: RecordingsDir::new(config.recordings_dir.clone()),
            video: VideoSpec {
                width: config.record_width,
                height: config.record_height,
                fps: config.record_fps,
                quality: config.jpeg_quality,
            },
            notification_title: config.notification_title.clone(),
            notification_body: config.notification_body.clone(),
            camera_settle: config.camera_settle(),
            release_grace: config.release_grace(),
        }
    }
}

/// 生命周期控制器
///
/// 界面线程调用 `activate` / `deactivate`, 工作线程持有摄像头和录像句柄;
/// 控制器本身从不直接接触这些句柄, 只观察拆除完成信号.
pub struct Controller {
    control: Arc<ControlHandle>,
    frames: Arc<SharedFrameBuffer>,
    parts: PipelineParts,
    settings: Arc<PipelineSettings>,
    events: Receiver<ControllerEvent>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Controller {
    pub fn new(parts: PipelineParts, settings: PipelineSettings) -> Self {
        let (tx, rx) = bounded(64);
        Self {
            control: Arc::new(ControlHandle::new(tx)),
            frames: Arc::new(SharedFrameBuffer::new()),
            parts,
            settings: Arc::new(settings),
            events: rx,
            worker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.control.state()
    }

    pub fn is_teardown_complete(&self) -> bool {
        self.control.teardown_complete()
    }

    pub fn frame_buffer(&self) -> Arc<SharedFrameBuffer> {
        self.frames.clone()
    }

    pub fn events(&self) -> Receiver<ControllerEvent> {
        self.events.clone()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// 激活监控: 立即返回, 摄像头在工作线程中打开
    pub fn activate(&self) -> crate::Result<Activation> {
        if self.control.begin_activation() == Activation::TeardownPending {
            return Ok(Activation::TeardownPending);
        }

        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        // 上一个工作线程已完成拆除, 这里只是回收
        if let Some(previous) = worker.take() {
            if previous.join().is_err() {
                error!("❌ 上一个工作线程异常退出");
            }
        }

        let ctx = SessionContext {
            control: self.control.clone(),
            frames: self.frames.clone(),
            parts: self.parts.clone(),
            settings: self.settings.clone(),
        };

        match thread::Builder::new()
            .name("scas-worker".into())
            .spawn(move || worker::run(ctx))
        {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(Activation::Started)
            }
            Err(e) => {
                error!("❌ 工作线程启动失败: {}", e);
                self.control.finish_teardown();
                Err(e.into())
            }
        }
    }

    /// 请求停用; 工作线程在下一轮迭代前退出
    pub fn deactivate(&self) -> bool {
        self.control.request_stop()
    }

    /// 等待拆除完成信号
    pub fn wait_for_teardown(&self, timeout: Duration) -> bool {
        self.control.wait_for_teardown(timeout)
    }

    pub fn open_recordings(&self) -> crate::Result<()> {
        self.settings.recordings.reveal()
    }

    /// 退出前调用: 停止会话并回收工作线程
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.deactivate();
        if !self.wait_for_teardown(timeout) {
            warn!("⚠️ 等待会话拆除超时");
            return false;
        }
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        true
    }
}
