//! 测试替身: 脚本化摄像头、检测器、通知、警报和内存录像输出

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use image::RgbImage;
use tempfile::TempDir;

use crate::alert::{Alarm, Notifier};
use crate::detection::detector::shared;
use crate::detection::{Annotator, BBox, Detection, PersonDetector, PersonFilter};
use crate::input::{CameraOpener, FrameSource};
use crate::pipeline::{Controller, PipelineParts, PipelineSettings};
use crate::recorder::{FrameSink, RecordingsDir, SinkFactory, VideoSpec};

pub const FRAME_WIDTH: u32 = 64;
pub const FRAME_HEIGHT: u32 = 48;

/// 轮询直到条件成立或超时
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

// ========== 摄像头 ==========

#[derive(Default)]
pub struct CameraCounters {
    reads: AtomicUsize,
    releases: AtomicUsize,
}

impl CameraCounters {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// 按脚本出帧; 帧用完后返回 None (视为断开), 或先阻塞在闸门上
pub struct FakeCamera {
    frames: VecDeque<RgbImage>,
    hold: Option<Receiver<()>>,
    fail_release: bool,
    counters: Arc<CameraCounters>,
}

impl FakeCamera {
    pub fn blank(count: usize) -> Self {
        Self {
            frames: (0..count)
                .map(|_| RgbImage::new(FRAME_WIDTH, FRAME_HEIGHT))
                .collect(),
            hold: None,
            fail_release: false,
            counters: Arc::new(CameraCounters::default()),
        }
    }

    /// 出完 `count` 帧后阻塞, 直到返回的闸门被丢弃
    pub fn holding(count: usize) -> (Self, Sender<()>) {
        let (tx, rx) = bounded(1);
        let mut camera = Self::blank(count);
        camera.hold = Some(rx);
        (camera, tx)
    }

    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    pub fn counters(&self) -> Arc<CameraCounters> {
        self.counters.clone()
    }
}

impl FrameSource for FakeCamera {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(frame) = self.frames.pop_front() {
            return Ok(Some(frame));
        }
        if let Some(gate) = self.hold.take() {
            let _ = gate.recv();
        }
        Ok(None)
    }

    fn release(&mut self) -> Result<()> {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
        if self.fail_release {
            bail!("device busy");
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("fake {}x{}", FRAME_WIDTH, FRAME_HEIGHT)
    }
}

/// 每个设备只能打开一次, 与真实摄像头的独占语义一致
#[derive(Default)]
pub struct FakeCameraOpener {
    devices: Mutex<HashMap<usize, FakeCamera>>,
    attempts: Mutex<Vec<usize>>,
}

impl FakeCameraOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(self, index: usize, camera: FakeCamera) -> Self {
        self.insert(index, camera);
        self
    }

    pub fn insert(&self, index: usize, camera: FakeCamera) {
        self.devices.lock().unwrap().insert(index, camera);
    }

    pub fn attempts(&self) -> Vec<usize> {
        self.attempts.lock().unwrap().clone()
    }
}

impl CameraOpener for FakeCameraOpener {
    fn open(&self, index: usize) -> Result<Box<dyn FrameSource>> {
        self.attempts.lock().unwrap().push(index);
        let camera = self
            .devices
            .lock()
            .unwrap()
            .remove(&index)
            .ok_or_else(|| anyhow!("no device at index {}", index))?;
        Ok(Box::new(camera))
    }
}

// ========== 通知 / 警报 ==========

#[derive(Default)]
pub struct FakeNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl FakeNotifier {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_next(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Notifier for FakeNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        if self.fail.swap(false, Ordering::SeqCst) {
            bail!("push service unreachable");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeAlarm {
    playing: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_stop: AtomicBool,
    failed_stops: AtomicUsize,
}

impl FakeAlarm {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// 音频设备出错: stop 报错且继续响
    pub fn fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    pub fn failed_stops(&self) -> usize {
        self.failed_stops.load(Ordering::SeqCst)
    }
}

impl Alarm for FakeAlarm {
    fn play_loop(&self) -> Result<()> {
        if !self.playing.swap(true, Ordering::SeqCst) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if self.fail_stop.load(Ordering::SeqCst) {
            self.failed_stops.fetch_add(1, Ordering::SeqCst);
            bail!("audio device lost");
        }
        if self.playing.swap(false, Ordering::SeqCst) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

// ========== 检测器 ==========

/// 每次检测前记录 (警报是否在响, 已发通知数)
pub type Samples = Arc<Mutex<Vec<(bool, usize)>>>;

/// 按调用序号决定是否"看到"人
pub struct ScriptedDetector {
    script: Box<dyn Fn(u64) -> bool + Send>,
    fail: bool,
    calls: u64,
    alarm: Arc<FakeAlarm>,
    notifier: Arc<FakeNotifier>,
    samples: Samples,
}

impl PersonDetector for ScriptedDetector {
    fn detect(&mut self, _image: &RgbImage) -> Result<Vec<Detection>> {
        self.samples
            .lock()
            .unwrap()
            .push((self.alarm.is_playing(), self.notifier.count()));
        let call = self.calls;
        self.calls += 1;

        if self.fail {
            bail!("inference session lost");
        }
        let mut detections = vec![Detection::new("chair", 0.95, BBox::new(2.0, 2.0, 6.0, 6.0))];
        if (self.script)(call) {
            detections.push(Detection::new(
                "person",
                0.9,
                BBox::new(8.0, 8.0, 32.0, 24.0),
            ));
        }
        Ok(detections)
    }
}

// ========== 录像输出 ==========

#[derive(Debug, Clone, Default)]
pub struct SinkRecord {
    pub path: PathBuf,
    pub frames: u64,
    pub finishes: usize,
}

/// 内存录像输出, 记录每个"文件"收到的帧数和定稿次数
#[derive(Default)]
pub struct MemorySinks {
    records: Arc<Mutex<Vec<SinkRecord>>>,
    fail_writes: Arc<AtomicBool>,
    fail_finish: Arc<AtomicBool>,
    fail_create: AtomicBool,
}

impl MemorySinks {
    pub fn created(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn frames(&self, file: usize) -> u64 {
        self.records.lock().unwrap()[file].frames
    }

    pub fn finishes(&self, file: usize) -> usize {
        self.records.lock().unwrap()[file].finishes
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// 定稿时报错 (仍计入定稿次数)
    pub fn fail_finish(&self, fail: bool) {
        self.fail_finish.store(fail, Ordering::SeqCst);
    }
}

impl SinkFactory for MemorySinks {
    fn create(&self, path: &Path, _spec: &VideoSpec) -> Result<Box<dyn FrameSink>> {
        if self.fail_create.load(Ordering::SeqCst) {
            bail!("disk full");
        }
        let mut records = self.records.lock().unwrap();
        records.push(SinkRecord {
            path: path.to_path_buf(),
            ..Default::default()
        });
        Ok(Box::new(MemorySink {
            slot: records.len() - 1,
            records: self.records.clone(),
            fail_writes: self.fail_writes.clone(),
            fail_finish: self.fail_finish.clone(),
            written: 0,
        }))
    }
}

struct MemorySink {
    slot: usize,
    records: Arc<Mutex<Vec<SinkRecord>>>,
    fail_writes: Arc<AtomicBool>,
    fail_finish: Arc<AtomicBool>,
    written: u64,
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, _image: &RgbImage) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("write error");
        }
        self.records.lock().unwrap()[self.slot].frames += 1;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.records.lock().unwrap()[self.slot].finishes += 1;
        if self.fail_finish.load(Ordering::SeqCst) {
            bail!("flush failed");
        }
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }
}

// ========== 控制器装配 ==========

pub struct Rig {
    pub controller: Controller,
    pub opener: Arc<FakeCameraOpener>,
    pub notifier: Arc<FakeNotifier>,
    pub alarm: Arc<FakeAlarm>,
    pub sinks: Arc<MemorySinks>,
    samples: Samples,
    _recordings: TempDir,
}

impl Rig {
    pub fn new(opener: FakeCameraOpener) -> Self {
        Self::build(opener, Box::new(|_| false), false)
    }

    pub fn with_detector(
        opener: FakeCameraOpener,
        script: impl Fn(u64) -> bool + Send + 'static,
    ) -> Self {
        Self::build(opener, Box::new(script), false)
    }

    pub fn with_failing_detector(opener: FakeCameraOpener) -> Self {
        Self::build(opener, Box::new(|_| true), true)
    }

    fn build(opener: FakeCameraOpener, script: Box<dyn Fn(u64) -> bool + Send>, fail: bool) -> Self {
        let recordings = tempfile::tempdir().unwrap();
        let opener = Arc::new(opener);
        let notifier = Arc::new(FakeNotifier::default());
        let alarm = Arc::new(FakeAlarm::default());
        let sinks = Arc::new(MemorySinks::default());
        let samples = Samples::default();

        let detector = ScriptedDetector {
            script,
            fail,
            calls: 0,
            alarm: alarm.clone(),
            notifier: notifier.clone(),
            samples: samples.clone(),
        };

        let parts = PipelineParts {
            camera: opener.clone(),
            detector: shared(detector),
            notifier: notifier.clone(),
            alarm: alarm.clone(),
            sinks: sinks.clone(),
            annotator: Arc::new(Annotator::new(None)),
        };
        let settings = PipelineSettings {
            camera_indices: vec![0, 1],
            filter: PersonFilter::default(),
            recordings: RecordingsDir::new(recordings.path()),
            video: VideoSpec {
                width: FRAME_WIDTH,
                height: FRAME_HEIGHT,
                fps: 20,
                quality: 80,
            },
            notification_title: "Alert".into(),
            notification_body: "Activity detected!".into(),
            camera_settle: Duration::ZERO,
            release_grace: Duration::from_millis(5),
        };

        Self {
            controller: Controller::new(parts, settings),
            opener,
            notifier,
            alarm,
            sinks,
            samples,
            _recordings: recordings,
        }
    }

    pub fn detector_samples(&self) -> Vec<(bool, usize)> {
        self.samples.lock().unwrap().clone()
    }
}
