/// 渲染显示 (主线程)
///
/// - MonitorWindow: 固定间隔拉取最新标注帧, 绘制预览 + 控制面板
/// - ControlPanel:  egui 侧边栏
///
/// macroquad 的音频上下文只能在主线程使用, 警报声也在这里按
/// `SharedAlarm` 的状态同步启停.
pub mod control_panel;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use egui_macroquad::egui;
use image::DynamicImage;
use macroquad::audio::{load_sound, play_sound, stop_sound, PlaySoundParams, Sound};
use macroquad::prelude::*;
use tracing::{info, warn};

use crate::alert::{Alarm, SharedAlarm};
use crate::pipeline::{
    Activation, Controller, ControllerEvent, SharedFrameBuffer,
};
use control_panel::{ControlPanel, PanelAction, SIDEBAR_WIDTH};

pub const WINDOW_TITLE: &str = "SCAS AI - Smart Camera Alert System";
pub const WINDOW_WIDTH: i32 = 1100;
pub const WINDOW_HEIGHT: i32 = 640;
const PLACEHOLDER: &str = "Primary Feed (Inactive)";

pub struct MonitorWindow {
    controller: Arc<Controller>,
    frames: Arc<SharedFrameBuffer>,
    events: Receiver<ControllerEvent>,
    panel: ControlPanel,

    // 画面
    texture: Option<Texture2D>,
    seen_sequence: u64,
    display_interval: Duration,
    last_poll: Instant,

    // 警报声
    alarm: SharedAlarm,
    alarm_sound: Option<Sound>,
    sounding: bool,

    // 显示帧率
    display_count: u64,
    display_last: Instant,
}

impl MonitorWindow {
    pub async fn new(
        controller: Arc<Controller>,
        alarm: SharedAlarm,
        alarm_path: &std::path::Path,
        display_interval: Duration,
    ) -> Self {
        let alarm_sound = if alarm.is_enabled() {
            match load_sound(&alarm_path.to_string_lossy()).await {
                Ok(sound) => {
                    info!("🔔 警报音频加载成功: {}", alarm_path.display());
                    Some(sound)
                }
                Err(e) => {
                    warn!("⚠️ 警报音频加载失败: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            frames: controller.frame_buffer(),
            events: controller.events(),
            controller,
            panel: ControlPanel::default(),
            texture: None,
            seen_sequence: 0,
            display_interval,
            last_poll: Instant::now(),
            alarm,
            alarm_sound,
            sounding: false,
            display_count: 0,
            display_last: Instant::now(),
        }
    }

    pub fn update(&mut self) {
        for event in self.events.try_iter() {
            match event {
                ControllerEvent::DeviceUnavailable(text) | ControllerEvent::ActivationFailed(text) => {
                    self.panel.error(text);
                }
                ControllerEvent::SessionStarted { camera, recording } => {
                    self.panel.info(format!(
                        "Camera #{} active, recording to {}",
                        camera,
                        recording.display()
                    ));
                }
                ControllerEvent::SessionEnded { frames, recorded } => {
                    self.panel
                        .info(format!("Session ended: {} frames, {} recorded", frames, recorded));
                }
                ControllerEvent::StateChanged(_) | ControllerEvent::ActivationRejected => {}
            }
        }

        if self.last_poll.elapsed() >= self.display_interval {
            self.last_poll = Instant::now();
            self.poll_frame();
        }

        self.sync_alarm();
    }

    /// 拉取最新帧; 没有新帧时保留上一帧, 缓冲清空后回到占位画面
    fn poll_frame(&mut self) {
        match self.frames.snapshot_since(self.seen_sequence) {
            Some((sequence, frame)) => {
                self.seen_sequence = sequence;
                let (width, height) = (frame.width() as u16, frame.height() as u16);
                let rgba = DynamicImage::ImageRgb8(frame.image).into_rgba8().into_raw();

                // 只在分辨率变化时重建纹理
                match &self.texture {
                    Some(tex) if tex.width() as u16 == width && tex.height() as u16 == height => {
                        tex.update(&Image {
                            bytes: rgba,
                            width,
                            height,
                        });
                    }
                    _ => {
                        let tex = Texture2D::from_rgba8(width, height, &rgba);
                        tex.set_filter(FilterMode::Linear);
                        self.texture = Some(tex);
                    }
                }
                self.display_count += 1;
            }
            None => {
                if self.frames.is_empty() {
                    self.texture = None;
                    self.seen_sequence = self.frames.sequence();
                }
            }
        }

        let elapsed = self.display_last.elapsed();
        if elapsed >= Duration::from_secs(1) {
            self.panel.display_fps = self.display_count as f64 / elapsed.as_secs_f64();
            self.display_count = 0;
            self.display_last = Instant::now();
        }
    }

    fn sync_alarm(&mut self) {
        let wanted = self.alarm.is_playing();
        self.panel.alarm_on = wanted;
        if wanted == self.sounding {
            return;
        }
        if let Some(sound) = &self.alarm_sound {
            if wanted {
                play_sound(
                    sound,
                    PlaySoundParams {
                        looped: true,
                        volume: 1.0,
                    },
                );
            } else {
                stop_sound(sound);
            }
        }
        self.sounding = wanted;
    }

    pub fn draw(&mut self) {
        clear_background(Color::from_rgba(24, 24, 28, 255));

        let area_x = SIDEBAR_WIDTH + 10.0;
        let area_w = screen_width() - area_x - 10.0;
        let area_h = screen_height() - 20.0;

        match &self.texture {
            Some(texture) => {
                // 等比缩放居中
                let scale = (area_w / texture.width()).min(area_h / texture.height());
                let (w, h) = (texture.width() * scale, texture.height() * scale);
                draw_texture_ex(
                    texture,
                    area_x + (area_w - w) / 2.0,
                    10.0 + (area_h - h) / 2.0,
                    WHITE,
                    DrawTextureParams {
                        dest_size: Some(vec2(w, h)),
                        ..Default::default()
                    },
                );
            }
            None => {
                draw_rectangle(area_x, 10.0, area_w, area_h, BLACK);
                let size = measure_text(PLACEHOLDER, None, 28, 1.0);
                draw_text(
                    PLACEHOLDER,
                    area_x + (area_w - size.width) / 2.0,
                    10.0 + area_h / 2.0,
                    28.0,
                    GRAY,
                );
            }
        }
    }

    pub fn draw_egui(&mut self) {
        let state = self.controller.state();
        let mut action = None;
        egui_macroquad::ui(|egui_ctx: &egui::Context| {
            action = self.panel.show(egui_ctx, state);
        });
        egui_macroquad::draw();

        if let Some(action) = action {
            self.handle(action);
        }
    }

    fn handle(&mut self, action: PanelAction) {
        match action {
            PanelAction::Activate => match self.controller.activate() {
                Ok(Activation::Started) => {
                    self.panel.info("Initializing camera...");
                }
                Ok(Activation::TeardownPending) => {
                    self.panel
                        .warn("System is still deactivating. Please wait a moment.");
                }
                Err(e) => self.panel.error(format!("Activation failed: {}", e)),
            },
            PanelAction::Deactivate => {
                self.controller.deactivate();
            }
            PanelAction::ViewRecordings => {
                if let Err(e) = self.controller.open_recordings() {
                    self.panel
                        .error(format!("Could not open recordings folder: {}", e));
                }
            }
        }
    }
}
