//! 侧边控制面板: 状态标签 + 激活/停用/查看录像按钮 + 提示信息

use std::time::{Duration, Instant};

use egui_macroquad::egui::{self, Color32, RichText};

use crate::pipeline::LifecycleState;

pub const SIDEBAR_WIDTH: f32 = 220.0;
const NOTICE_TTL: Duration = Duration::from_secs(6);

/// 面板上的用户操作, 由窗口统一处理
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    Activate,
    Deactivate,
    ViewRecordings,
}

pub fn status_color(state: LifecycleState) -> Color32 {
    match state {
        LifecycleState::Inactive => Color32::from_rgb(220, 50, 50),
        LifecycleState::Initializing => Color32::from_rgb(230, 200, 40),
        LifecycleState::Active => Color32::from_rgb(40, 200, 80),
        LifecycleState::Disconnecting => Color32::from_rgb(240, 140, 30),
    }
}

struct Notice {
    text: String,
    color: Color32,
    shown_at: Instant,
}

#[derive(Default)]
pub struct ControlPanel {
    notice: Option<Notice>,
    pub alarm_on: bool,
    pub display_fps: f64,
}

impl ControlPanel {
    pub fn info(&mut self, text: impl Into<String>) {
        self.set_notice(text.into(), Color32::LIGHT_BLUE);
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        self.set_notice(text.into(), Color32::from_rgb(240, 140, 30));
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.set_notice(text.into(), Color32::from_rgb(220, 50, 50));
    }

    fn set_notice(&mut self, text: String, color: Color32) {
        self.notice = Some(Notice {
            text,
            color,
            shown_at: Instant::now(),
        });
    }

    /// 绘制侧边栏, 返回本帧的用户操作
    pub fn show(&mut self, ctx: &egui::Context, state: LifecycleState) -> Option<PanelAction> {
        if self
            .notice
            .as_ref()
            .is_some_and(|n| n.shown_at.elapsed() > NOTICE_TTL)
        {
            self.notice = None;
        }

        let mut action = None;
        egui::SidePanel::left("scas_sidebar")
            .exact_width(SIDEBAR_WIDTH)
            .resizable(false)
            .show(ctx, |ui| {
                ui.add_space(12.0);
                ui.heading("SCAS AI");
                ui.label("Smart Camera Alert System");
                ui.separator();

                ui.label(
                    RichText::new(state.status_text())
                        .color(status_color(state))
                        .strong(),
                );
                ui.add_space(12.0);

                let idle = state == LifecycleState::Inactive;
                let running = matches!(
                    state,
                    LifecycleState::Initializing | LifecycleState::Active
                );

                let button = |text: &str| egui::Button::new(text).min_size(egui::vec2(180.0, 32.0));
                if ui.add_enabled(idle, button("▶ Activate")).clicked() {
                    action = Some(PanelAction::Activate);
                }
                if ui.add_enabled(running, button("⏹ Deactivate")).clicked() {
                    action = Some(PanelAction::Deactivate);
                }
                if ui.add(button("📂 View Recordings")).clicked() {
                    action = Some(PanelAction::ViewRecordings);
                }

                ui.separator();
                if state == LifecycleState::Active {
                    if self.alarm_on {
                        ui.colored_label(Color32::from_rgb(220, 50, 50), "🚨 Alarm sounding");
                    }
                    ui.label(format!("Display FPS: {:.1}", self.display_fps));
                }

                if let Some(notice) = &self.notice {
                    ui.add_space(8.0);
                    ui.colored_label(notice.color, &notice.text);
                }
            });
        action
    }
}
