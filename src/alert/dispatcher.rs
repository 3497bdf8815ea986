//! 警报分发器: 人员在场状态去抖 + 通知/警报声驱动

use std::sync::Arc;

use tracing::{info, warn};

use super::alarm::Alarm;
use super::notifier::Notifier;

/// 单帧在场状态变化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEdge {
    /// false → true, 触发一次通知
    Entered,
    Present,
    Cleared,
    Absent,
}

pub struct AlertDispatcher {
    present: bool,
    notifier: Arc<dyn Notifier>,
    alarm: Arc<dyn Alarm>,
    title: String,
    body: String,
}

impl AlertDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        alarm: Arc<dyn Alarm>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            present: false,
            notifier,
            alarm,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    /// 每帧调用一次. 通知/警报失败只记录, 不影响检测循环
    pub fn update(&mut self, person_detected: bool) -> PresenceEdge {
        if person_detected {
            let edge = if self.present {
                PresenceEdge::Present
            } else {
                info!("🚨 检测到人员, 发送通知");
                if let Err(e) = self.notifier.notify(&self.title, &self.body) {
                    warn!("⚠️ 通知发送失败: {:#}", e);
                }
                self.present = true;
                PresenceEdge::Entered
            };

            // 每帧幂等启动: 警报声被外部打断时也能恢复
            if !self.alarm.is_playing() {
                if let Err(e) = self.alarm.play_loop() {
                    warn!("⚠️ 警报声启动失败: {:#}", e);
                }
            }
            edge
        } else {
            if self.alarm.is_playing() {
                if let Err(e) = self.alarm.stop() {
                    warn!("⚠️ 警报声停止失败: {:#}", e);
                }
            }
            let edge = if self.present {
                info!("✅ 人员离开画面");
                PresenceEdge::Cleared
            } else {
                PresenceEdge::Absent
            };
            self.present = false;
            edge
        }
    }
}
