// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! SCAS 智能摄像头警报系统 (Smart Camera Alert System)
//!
//! 本地摄像头 → 人员检测 → 推送通知 + 警报声 → 会话录像 → 实时预览
pub mod alert; // 警报系统
pub mod config; // 配置参数
pub mod detection; // 智能检测系统
pub mod error;
pub mod input; // 视频输入系统
pub mod pipeline; // 监控流水线
pub mod recorder; // 录像系统

#[cfg(feature = "gui")]
pub mod renderer; // macroquad + egui 窗口

#[cfg(test)]
pub(crate) mod testing;

pub use crate::config::{Args, ScasConfig};
pub use crate::error::{Result, ScasError};
pub use crate::pipeline::{Activation, Controller, ControllerEvent, LifecycleState};

use chrono::{DateTime, Local};

/// 带分隔符的时间字符串, 精确到毫秒
pub fn time_string(t: &DateTime<Local>, delimiter: &str) -> String {
    let fmt = format!(
        "%Y{d}%m{d}%d{d}%H{d}%M{d}%S{d}%3f",
        d = delimiter
    );
    t.format(&fmt).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn time_string_uses_delimiter() {
        let t = Local.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(time_string(&t, "-"), "2026-01-02-03-04-05-000");
    }
}
