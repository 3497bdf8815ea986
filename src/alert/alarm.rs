//! 警报声接口
//!
//! 工作线程只表达"想要响/不响", 实际播放由持有音频上下文的渲染主线程完成.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

/// 循环警报声, 启停均幂等
pub trait Alarm: Send + Sync {
    fn play_loop(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;
    fn is_playing(&self) -> bool;
}

/// 跨线程共享的警报状态
///
/// 没有可用音频文件时整体禁用, 启动请求被忽略.
#[derive(Clone)]
pub struct SharedAlarm {
    playing: Arc<AtomicBool>,
    enabled: bool,
}

impl SharedAlarm {
    pub fn new(enabled: bool) -> Self {
        Self {
            playing: Arc::new(AtomicBool::new(false)),
            enabled,
        }
    }

    /// 根据音频文件是否存在决定是否启用
    pub fn for_sound(path: &Path) -> Self {
        let enabled = path.exists();
        if !enabled {
            warn!("⚠️ 警报音频不存在: {}, 警报声已禁用", path.display());
        }
        Self::new(enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Alarm for SharedAlarm {
    fn play_loop(&self) -> Result<()> {
        if self.enabled {
            self.playing.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_and_stop_are_idempotent() {
        let alarm = SharedAlarm::new(true);

        alarm.play_loop().unwrap();
        alarm.play_loop().unwrap();
        assert!(alarm.is_playing());

        alarm.stop().unwrap();
        alarm.stop().unwrap();
        assert!(!alarm.is_playing());
    }

    #[test]
    fn clones_share_state() {
        let alarm = SharedAlarm::new(true);
        let renderer_side = alarm.clone();

        alarm.play_loop().unwrap();

        assert!(renderer_side.is_playing());
    }

    #[test]
    fn missing_sound_disables_alarm() {
        let alarm = SharedAlarm::for_sound(Path::new("/nonexistent/alarm.wav"));

        alarm.play_loop().unwrap();

        assert!(!alarm.is_enabled());
        assert!(!alarm.is_playing());
    }
}
