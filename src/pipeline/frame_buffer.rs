//! 共享帧缓冲: 工作线程 → 显示线程的单槽交接
//!
//! 锁只在替换/复制时持有, 不跨越检测或 I/O. 读者永远拿到副本, 不排队,
//! 慢读者只会看到最新一帧.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::detection::Frame;

#[derive(Default)]
struct Slot {
    frame: Option<Frame>,
    sequence: u64, // 每次发布 +1
}

#[derive(Default)]
pub struct SharedFrameBuffer {
    slot: Mutex<Slot>,
}

impl SharedFrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 替换最新帧
    pub fn publish(&self, frame: Frame) {
        let mut slot = self.lock();
        slot.frame = Some(frame);
        slot.sequence += 1;
    }

    /// 最新帧的副本
    pub fn snapshot(&self) -> Option<Frame> {
        self.lock().frame.clone()
    }

    /// 仅当有比 `seen` 更新的帧时返回副本, 供显示端跳过重复上传
    pub fn snapshot_since(&self, seen: u64) -> Option<(u64, Frame)> {
        let slot = self.lock();
        if slot.sequence == seen {
            return None;
        }
        slot.frame.clone().map(|frame| (slot.sequence, frame))
    }

    pub fn sequence(&self) -> u64 {
        self.lock().sequence
    }

    /// 清空 (会话结束时显示回到"未激活")
    pub fn clear(&self) {
        let mut slot = self.lock();
        if slot.frame.take().is_some() {
            slot.sequence += 1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lock().frame.is_none()
    }
}
