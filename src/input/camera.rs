//! 摄像头输入接口
//!
//! 摄像头句柄只在采集工作线程内创建和使用, 因此 `FrameSource` 不要求 `Send`.

use anyhow::Result;
use image::RgbImage;
use tracing::{info, warn};

use crate::error::ScasError;

/// 帧源: 逐帧读取摄像头画面
pub trait FrameSource {
    /// 读取下一帧; `Ok(None)` 表示设备不再产出画面 (视为断开)
    fn read(&mut self) -> Result<Option<RgbImage>>;

    /// 释放设备句柄
    fn release(&mut self) -> Result<()>;

    fn describe(&self) -> String;
}

/// 摄像头打开器: 按索引打开设备
pub trait CameraOpener: Send + Sync {
    fn open(&self, index: usize) -> Result<Box<dyn FrameSource>>;
}

/// 按优先顺序尝试摄像头索引, 返回第一个成功打开的设备
///
/// 全部失败时不持有任何设备资源.
pub fn open_first(
    opener: &dyn CameraOpener,
    indices: &[usize],
) -> crate::Result<(usize, Box<dyn FrameSource>)> {
    for &index in indices {
        match opener.open(index) {
            Ok(source) => {
                info!("✅ 摄像头 #{} 打开成功: {}", index, source.describe());
                return Ok((index, source));
            }
            Err(e) => {
                warn!("⚠️ 摄像头 #{} 无法打开: {:#}", index, e);
            }
        }
    }
    Err(ScasError::DeviceUnavailable {
        tried: indices.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCamera, FakeCameraOpener};

    #[test]
    fn first_working_index_wins() {
        let opener = FakeCameraOpener::new()
            .with_device(1, FakeCamera::blank(3))
            .with_device(2, FakeCamera::blank(3));

        let (index, _source) = open_first(&opener, &[0, 1, 2]).unwrap();

        assert_eq!(index, 1);
        assert_eq!(opener.attempts(), vec![0, 1]);
    }

    #[test]
    fn no_device_reports_all_tried_indices() {
        let opener = FakeCameraOpener::new();

        match open_first(&opener, &[0, 1]) {
            Err(ScasError::DeviceUnavailable { tried }) => assert_eq!(tried, vec![0, 1]),
            other => panic!("expected DeviceUnavailable, got {:?}", other.map(|(i, _)| i)),
        }
    }
}
