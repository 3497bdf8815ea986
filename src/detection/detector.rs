//! 检测器接口 (Detector)
//! 职责: 给定一帧图像 → 返回检测列表 (标签, 置信度, 框)

use std::sync::{Arc, Mutex};

use anyhow::Result;
use image::RgbImage;

use super::types::Detection;

/// 目标检测能力
///
/// 在工作线程中每帧同步调用一次, 耗时直接落在采集循环的关键路径上.
pub trait PersonDetector: Send {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>>;

    /// 打印模型信息
    fn summary(&self) -> String {
        "detector".to_string()
    }
}

/// 模型只加载一次, 各会话共享 (同一时刻最多一个会话在用)
pub type SharedDetector = Arc<Mutex<Box<dyn PersonDetector>>>;

pub fn shared(detector: impl PersonDetector + 'static) -> SharedDetector {
    let boxed: Box<dyn PersonDetector> = Box::new(detector);
    Arc::new(Mutex::new(boxed))
}

/// 人员过滤规则: 标签匹配且置信度严格大于阈值
#[derive(Debug, Clone)]
pub struct PersonFilter {
    threshold: f32,
    label: String,
}

impl PersonFilter {
    pub fn new(threshold: f32, label: impl Into<String>) -> Self {
        Self {
            threshold,
            label: label.into(),
        }
    }

    pub fn qualifies(&self, detection: &Detection) -> bool {
        detection.confidence > self.threshold && detection.label == self.label
    }

    pub fn select<'a>(&self, detections: &'a [Detection]) -> Vec<&'a Detection> {
        detections.iter().filter(|d| self.qualifies(d)).collect()
    }
}

impl Default for PersonFilter {
    fn default() -> Self {
        Self::new(0.4, "person")
    }
}
