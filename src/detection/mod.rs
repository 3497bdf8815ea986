/// 检测系统 (Detection System)
///
/// 在采集工作线程中同步运行, 负责智能分析
/// - Detector: 目标检测接口 + 人员过滤
/// - Annotate: 检测框标注
/// - Yolo:     YOLOv8 ONNX 实现 (onnx 功能)
pub mod annotate;
pub mod detector;
pub mod types;

#[cfg(feature = "onnx")]
pub mod yolo;

pub use annotate::Annotator;
pub use detector::{PersonDetector, PersonFilter, SharedDetector};
pub use types::{BBox, Detection, Frame};

#[cfg(feature = "onnx")]
pub use yolo::YoloDetector;
