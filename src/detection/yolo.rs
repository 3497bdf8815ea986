// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! YOLOv8 ONNX 检测器
//!
//! 预处理(letterbox) → ONNX Runtime 推理 → 解码 + NMS

use std::path::Path;

use anyhow::{bail, Context, Result};
use image::{imageops, RgbImage};
use ndarray::{Array, ArrayViewD, Ix4};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use tracing::info;

use super::detector::PersonDetector;
use super::types::{non_max_suppression, BBox, Detection};

/// letterbox 填充色
const PAD_VALUE: f32 = 114.0 / 255.0;

pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

pub struct YoloDetector {
    session: Session,
    inf_size: u32,
    conf: f32,
    iou: f32,
}

impl YoloDetector {
    pub fn new(model: &Path, inf_size: u32) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model)
            .with_context(|| format!("加载模型失败: {}", model.display()))?;

        info!("✅ 检测模型加载成功: {}", model.display());

        Ok(Self {
            session,
            inf_size,
            conf: 0.25,
            iou: 0.45,
        })
    }

    /// letterbox 缩放到 inf_size × inf_size, 返回 NCHW 张量和缩放比例
    fn preprocess(&self, image: &RgbImage) -> (Array<f32, Ix4>, f32) {
        let size = self.inf_size;
        let (w0, h0) = image.dimensions();
        let ratio = (size as f32 / w0 as f32).min(size as f32 / h0 as f32);
        let w1 = ((w0 as f32 * ratio).round() as u32).clamp(1, size);
        let h1 = ((h0 as f32 * ratio).round() as u32).clamp(1, size);

        let resized = imageops::resize(image, w1, h1, imageops::FilterType::Triangle);

        let mut xs = Array::from_elem((1, 3, size as usize, size as usize), PAD_VALUE);
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            xs[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
            xs[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
            xs[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
        }
        (xs, ratio)
    }

    /// 输出格式: [1, 4 + nc, anchors]
    fn postprocess(&self, output: ArrayViewD<f32>, ratio: f32, w0: u32, h0: u32) -> Result<Vec<Detection>> {
        let shape = output.shape();
        if shape.len() != 3 || shape[1] <= 4 {
            bail!("不支持的输出形状: {:?}", shape);
        }
        let nc = shape[1] - 4;
        let anchors = shape[2];

        let mut detections = Vec::new();
        for i in 0..anchors {
            let (class_id, confidence) = (0..nc)
                .map(|c| (c, output[[0, 4 + c, i]]))
                .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

            if confidence < self.conf {
                continue;
            }

            let cx = output[[0, 0, i]] / ratio;
            let cy = output[[0, 1, i]] / ratio;
            let w = output[[0, 2, i]] / ratio;
            let h = output[[0, 3, i]] / ratio;

            let bbox = BBox::from_cxcywh(cx, cy, w, h).clamp_to(w0, h0);

            let label = COCO_CLASSES
                .get(class_id)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("class_{}", class_id));
            detections.push(Detection::new(label, confidence, bbox));
        }

        non_max_suppression(&mut detections, self.iou);
        Ok(detections)
    }
}

impl PersonDetector for YoloDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        let (xs, ratio) = self.preprocess(image);
        let outputs = self.session.run(ort::inputs![xs.view()]?)?;
        let output = outputs[0].try_extract_tensor::<f32>()?;
        self.postprocess(output, ratio, image.width(), image.height())
    }

    fn summary(&self) -> String {
        format!("YOLOv8 ({}x{})", self.inf_size, self.inf_size)
    }
}
