/// 检测系统数据结构定义
/// Data structures for the detection system
use image::RgbImage;

// ========== 数据结构 ==========

/// 采集帧 (采集 → 检测 → 录像/显示)
///
/// 发布到共享缓冲区之前由工作线程独占, 之后读者只拿到副本.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub image: RgbImage,
    pub index: u64, // 采集序号
}

impl Frame {
    pub fn new(image: RgbImage, index: u64) -> Self {
        Self { image, index }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// 检测框 (像素坐标, 左上角 + 宽高)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 由中心点 + 宽高构造 (YOLO 输出格式)
    pub fn from_cxcywh(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new(cx - width / 2., cy - height / 2., width, height)
    }

    /// 裁剪到图像范围内
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let x1 = self.x.max(0.);
        let y1 = self.y.max(0.);
        let x2 = self.xmax().min(width as f32);
        let y2 = self.ymax().min(height as f32);
        Self::new(x1, y1, (x2 - x1).max(0.), (y2 - y1).max(0.))
    }

    pub fn xmax(&self) -> f32 {
        self.x + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn intersection_area(&self, another: &BBox) -> f32 {
        let l = self.x.max(another.x);
        let r = self.xmax().min(another.xmax());
        let t = self.y.max(another.y);
        let b = self.ymax().min(another.ymax());
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn iou(&self, another: &BBox) -> f32 {
        let inter = self.intersection_area(another);
        let union = self.area() + another.area() - inter;
        if union <= 0. {
            0.
        } else {
            inter / union
        }
    }
}

/// 单帧检测结果, 不跨帧保留
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f32, // [0, 1]
    pub bbox: BBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

/// 非极大值抑制: 按置信度降序保留互不重叠的框
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    xs.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].bbox.iou(&xs[index].bbox) > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = BBox::new(10., 10., 20., 20.);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BBox::new(0., 0., 10., 10.);
        let b = BBox::new(50., 50., 10., 10.);
        assert_eq!(a.iou(&b), 0.);
    }

    #[test]
    fn from_center_matches_corner_form() {
        let b = BBox::from_cxcywh(50., 40., 20., 10.);
        assert_eq!(b, BBox::new(40., 35., 20., 10.));
    }

    #[test]
    fn clamp_trims_box_at_image_edges() {
        let b = BBox::from_cxcywh(5., 45., 20., 20.).clamp_to(64, 48);
        assert_eq!(b, BBox::new(0., 35., 15., 13.));
    }

    #[test]
    fn nms_keeps_highest_of_overlapping_pair() {
        let mut xs = vec![
            Detection::new("person", 0.6, BBox::new(0., 0., 100., 100.)),
            Detection::new("person", 0.9, BBox::new(5., 5., 100., 100.)),
            Detection::new("person", 0.5, BBox::new(300., 300., 50., 50.)),
        ];

        non_max_suppression(&mut xs, 0.45);

        assert_eq!(xs.len(), 2);
        assert!((xs[0].confidence - 0.9).abs() < 1e-6);
        assert!((xs[1].confidence - 0.5).abs() < 1e-6);
    }
}
