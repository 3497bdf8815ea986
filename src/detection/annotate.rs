//! 检测结果标注: 在帧上绘制人员框和标签
//!
//! 只修改用于显示/录像的帧, 标注后的图像不会再送入检测.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{info, warn};

use super::types::Detection;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: f32 = 16.0;

pub struct Annotator {
    font: Option<FontArc>,
}

impl Annotator {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }

    /// 加载标注字体; 失败时只画框不写字
    pub fn load(font_path: Option<&Path>) -> Self {
        let font = font_path.and_then(|path| {
            let font = std::fs::read(path)
                .map_err(|e| e.to_string())
                .and_then(|bytes| FontArc::try_from_vec(bytes).map_err(|e| e.to_string()));
            match font {
                Ok(font) => {
                    info!("✅ 标注字体加载成功: {}", path.display());
                    Some(font)
                }
                Err(e) => {
                    warn!("⚠️  标注字体加载失败 ({}): {}, 仅绘制检测框", path.display(), e);
                    None
                }
            }
        });
        Self::new(font)
    }

    pub fn draw(&self, image: &mut RgbImage, detections: &[&Detection]) {
        for detection in detections {
            self.draw_one(image, detection);
        }
    }

    fn draw_one(&self, image: &mut RgbImage, detection: &Detection) {
        let x = detection.bbox.x.round() as i32;
        let y = detection.bbox.y.round() as i32;
        let w = detection.bbox.width.round() as i32;
        let h = detection.bbox.height.round() as i32;

        // 多画几圈模拟线宽
        for t in 0..BOX_THICKNESS {
            let (bw, bh) = (w - 2 * t, h - 2 * t);
            if bw <= 0 || bh <= 0 {
                break;
            }
            let rect = Rect::at(x + t, y + t).of_size(bw as u32, bh as u32);
            draw_hollow_rect_mut(image, rect, BOX_COLOR);
        }

        if let Some(font) = &self.font {
            let text = display_label(&detection.label);
            let ty = (y - 10 - LABEL_SCALE as i32).max(0);
            draw_text_mut(image, BOX_COLOR, x.max(0), ty, PxScale::from(LABEL_SCALE), font, &text);
        }
    }
}

/// "person" → "Person"
fn display_label(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
