use eframe::egui::{Color32, Pos2, Rect, pos2, vec2};

use crate::controller::{CropRect, LayoutArea};

pub const BOX_FILL: Color32 = Color32::from_rgba_premultiplied(51, 0, 0, 51);
pub const BOX_STROKE: Color32 = Color32::RED;
pub const LABEL_COLOR: Color32 = Color32::WHITE;
pub const STROKE_WIDTH: f32 = 2.0;

/// Everything the painter needs for one frame, in display coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderPlan {
    pub image_rect: Rect,
    pub box_rect: Rect,
    pub label: String,
    /// Bottom-left anchor of the label, floating just above the box corner.
    pub label_pos: Pos2,
}

/// Pure description builder: no painter access, no state, callable every
/// frame.
pub fn build(crop: CropRect, area: LayoutArea) -> RenderPlan {
    let box_rect = area.box_rect(crop);
    RenderPlan {
        image_rect: Rect::from_min_size(pos2(area.x, area.y), vec2(area.w, area.h)),
        box_rect,
        label: format!("{}x{}", crop.w.round() as i64, crop.h.round() as i64),
        label_pos: pos2(box_rect.min.x, box_rect.min.y - 5.0),
    }
}
