use eframe::egui::{Pos2, Rect, pos2, vec2};

// Layout constants for the preview area inside the widget: side margin and
// the space reserved above the image for the control row.
pub const MARGIN: f32 = 10.0;
pub const TOP_PADDING: f32 = 40.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageDims {
    pub width: u32,
    pub height: u32,
}

/// Crop rectangle in image-pixel units. Coordinates stay floating point while
/// a drag is in flight and are rounded only when committed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl CropRect {
    pub const DEFAULT: Self = Self {
        x: 0.0,
        y: 0.0,
        w: 512.0,
        h: 512.0,
    };

    pub fn rounded(&self) -> CropCommit {
        CropCommit {
            x: self.x.round() as i64,
            y: self.y.round() as i64,
            w: self.w.round() as i64,
            h: self.h.round() as i64,
        }
    }
}

impl Default for CropRect {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Integer rectangle written to the field collaborator once per finished drag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropCommit {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

/// Where the preview image lands in display coordinates, plus the uniform
/// display-to-image scale. Derived from the container every layout pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutArea {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub scale: f32,
}

impl LayoutArea {
    pub fn compute(container: Rect, dims: ImageDims) -> Self {
        let display_w = container.width() - 2.0 * MARGIN;
        let scale = display_w / dims.width as f32;
        Self {
            x: container.min.x + MARGIN,
            y: container.min.y + TOP_PADDING,
            w: display_w,
            h: dims.height as f32 * scale,
            scale,
        }
    }

    pub fn to_display(&self, p: Pos2) -> Pos2 {
        pos2(self.x + p.x * self.scale, self.y + p.y * self.scale)
    }

    pub fn to_image(&self, p: Pos2) -> Pos2 {
        pos2((p.x - self.x) / self.scale, (p.y - self.y) / self.scale)
    }

    /// Display-space bounds of a crop rectangle. Hit-testing treats these as
    /// a closed interval, so `Rect::contains` (inclusive on all edges) fits.
    pub fn box_rect(&self, crop: CropRect) -> Rect {
        Rect::from_min_size(
            self.to_display(pos2(crop.x, crop.y)),
            vec2(crop.w * self.scale, crop.h * self.scale),
        )
    }
}

#[derive(Clone, Copy, Debug)]
struct DragSession {
    anchor: Pos2,
    start_x: f32,
    start_y: f32,
}

/// Result of feeding a pointer event to the controller. `Committed` carries
/// the rounded rectangle exactly once per completed drag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub enum PointerOutcome {
    /// Event did not land on the box (or no image is loaded); the host's own
    /// default interaction should proceed.
    Ignored,
    /// Event was handled; the box needs a repaint.
    Consumed,
    /// The drag finished; flush this rectangle to the fields.
    Committed(CropCommit),
}

/// The crop-box state machine. Owns the rectangle and the drag session;
/// painting and field storage live with the caller.
pub struct CropBoxController {
    image: Option<ImageDims>,
    crop: CropRect,
    area: Option<LayoutArea>,
    drag: Option<DragSession>,
}

impl CropBoxController {
    pub fn new() -> Self {
        Self {
            image: None,
            crop: CropRect::DEFAULT,
            area: None,
            drag: None,
        }
    }

    pub fn image(&self) -> Option<ImageDims> {
        self.image
    }

    pub fn crop(&self) -> CropRect {
        self.crop
    }

    /// Inbound sync from externally-edited fields. Values are taken as-is,
    /// without bounds validation; the next drag update re-clamps.
    pub fn set_crop(&mut self, crop: CropRect) {
        self.crop = crop;
    }

    /// Recompute the preview layout for this pass. Returns `None` while no
    /// image is loaded, in which case rendering and input must no-op.
    pub fn layout(&mut self, container: Rect) -> Option<LayoutArea> {
        self.area = self.image.map(|dims| LayoutArea::compute(container, dims));
        self.area
    }

    /// A preview finished loading. Width/height are clamped down to the new
    /// image bounds, never up; the position is left where it was even if the
    /// far edge now sticks out (the next drag restores the invariant).
    pub fn image_loaded(&mut self, dims: ImageDims) {
        if self.crop.w > dims.width as f32 {
            self.crop.w = dims.width as f32;
        }
        if self.crop.h > dims.height as f32 {
            self.crop.h = dims.height as f32;
        }
        self.image = Some(dims);
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn pointer_down(&mut self, pos: Pos2) -> PointerOutcome {
        let (Some(_), Some(area)) = (self.image, self.area) else {
            return PointerOutcome::Ignored;
        };
        if area.box_rect(self.crop).contains(pos) {
            self.drag = Some(DragSession {
                anchor: pos,
                start_x: self.crop.x,
                start_y: self.crop.y,
            });
            PointerOutcome::Consumed
        } else {
            PointerOutcome::Ignored
        }
    }

    /// `primary_down` is the live button state delivered with the move event.
    /// A move with the button already up means the release happened outside
    /// our surface; the drag still ends with a single commit.
    pub fn pointer_move(&mut self, pos: Pos2, primary_down: bool) -> PointerOutcome {
        let Some(session) = self.drag else {
            return PointerOutcome::Ignored;
        };
        if !primary_down {
            return self.finish_drag();
        }
        let (Some(dims), Some(area)) = (self.image, self.area) else {
            return PointerOutcome::Ignored;
        };

        let dx = (pos.x - session.anchor.x) / area.scale;
        let dy = (pos.y - session.anchor.y) / area.scale;

        let max_x = dims.width as f32 - self.crop.w;
        let max_y = dims.height as f32 - self.crop.h;
        self.crop.x = (session.start_x + dx).max(0.0).min(max_x);
        self.crop.y = (session.start_y + dy).max(0.0).min(max_y);

        PointerOutcome::Consumed
    }

    pub fn pointer_up(&mut self) -> PointerOutcome {
        if self.drag.is_some() {
            self.finish_drag()
        } else {
            PointerOutcome::Ignored
        }
    }

    fn finish_drag(&mut self) -> PointerOutcome {
        self.drag = None;
        PointerOutcome::Committed(self.crop.rounded())
    }
}

impl Default for CropBoxController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Container sized so a 1000px-wide image displays at scale 0.5:
    // display width 500 = container 520 minus two 10px margins.
    fn half_scale_container() -> Rect {
        Rect::from_min_size(pos2(0.0, 0.0), vec2(520.0, 600.0))
    }

    fn controller_1000() -> CropBoxController {
        let mut c = CropBoxController::new();
        c.image_loaded(ImageDims {
            width: 1000,
            height: 1000,
        });
        c.set_crop(CropRect {
            x: 100.0,
            y: 100.0,
            w: 200.0,
            h: 200.0,
        });
        let area = c.layout(half_scale_container()).unwrap();
        assert_eq!(area.scale, 0.5);
        c
    }

    #[test]
    fn drag_translates_in_image_pixels() {
        let mut c = controller_1000();
        // Box display bounds: [60,90]..[160,190].
        assert_eq!(c.pointer_down(pos2(100.0, 150.0)), PointerOutcome::Consumed);
        assert_eq!(
            c.pointer_move(pos2(150.0, 150.0), true),
            PointerOutcome::Consumed
        );
        assert_eq!(c.crop().x, 200.0);
        assert_eq!(c.crop().y, 100.0);
        assert_eq!(
            c.pointer_up(),
            PointerOutcome::Committed(CropCommit {
                x: 200,
                y: 100,
                w: 200,
                h: 200
            })
        );
    }

    #[test]
    fn drag_clamps_at_right_edge() {
        let mut c = controller_1000();
        let _ = c.pointer_down(pos2(100.0, 150.0));
        // +400 display pixels = +800 image pixels; 900 clamps to 1000-200.
        let _ = c.pointer_move(pos2(500.0, 150.0), true);
        assert_eq!(c.crop().x, 800.0);
    }

    #[test]
    fn drag_never_leaves_image_bounds() {
        let mut c = controller_1000();
        let _ = c.pointer_down(pos2(100.0, 150.0));
        for (dx, dy) in [(-900.0, -900.0), (2000.0, 2000.0), (37.0, -500.0)] {
            let _ = c.pointer_move(pos2(100.0 + dx, 150.0 + dy), true);
            let r = c.crop();
            assert!(r.x >= 0.0 && r.y >= 0.0);
            assert!(r.x + r.w <= 1000.0);
            assert!(r.y + r.h <= 1000.0);
        }
    }

    #[test]
    fn hit_test_is_edge_inclusive() {
        let mut c = controller_1000();
        // Top-left display corner of the box.
        assert_eq!(c.pointer_down(pos2(60.0, 90.0)), PointerOutcome::Consumed);
        let _ = c.pointer_up();
        assert_eq!(c.pointer_down(pos2(160.0, 190.0)), PointerOutcome::Consumed);
        let _ = c.pointer_up();
        assert_eq!(c.pointer_down(pos2(59.0, 90.0)), PointerOutcome::Ignored);
        assert_eq!(c.pointer_down(pos2(160.0, 191.0)), PointerOutcome::Ignored);
    }

    #[test]
    fn load_shrinks_oversized_box_but_never_grows_it() {
        let mut c = CropBoxController::new();
        c.set_crop(CropRect {
            x: 0.0,
            y: 0.0,
            w: 1000.0,
            h: 1000.0,
        });
        c.image_loaded(ImageDims {
            width: 800,
            height: 600,
        });
        assert_eq!(c.crop().w, 800.0);
        assert_eq!(c.crop().h, 600.0);

        c.set_crop(CropRect {
            x: 0.0,
            y: 0.0,
            w: 100.0,
            h: 100.0,
        });
        c.image_loaded(ImageDims {
            width: 800,
            height: 600,
        });
        assert_eq!(c.crop().w, 100.0);
        assert_eq!(c.crop().h, 100.0);
    }

    #[test]
    fn load_leaves_position_alone_even_past_the_far_edge() {
        let mut c = CropBoxController::new();
        c.set_crop(CropRect {
            x: 500.0,
            y: 400.0,
            w: 400.0,
            h: 300.0,
        });
        c.image_loaded(ImageDims {
            width: 600,
            height: 450,
        });
        // Size fits, position transiently violates x + w <= width.
        assert_eq!(c.crop().x, 500.0);
        assert_eq!(c.crop().y, 400.0);

        // The first drag update restores the invariant.
        let area = c
            .layout(Rect::from_min_size(pos2(0.0, 0.0), vec2(620.0, 600.0)))
            .unwrap();
        let inside = area.box_rect(c.crop()).center();
        let _ = c.pointer_down(inside);
        let _ = c.pointer_move(pos2(inside.x + 1.0, inside.y), true);
        assert!(c.crop().x + c.crop().w <= 600.0);
        assert!(c.crop().y + c.crop().h <= 450.0);
    }

    #[test]
    fn release_outside_commits_exactly_once() {
        let mut c = controller_1000();
        let _ = c.pointer_down(pos2(100.0, 150.0));
        let _ = c.pointer_move(pos2(150.0, 150.0), true);
        // Move arrives with the button already up: same outcome as pointer-up.
        assert_eq!(
            c.pointer_move(pos2(150.0, 150.0), false),
            PointerOutcome::Committed(CropCommit {
                x: 200,
                y: 100,
                w: 200,
                h: 200
            })
        );
        assert!(!c.is_dragging());
        assert_eq!(c.pointer_up(), PointerOutcome::Ignored);
        assert_eq!(
            c.pointer_move(pos2(160.0, 150.0), false),
            PointerOutcome::Ignored
        );
    }

    #[test]
    fn handlers_no_op_without_an_image() {
        let mut c = CropBoxController::new();
        assert_eq!(c.layout(half_scale_container()), None);
        assert_eq!(c.pointer_down(pos2(100.0, 100.0)), PointerOutcome::Ignored);
        assert_eq!(
            c.pointer_move(pos2(110.0, 100.0), true),
            PointerOutcome::Ignored
        );
        assert_eq!(c.pointer_up(), PointerOutcome::Ignored);
    }

    #[test]
    fn move_without_drag_session_is_ignored() {
        let mut c = controller_1000();
        assert_eq!(
            c.pointer_move(pos2(100.0, 150.0), true),
            PointerOutcome::Ignored
        );
    }

    #[test]
    fn transform_round_trips() {
        let mut c = controller_1000();
        let area = c.layout(half_scale_container()).unwrap();
        for p in [
            pos2(10.0, 40.0),
            pos2(123.4, 210.7),
            pos2(510.0, 540.0),
            pos2(-3.0, 17.5),
        ] {
            let back = area.to_display(area.to_image(p));
            assert!((back.x - p.x).abs() < 1e-3, "{back:?} vs {p:?}");
            assert!((back.y - p.y).abs() < 1e-3, "{back:?} vs {p:?}");
        }
    }

    #[test]
    fn layout_is_width_driven() {
        let area = LayoutArea::compute(
            Rect::from_min_size(pos2(5.0, 7.0), vec2(420.0, 100.0)),
            ImageDims {
                width: 800,
                height: 600,
            },
        );
        assert_eq!(area.x, 15.0);
        assert_eq!(area.y, 47.0);
        assert_eq!(area.w, 400.0);
        assert_eq!(area.scale, 0.5);
        // Height follows the aspect ratio, ignoring the container height.
        assert_eq!(area.h, 300.0);
    }

    #[test]
    fn commit_rounds_to_nearest_integer() {
        let r = CropRect {
            x: 10.4,
            y: 10.6,
            w: 199.5,
            h: 200.49,
        };
        assert_eq!(
            r.rounded(),
            CropCommit {
                x: 10,
                y: 11,
                w: 200,
                h: 200
            }
        );
    }
}
