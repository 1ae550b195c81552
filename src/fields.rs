use std::collections::BTreeMap;

use crate::controller::{CropCommit, CropRect};

pub const FIELD_X: &str = "x";
pub const FIELD_Y: &str = "y";
pub const FIELD_WIDTH: &str = "width";
pub const FIELD_HEIGHT: &str = "height";
pub const FIELD_COMBINED: &str = "crop_data";

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

/// The externally-owned fields the controller syncs with. Implementations
/// return `None` for fields they don't carry; sync skips those and keeps
/// going rather than failing the whole pass.
pub trait FieldStore {
    fn read(&self, name: &str) -> Option<FieldValue>;
    fn write(&mut self, name: &str, value: FieldValue);
}

/// Which wire form the fields use. Four numeric fields are canonical; the
/// combined `"x,y,w,h"` string is the legacy encoding kept for old graphs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    Structured,
    Combined,
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Encoding::Structured => "x / y / width / height",
            Encoding::Combined => "combined string",
        };
        write!(f, "{}", s)
    }
}

/// One controller serves both field shapes; this is the per-node
/// configuration that picks the shape.
#[derive(Clone, Copy, Debug)]
pub struct FieldMapping {
    pub encoding: Encoding,
}

impl FieldMapping {
    /// Inbound sync: rebuild the rectangle from whatever fields the store
    /// carries, falling back to `current` for anything missing or unparsable.
    /// Values are not clamped against image bounds here.
    pub fn read_rect(&self, store: &dyn FieldStore, current: CropRect) -> CropRect {
        match self.encoding {
            Encoding::Structured => {
                let mut rect = current;
                if let Some(FieldValue::Number(v)) = store.read(FIELD_X) {
                    rect.x = v as f32;
                }
                if let Some(FieldValue::Number(v)) = store.read(FIELD_Y) {
                    rect.y = v as f32;
                }
                if let Some(FieldValue::Number(v)) = store.read(FIELD_WIDTH) {
                    rect.w = v as f32;
                }
                if let Some(FieldValue::Number(v)) = store.read(FIELD_HEIGHT) {
                    rect.h = v as f32;
                }
                rect
            }
            Encoding::Combined => match store.read(FIELD_COMBINED) {
                Some(FieldValue::Text(s)) => match parse_combined(&s) {
                    Some([x, y, w, h]) => CropRect {
                        x: x as f32,
                        y: y as f32,
                        w: w as f32,
                        h: h as f32,
                    },
                    None => current,
                },
                _ => current,
            },
        }
    }

    /// Outbound sync: write one completed drag's rounded rectangle.
    pub fn write_commit(&self, store: &mut dyn FieldStore, commit: CropCommit) {
        match self.encoding {
            Encoding::Structured => {
                store.write(FIELD_X, FieldValue::Number(commit.x as f64));
                store.write(FIELD_Y, FieldValue::Number(commit.y as f64));
                store.write(FIELD_WIDTH, FieldValue::Number(commit.w as f64));
                store.write(FIELD_HEIGHT, FieldValue::Number(commit.h as f64));
            }
            Encoding::Combined => {
                store.write(FIELD_COMBINED, FieldValue::Text(encode_combined(commit)));
            }
        }
    }
}

pub fn encode_combined(c: CropCommit) -> String {
    format!("{},{},{},{}", c.x, c.y, c.w, c.h)
}

/// Parse the legacy `"x,y,w,h"` form: exactly four integer components.
pub fn parse_combined(s: &str) -> Option<[i64; 4]> {
    let mut out = [0i64; 4];
    let mut parts = s.split(',');
    for slot in &mut out {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

/// The region the backend actually cuts from a `width` x `height` source.
/// Legacy-encoded stores are re-parsed here, and an unparsable string falls
/// back to the full image; everything is then sanity-clamped the same way
/// the crop node does (`x` within the image, size at least 1, never past the
/// far edge), so an out-of-bounds rectangle can be drawn but never cut.
pub fn resolve_crop_region(
    mapping: FieldMapping,
    store: &dyn FieldStore,
    current: CropRect,
    width: u32,
    height: u32,
) -> (u32, u32, u32, u32) {
    let iw = width as i64;
    let ih = height as i64;
    let c = match mapping.encoding {
        Encoding::Combined => match store.read(FIELD_COMBINED) {
            Some(FieldValue::Text(s)) => match parse_combined(&s) {
                Some([x, y, w, h]) => CropCommit { x, y, w, h },
                None => CropCommit {
                    x: 0,
                    y: 0,
                    w: iw,
                    h: ih,
                },
            },
            _ => current.rounded(),
        },
        Encoding::Structured => current.rounded(),
    };
    let x = c.x.clamp(0, iw - 1);
    let y = c.y.clamp(0, ih - 1);
    let w = c.w.clamp(1, iw - x);
    let h = c.h.clamp(1, ih - y);
    (x as u32, y as u32, w as u32, h as u32)
}

/// In-memory field store. External edits go through `set`, which raises the
/// dirty flag the app polls to run inbound sync; controller commits go
/// through `write`, which does not, so a commit can never echo back as an
/// inbound edit.
#[derive(Default)]
pub struct MemoryFields {
    values: BTreeMap<String, FieldValue>,
    dirty: bool,
}

impl MemoryFields {
    pub fn set(&mut self, name: &str, value: FieldValue) {
        self.values.insert(name.to_owned(), value);
        self.dirty = true;
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

impl FieldStore for MemoryFields {
    fn read(&self, name: &str) -> Option<FieldValue> {
        self.values.get(name).cloned()
    }

    fn write(&mut self, name: &str, value: FieldValue) {
        self.values.insert(name.to_owned(), value);
    }
}
