#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

mod controller;
mod fields;
mod loader;
mod render;

use anyhow::Context as _;
use eframe::egui;
use image::DynamicImage;
use tracing::{debug, warn};

use controller::{CropBoxController, CropCommit, CropRect, ImageDims, PointerOutcome};
use fields::{
    Encoding, FIELD_COMBINED, FIELD_HEIGHT, FIELD_WIDTH, FIELD_X, FIELD_Y, FieldMapping,
    FieldStore, FieldValue, MemoryFields, encode_combined, resolve_crop_region,
};
use loader::PreviewLoader;

struct CropperApp {
    controller: CropBoxController,
    loader: PreviewLoader,
    fields: MemoryFields,
    mapping: FieldMapping,
    source: Option<DynamicImage>,
    texture: Option<egui::TextureHandle>,
    status: String,
}

impl CropperApp {
    fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let mut fields = MemoryFields::default();
        let mapping = FieldMapping {
            encoding: Encoding::Structured,
        };
        // Seed the store with the default rectangle, then derive the initial
        // rect from it, so pre-existing field values win over our default.
        mapping.write_commit(&mut fields, CropRect::DEFAULT.rounded());
        let mut controller = CropBoxController::new();
        controller.set_crop(mapping.read_rect(&fields, CropRect::DEFAULT));

        Self {
            controller,
            loader: PreviewLoader::new(),
            fields,
            mapping,
            source: None,
            texture: None,
            status: "No image loaded".to_owned(),
        }
    }

    fn open_image(&mut self, path: std::path::PathBuf) {
        // An empty reference is a no-op; the box stays unpositioned.
        if path.as_os_str().is_empty() {
            return;
        }
        self.status = format!("Loading {}…", path.display());
        let _ = self.loader.request(path);
    }

    fn poll_loader(&mut self, ctx: &egui::Context) {
        match self.loader.poll() {
            Some(Ok(preview)) => {
                let size = [preview.width as usize, preview.height as usize];
                let rgba = preview.image.to_rgba8();
                let pixels = rgba.as_flat_samples();
                let color_image =
                    egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
                self.texture =
                    Some(ctx.load_texture("preview", color_image, egui::TextureOptions::LINEAR));
                self.controller.image_loaded(ImageDims {
                    width: preview.width,
                    height: preview.height,
                });
                self.source = Some(preview.image);
                self.status = format!("{}x{}", preview.width, preview.height);
                debug!(
                    width = preview.width,
                    height = preview.height,
                    "preview ready"
                );
            }
            Some(Err(e)) => {
                warn!(error = %e, "preview load failed");
                self.status = e.to_string();
            }
            None => {}
        }
    }

    fn apply_commit(&mut self, commit: CropCommit) {
        debug!(?commit, "drag committed");
        self.mapping.write_commit(&mut self.fields, commit);
    }

    fn field_number(&self, name: &str, fallback: f32) -> f64 {
        match self.fields.read(name) {
            Some(FieldValue::Number(v)) => v,
            _ => fallback as f64,
        }
    }

    fn set_encoding(&mut self, encoding: Encoding) {
        if self.mapping.encoding == encoding {
            return;
        }
        self.mapping = FieldMapping { encoding };
        // Re-seed the store in the new wire form from the current rectangle.
        self.mapping
            .write_commit(&mut self.fields, self.controller.crop().rounded());
    }

    fn save_cropped(&self) -> anyhow::Result<()> {
        let source = self.source.as_ref().context("no image loaded")?;
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Image", &["png", "jpg", "jpeg", "bmp"])
            .save_file()
        else {
            return Ok(());
        };
        let (x, y, w, h) = resolve_crop_region(
            self.mapping,
            &self.fields,
            self.controller.crop(),
            source.width(),
            source.height(),
        );
        source
            .crop_imm(x, y, w, h)
            .save(&path)
            .with_context(|| format!("failed to save {}", path.display()))?;
        Ok(())
    }

    fn field_row(&mut self, ui: &mut egui::Ui) {
        match self.mapping.encoding {
            Encoding::Structured => {
                let crop = self.controller.crop();
                let mut x = self.field_number(FIELD_X, crop.x);
                let mut y = self.field_number(FIELD_Y, crop.y);
                let mut w = self.field_number(FIELD_WIDTH, crop.w);
                let mut h = self.field_number(FIELD_HEIGHT, crop.h);

                ui.label("x:");
                if ui.add(egui::DragValue::new(&mut x)).changed() {
                    self.fields.set(FIELD_X, FieldValue::Number(x));
                }
                ui.label("y:");
                if ui.add(egui::DragValue::new(&mut y)).changed() {
                    self.fields.set(FIELD_Y, FieldValue::Number(y));
                }
                ui.label("width:");
                if ui.add(egui::DragValue::new(&mut w)).changed() {
                    self.fields.set(FIELD_WIDTH, FieldValue::Number(w));
                }
                ui.label("height:");
                if ui.add(egui::DragValue::new(&mut h)).changed() {
                    self.fields.set(FIELD_HEIGHT, FieldValue::Number(h));
                }
            }
            Encoding::Combined => {
                let mut text = match self.fields.read(FIELD_COMBINED) {
                    Some(FieldValue::Text(s)) => s,
                    _ => encode_combined(self.controller.crop().rounded()),
                };
                ui.label("crop_data:");
                if ui.text_edit_singleline(&mut text).changed() {
                    self.fields.set(FIELD_COMBINED, FieldValue::Text(text));
                }
            }
        }
    }
}

impl eframe::App for CropperApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_loader(ctx);
        // Keep the loop ticking while a decode is in flight, or the finished
        // preview would sit unseen until the next input event.
        if self.loader.pending() {
            ctx.request_repaint();
        }

        // Handle dropped files
        if !ctx.input(|i| i.raw.dropped_files.is_empty()) {
            let dropped_files = ctx.input(|i| i.raw.dropped_files.clone());
            if let Some(path) = dropped_files.first().and_then(|f| f.path.clone()) {
                self.open_image(path);
            }
        }

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Open Image").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("Image", &["png", "jpg", "jpeg", "bmp"])
                        .pick_file()
                    {
                        self.open_image(path);
                    }
                }

                let mut encoding = self.mapping.encoding;
                egui::ComboBox::from_id_salt("field_encoding")
                    .selected_text(format!("{}", encoding))
                    .show_ui(ui, |ui| {
                        ui.selectable_value(
                            &mut encoding,
                            Encoding::Structured,
                            format!("{}", Encoding::Structured),
                        );
                        ui.selectable_value(
                            &mut encoding,
                            Encoding::Combined,
                            format!("{}", Encoding::Combined),
                        );
                    });
                self.set_encoding(encoding);

                if ui.button("Save Cropped Image").clicked() {
                    if let Err(e) = self.save_cropped() {
                        warn!(error = %e, "crop save failed");
                        self.status = e.to_string();
                    }
                }

                ui.separator();
                ui.label(&self.status);
            });
        });

        egui::TopBottomPanel::bottom("crop_fields").show(ctx, |ui| {
            ui.horizontal(|ui| {
                self.field_row(ui);
            });
            // Inbound sync: an external edit replaces the rectangle as-is.
            if self.fields.take_dirty() {
                let rect = self.mapping.read_rect(&self.fields, self.controller.crop());
                self.controller.set_crop(rect);
                ctx.request_repaint();
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.texture.is_none() {
                ui.label("Open or drop an image, then drag the red box to pick the crop region.");
            }
            let container = ui.available_rect_before_wrap();
            let area = self.controller.layout(container);

            // A press on the box claims the surface; a miss leaves the event
            // to whatever the surface would do by default.
            let mut consumed = self.controller.is_dragging();
            let pointer = ui.input(|i| i.pointer.clone());
            if let Some(pos) = pointer.interact_pos() {
                if pointer.primary_pressed() {
                    consumed = self.controller.pointer_down(pos) == PointerOutcome::Consumed;
                } else if self.controller.is_dragging() {
                    match self.controller.pointer_move(pos, pointer.primary_down()) {
                        PointerOutcome::Committed(c) => self.apply_commit(c),
                        PointerOutcome::Consumed => ctx.request_repaint(),
                        PointerOutcome::Ignored => {}
                    }
                }
                if pointer.primary_released() {
                    if let PointerOutcome::Committed(c) = self.controller.pointer_up() {
                        self.apply_commit(c);
                    }
                }
            }

            let sense = if consumed {
                egui::Sense::click_and_drag()
            } else {
                egui::Sense::hover()
            };
            let _response = ui.allocate_rect(container, sense);

            if let (Some(texture), Some(area)) = (&self.texture, area) {
                let plan = render::build(self.controller.crop(), area);
                let painter = ui.painter_at(container);
                painter.image(
                    texture.id(),
                    plan.image_rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
                painter.rect_filled(plan.box_rect, 0.0, render::BOX_FILL);
                painter.rect_stroke(
                    plan.box_rect,
                    0.0,
                    egui::Stroke::new(render::STROKE_WIDTH, render::BOX_STROKE),
                );
                painter.text(
                    plan.label_pos,
                    egui::Align2::LEFT_BOTTOM,
                    plan.label,
                    egui::FontId::proportional(12.0),
                    render::LABEL_COLOR,
                );
            }
        });
    }
}

fn main() -> eframe::Result {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([560.0, 640.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Interactive Cropper",
        options,
        Box::new(|cc| Ok(Box::new(CropperApp::new(cc)))),
    )
}
