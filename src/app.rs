use arboard::Clipboard;
use eframe::egui;

use crate::annotation::AnnotationId;
use crate::events::{Event, EventType};
use crate::module::{IMAGE_EXTENSIONS, ImageItem, ImageModule};

pub struct NoteCrabApp {
    module: ImageModule,
    selector: String,
    annotations_visible: bool,
    selection_enabled: bool,
    show_layers: bool,
    selected: Option<AnnotationId>,
}

fn log_event(event: &Event) -> bool {
    match event {
        Event::AnnotationCreated { annotation, .. }
        | Event::AnnotationUpdated { annotation, .. }
        | Event::AnnotationRemoved { annotation, .. } => {
            tracing::info!(
                event = ?event.event_type(),
                src = %event.src(),
                text = %annotation.text,
                "annotation changed"
            );
        }
        _ => tracing::trace!(event = ?event.event_type(), src = %event.src()),
    }
    true
}

impl NoteCrabApp {
    pub fn new(cc: &eframe::CreationContext<'_>, mut module: ImageModule) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());
        egui_extras::install_image_loaders(&cc.egui_ctx);

        for event_type in [
            EventType::AnnotationCreated,
            EventType::AnnotationUpdated,
            EventType::AnnotationRemoved,
            EventType::SelectionCanceled,
        ] {
            module.add_handler(event_type, log_event);
        }

        Self {
            selector: module.selector().to_string(),
            annotations_visible: module.annotations_visible(),
            selection_enabled: module.selection_enabled(),
            module,
            show_layers: true,
            selected: None,
        }
    }

    fn open_images(&mut self) {
        let Some(paths) = rfd::FileDialog::new()
            .add_filter("Images", IMAGE_EXTENSIONS)
            .pick_files()
        else {
            return;
        };
        for path in paths {
            self.module.add_item(ImageItem::from_path(&path));
        }
    }

    fn copy_json(&self) {
        let annotations = self.module.annotations(None);
        let json = match serde_json::to_string_pretty(&annotations) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("failed to serialize annotations: {e}");
                return;
            }
        };
        match Clipboard::new().and_then(|mut c| c.set_text(json)) {
            Ok(()) => tracing::debug!(count = annotations.len(), "copied annotations"),
            Err(e) => tracing::warn!("clipboard unavailable: {e}"),
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("📂 Open").clicked() {
                self.open_images();
            }

            ui.separator();
            let before = self.selector.clone();
            ui.selectable_value(&mut self.selector, "rect".to_string(), "⬜ Box");
            ui.selectable_value(&mut self.selector, "polygon".to_string(), "⬠ Polygon");
            if self.selector != before
                && let Err(e) = self.module.activate_selector(None, &self.selector)
            {
                tracing::warn!("{e}");
                self.selector = before;
            }

            ui.separator();
            if ui
                .toggle_value(&mut self.selection_enabled, "✏ Draw")
                .changed()
                && let Err(e) = self.module.set_selection_enabled(None, self.selection_enabled)
            {
                tracing::warn!("{e}");
            }
            if ui
                .toggle_value(&mut self.annotations_visible, "👁 Show")
                .changed()
                && let Err(e) = self.module.set_annotations_visible(None, self.annotations_visible)
            {
                tracing::warn!("{e}");
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.toggle_value(&mut self.show_layers, "🗂 Layers");
                ui.separator();
                if ui.button("📋 Copy JSON").clicked() {
                    self.copy_json();
                }
                if ui.button("🗑 Clear").clicked() {
                    self.module.reset();
                    self.selected = None;
                }
            });
        });
    }

    fn layers(&mut self, ui: &mut egui::Ui) {
        ui.heading("Layers");
        ui.separator();
        egui::ScrollArea::vertical().show(ui, |ui| {
            let mut to_remove = None;
            let mut current_src = None;
            for annotation in self.module.annotations(None) {
                if current_src.as_deref() != Some(annotation.src.as_str()) {
                    ui.weak(annotation.src.as_str());
                    current_src = Some(annotation.src.clone());
                }
                ui.horizontal(|ui| {
                    if ui
                        .selectable_label(self.selected == Some(annotation.id), annotation.label())
                        .clicked()
                    {
                        self.selected = Some(annotation.id);
                        self.module.highlight(self.selected);
                    }
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("🗑").clicked() {
                            to_remove = Some(annotation.id);
                        }
                    });
                });
            }
            if let Some(id) = to_remove {
                self.module.remove_annotation(id);
                if self.selected == Some(id) {
                    self.selected = None;
                }
            }
        });
    }
}

impl eframe::App for NoteCrabApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| self.toolbar(ui));

        if self.show_layers {
            egui::SidePanel::right("layers_panel")
                .default_width(220.0)
                .show(ctx, |ui| self.layers(ui));
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.module.items().is_empty() {
                ui.centered_and_justified(|ui| {
                    ui.vertical(|ui| {
                        ui.heading("NoteCrab");
                        ui.label("Open images to begin annotating");
                        ui.add_space(10.0);
                        if ui.button("📂 Open").clicked() {
                            self.open_images();
                        }
                    });
                });
            } else {
                self.module.show(ui);
            }
        });
    }
}
