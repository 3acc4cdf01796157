use eframe::egui::{self, Key, Vec2};

use crate::annotation::{Annotation, Shape};
use crate::geometry::{ImageFrame, RectGeometry, place_below};

#[derive(Debug, Clone, PartialEq)]
pub enum EditorTarget {
    /// A fresh selection waiting for its text.
    Create(Shape),
    /// An existing annotation, with its slot in the viewer.
    Edit { annotation: Annotation, index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorAction {
    Save,
    Cancel,
}

#[derive(Debug)]
pub struct Editor {
    target: Option<EditorTarget>,
    text: String,
    size: Vec2,
}

impl Default for Editor {
    fn default() -> Self {
        Self {
            target: None,
            text: String::new(),
            size: Vec2::new(280.0, 110.0),
        }
    }
}

impl Editor {
    pub fn open_for_create(&mut self, shape: Shape) {
        self.text.clear();
        self.target = Some(EditorTarget::Create(shape));
    }

    pub fn open_for_edit(&mut self, annotation: Annotation, index: usize) {
        self.text = annotation.text.clone();
        self.target = Some(EditorTarget::Edit { annotation, index });
    }

    pub fn is_open(&self) -> bool {
        self.target.is_some()
    }

    pub fn target(&self) -> Option<&EditorTarget> {
        self.target.as_ref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn close(&mut self) -> Option<(EditorTarget, String)> {
        let target = self.target.take()?;
        Some((target, std::mem::take(&mut self.text)))
    }

    /// Pixel bounds of the shape under edit.
    pub fn bounds(&self, image_size: Vec2) -> Option<RectGeometry> {
        let shape = match self.target.as_ref()? {
            EditorTarget::Create(shape) => shape.to_pixels(image_size),
            EditorTarget::Edit { annotation, .. } => annotation.pixel_shape(image_size)?,
        };
        Some(shape.bounds())
    }

    pub fn ui(&mut self, ctx: &egui::Context, frame: &ImageFrame, id_salt: &str) -> Option<EditorAction> {
        let bounds = self.bounds(frame.image_size)?;
        let pos = place_below(frame.rect_to_screen(bounds), frame.screen_rect, self.size, 4.0);

        let mut action = None;
        let window = egui::Window::new("Comment")
            .id(egui::Id::new(("notecrab_editor", id_salt)))
            .fixed_pos(pos)
            .title_bar(false)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                let res = ui.add(
                    egui::TextEdit::multiline(&mut self.text)
                        .hint_text("Add a comment...")
                        .desired_rows(3)
                        .desired_width(260.0),
                );
                if !res.has_focus() && !res.lost_focus() {
                    res.request_focus();
                }
                ui.horizontal(|ui| {
                    if ui.button("Cancel").clicked() {
                        action = Some(EditorAction::Cancel);
                    }
                    if ui.button("Save").clicked() {
                        action = Some(EditorAction::Save);
                    }
                });
            });
        if let Some(window) = window {
            self.size = window.response.rect.size();
        }

        ctx.input(|i| {
            if i.key_pressed(Key::Escape) {
                action = Some(EditorAction::Cancel);
            } else if i.modifiers.command && i.key_pressed(Key::Enter) {
                action = Some(EditorAction::Save);
            }
        });
        action
    }
}
