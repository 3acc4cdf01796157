use eframe::egui::{self, Vec2};

use crate::annotation::Annotation;
use crate::geometry::{ImageFrame, place_below};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupAction {
    Edit,
    Delete,
    CopyText,
}

#[derive(Debug, Default, PartialEq)]
pub struct PopupResponse {
    pub action: Option<PopupAction>,
    pub hovered: bool,
}

/// Floating text/controls for the annotation under the pointer.
///
/// The popup hides on a timer rather than immediately, so the pointer can
/// travel from the shape onto the popup without it disappearing.
#[derive(Debug)]
pub struct Popup {
    annotation: Option<Annotation>,
    hovered: bool,
    hide_at: Option<f64>,
    size: Vec2,
}

impl Default for Popup {
    fn default() -> Self {
        Self {
            annotation: None,
            hovered: false,
            hide_at: None,
            size: Vec2::new(200.0, 56.0),
        }
    }
}

impl Popup {
    pub fn show(&mut self, annotation: Annotation) {
        self.annotation = Some(annotation);
        self.hide_at = None;
    }

    pub fn hide(&mut self) -> Option<Annotation> {
        self.hide_at = None;
        self.hovered = false;
        self.annotation.take()
    }

    pub fn annotation(&self) -> Option<&Annotation> {
        self.annotation.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.annotation.is_some()
    }

    pub fn is_hovered(&self) -> bool {
        self.hovered
    }

    /// Keeps an already running timer, so repeated calls do not postpone it.
    pub fn start_hide_timer(&mut self, now: f64, delay: f64) {
        if self.annotation.is_some() && self.hide_at.is_none() {
            self.hide_at = Some(now + delay);
        }
    }

    pub fn clear_hide_timer(&mut self) {
        self.hide_at = None;
    }

    pub fn set_hovered(&mut self, hovered: bool, now: f64, delay: f64) {
        self.hovered = hovered;
        if hovered {
            self.clear_hide_timer();
        } else {
            self.start_hide_timer(now, delay);
        }
    }

    pub fn deadline(&self) -> Option<f64> {
        self.hide_at
    }

    pub fn is_due(&self, now: f64) -> bool {
        self.hide_at.is_some_and(|t| now >= t)
    }

    pub fn ui(&mut self, ctx: &egui::Context, frame: &ImageFrame) -> PopupResponse {
        let Some(annotation) = &self.annotation else {
            return PopupResponse::default();
        };

        let bounds = annotation
            .pixel_shape(frame.image_size)
            .map(|s| frame.rect_to_screen(s.bounds()))
            .unwrap_or(frame.screen_rect);
        let pos = place_below(bounds, frame.screen_rect, self.size, 4.0);

        let area = egui::Area::new(egui::Id::new(("notecrab_popup", &annotation.src)))
            .order(egui::Order::Foreground)
            .fixed_pos(pos)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style())
                    .show(ui, |ui| {
                        ui.set_max_width(260.0);
                        let mut action = None;
                        if annotation.text.is_empty() {
                            ui.weak("No comment");
                        } else {
                            ui.label(annotation.text.as_str());
                        }
                        ui.horizontal(|ui| {
                            if ui.small_button("📋").on_hover_text("Copy text").clicked() {
                                action = Some(PopupAction::CopyText);
                            }
                            if annotation.editable {
                                if ui.small_button("✏").on_hover_text("Edit").clicked() {
                                    action = Some(PopupAction::Edit);
                                }
                                if ui.small_button("🗑").on_hover_text("Delete").clicked() {
                                    action = Some(PopupAction::Delete);
                                }
                            }
                        });
                        action
                    })
                    .inner
            });

        let rect = area.response.rect;
        self.size = rect.size();
        PopupResponse {
            action: area.inner,
            hovered: ctx.pointer_hover_pos().is_some_and(|p| rect.contains(p)),
        }
    }
}
