use eframe::egui::{self, Color32, Painter, Vec2};

use crate::geometry::ImageFrame;

pub const DEFAULT_MESSAGE: &str = "Click and drag to annotate";

/// Short-lived help text in the corner of an annotatable image.
#[derive(Debug)]
pub struct Hint {
    message: String,
    visible_until: Option<f64>,
}

impl Default for Hint {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE)
    }
}

impl Hint {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            visible_until: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn show(&mut self, now: f64, duration: f64) {
        self.visible_until = Some(now + duration);
    }

    pub fn hide(&mut self) {
        self.visible_until = None;
    }

    pub fn is_visible(&self, now: f64) -> bool {
        self.visible_until.is_some_and(|t| now < t)
    }

    pub fn deadline(&self, now: f64) -> Option<f64> {
        self.visible_until.filter(|t| now < *t)
    }

    pub fn draw(&self, painter: &Painter, frame: &ImageFrame, now: f64) {
        if !self.is_visible(now) {
            return;
        }
        let galley = painter.layout_no_wrap(
            self.message.clone(),
            egui::FontId::proportional(14.0),
            Color32::WHITE,
        );
        let pos = frame.screen_rect.left_top() + Vec2::new(8.0, 8.0);
        let bg = egui::Rect::from_min_size(pos, galley.size()).expand(6.0);
        painter.rect_filled(bg, 4.0, Color32::from_black_alpha(160));
        painter.galley(pos, galley, Color32::WHITE);
    }
}
