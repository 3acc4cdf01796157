//! Selectors turn pointer gestures into shape geometry.
//!
//! All positions a selector sees are image pixels, already clamped into the
//! image by the annotator. Shapes a selector produces are in
//! [`Units::Pixel`](crate::annotation::Units::Pixel); unit conversion is the
//! annotator's job.

mod polygon;
mod rect;

use eframe::egui::{Key, Painter};

pub use polygon::PolygonSelector;
pub use rect::RectSelector;

use crate::annotation::{Shape, ShapeType};
use crate::config::{OutlineStyle, Settings};
use crate::geometry::{ImageFrame, Point, RectGeometry};

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent {
    Started(Point),
    Changed(Shape),
    Completed(Shape),
    Canceled,
}

pub trait Selector {
    fn name(&self) -> &'static str;

    fn shape_type(&self) -> ShapeType;

    fn start_selection(&mut self, p: Point) -> SelectionEvent;

    /// Presses after the selection started. Most selectors only care about
    /// the release.
    fn pointer_pressed(&mut self, _p: Point) -> Option<SelectionEvent> {
        None
    }

    fn pointer_moved(&mut self, p: Point) -> Option<SelectionEvent>;

    fn pointer_released(&mut self, p: Point) -> Option<SelectionEvent>;

    fn key_pressed(&mut self, key: Key) -> Option<SelectionEvent>;

    /// Drops any in-progress or completed selection.
    fn stop_selection(&mut self);

    /// True while a gesture is underway, false once idle or completed.
    fn is_selecting(&self) -> bool;

    fn shape(&self) -> Option<Shape>;

    fn bounds(&self) -> Option<RectGeometry> {
        self.shape().map(|s| s.bounds())
    }

    fn draw(&self, painter: &Painter, frame: &ImageFrame, style: &OutlineStyle);
}

/// Every selector shipped with the crate, rectangle first.
pub fn builtin_selectors(settings: &Settings) -> Vec<Box<dyn Selector>> {
    vec![
        Box::new(RectSelector::new(settings.min_selection_size)),
        Box::new(PolygonSelector::new(settings.polygon_close_radius)),
    ]
}
