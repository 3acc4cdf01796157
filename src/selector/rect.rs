use eframe::egui::{Key, Painter};

use super::{SelectionEvent, Selector};
use crate::annotation::{Shape, ShapeType, Units};
use crate::config::OutlineStyle;
use crate::geometry::{ImageFrame, Point, RectGeometry};
use crate::viewer::paint_outline;

#[derive(Debug, Clone, Copy, PartialEq)]
enum DragState {
    Idle,
    Dragging { anchor: Point, current: Point },
    Completed(RectGeometry),
}

/// Drag from one corner to the opposite one.
#[derive(Debug)]
pub struct RectSelector {
    state: DragState,
    min_size: f32,
}

impl RectSelector {
    pub fn new(min_size: f32) -> Self {
        Self {
            state: DragState::Idle,
            min_size,
        }
    }

    fn rect(&self) -> Option<RectGeometry> {
        match self.state {
            DragState::Idle => None,
            DragState::Dragging { anchor, current } => {
                Some(RectGeometry::from_corners(anchor, current))
            }
            DragState::Completed(rect) => Some(rect),
        }
    }
}

impl Selector for RectSelector {
    fn name(&self) -> &'static str {
        "rect"
    }

    fn shape_type(&self) -> ShapeType {
        ShapeType::Rect
    }

    fn start_selection(&mut self, p: Point) -> SelectionEvent {
        self.state = DragState::Dragging {
            anchor: p,
            current: p,
        };
        SelectionEvent::Started(p)
    }

    fn pointer_moved(&mut self, p: Point) -> Option<SelectionEvent> {
        let DragState::Dragging { anchor, .. } = self.state else {
            return None;
        };
        self.state = DragState::Dragging { anchor, current: p };
        Some(SelectionEvent::Changed(Shape::rect(
            RectGeometry::from_corners(anchor, p),
            Units::Pixel,
        )))
    }

    fn pointer_released(&mut self, p: Point) -> Option<SelectionEvent> {
        let DragState::Dragging { anchor, .. } = self.state else {
            return None;
        };
        let rect = RectGeometry::from_corners(anchor, p);
        if rect.width < self.min_size || rect.height < self.min_size {
            self.state = DragState::Idle;
            return Some(SelectionEvent::Canceled);
        }
        self.state = DragState::Completed(rect);
        Some(SelectionEvent::Completed(Shape::rect(rect, Units::Pixel)))
    }

    fn key_pressed(&mut self, key: Key) -> Option<SelectionEvent> {
        match (key, self.state) {
            (Key::Escape, DragState::Dragging { .. }) => {
                self.state = DragState::Idle;
                Some(SelectionEvent::Canceled)
            }
            _ => None,
        }
    }

    fn stop_selection(&mut self) {
        self.state = DragState::Idle;
    }

    fn is_selecting(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    fn shape(&self) -> Option<Shape> {
        self.rect().map(|r| Shape::rect(r, Units::Pixel))
    }

    fn draw(&self, painter: &Painter, frame: &ImageFrame, style: &OutlineStyle) {
        if let Some(rect) = self.rect() {
            let r = frame.rect_to_screen(rect);
            paint_outline(
                painter,
                &[r.left_top(), r.right_top(), r.right_bottom(), r.left_bottom()],
                true,
                style,
                true,
            );
        }
    }
}
