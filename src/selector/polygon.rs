use eframe::egui::{Key, Painter, Pos2, Stroke};

use super::{SelectionEvent, Selector};
use crate::annotation::{Shape, ShapeType, Units};
use crate::config::OutlineStyle;
use crate::geometry::{ImageFrame, Point};
use crate::viewer::paint_outline;

#[derive(Debug, Clone, PartialEq)]
enum PolygonState {
    Idle,
    Drawing { points: Vec<Point>, cursor: Point },
    Completed(Vec<Point>),
}

/// Each release places a vertex; releasing on the first vertex closes it.
#[derive(Debug)]
pub struct PolygonSelector {
    state: PolygonState,
    close_radius: f32,
}

impl PolygonSelector {
    pub fn new(close_radius: f32) -> Self {
        Self {
            state: PolygonState::Idle,
            close_radius,
        }
    }

    fn complete(&mut self, points: Vec<Point>) -> SelectionEvent {
        let shape = Shape::polygon(points.clone(), Units::Pixel);
        self.state = PolygonState::Completed(points);
        SelectionEvent::Completed(shape)
    }

    /// Vertices plus the rubber-band cursor while drawing.
    fn outline(&self) -> Option<Vec<Point>> {
        match &self.state {
            PolygonState::Idle => None,
            PolygonState::Drawing { points, cursor } => {
                let mut all = points.clone();
                all.push(*cursor);
                Some(all)
            }
            PolygonState::Completed(points) => Some(points.clone()),
        }
    }
}

impl Selector for PolygonSelector {
    fn name(&self) -> &'static str {
        "polygon"
    }

    fn shape_type(&self) -> ShapeType {
        ShapeType::Polygon
    }

    fn start_selection(&mut self, p: Point) -> SelectionEvent {
        self.state = PolygonState::Drawing {
            points: vec![p],
            cursor: p,
        };
        SelectionEvent::Started(p)
    }

    fn pointer_moved(&mut self, p: Point) -> Option<SelectionEvent> {
        let PolygonState::Drawing { points, cursor } = &mut self.state else {
            return None;
        };
        *cursor = p;
        let mut all = points.clone();
        all.push(p);
        Some(SelectionEvent::Changed(Shape::polygon(all, Units::Pixel)))
    }

    fn pointer_released(&mut self, p: Point) -> Option<SelectionEvent> {
        let PolygonState::Drawing { points, cursor } = &mut self.state else {
            return None;
        };
        *cursor = p;

        let first = points[0];
        let last = points[points.len() - 1];
        if p.distance(first) <= self.close_radius {
            // Too few vertices to close: the release is ignored.
            if points.len() < 3 {
                return None;
            }
            let points = std::mem::take(points);
            return Some(self.complete(points));
        }
        if p.distance(last) > self.close_radius {
            points.push(p);
            return Some(SelectionEvent::Changed(Shape::polygon(
                points.clone(),
                Units::Pixel,
            )));
        }
        None
    }

    fn key_pressed(&mut self, key: Key) -> Option<SelectionEvent> {
        let PolygonState::Drawing { points, .. } = &mut self.state else {
            return None;
        };
        match key {
            Key::Enter if points.len() >= 3 => {
                let points = std::mem::take(points);
                Some(self.complete(points))
            }
            Key::Backspace => {
                points.pop();
                if points.is_empty() {
                    self.state = PolygonState::Idle;
                    Some(SelectionEvent::Canceled)
                } else {
                    Some(SelectionEvent::Changed(Shape::polygon(
                        points.clone(),
                        Units::Pixel,
                    )))
                }
            }
            Key::Escape => {
                self.state = PolygonState::Idle;
                Some(SelectionEvent::Canceled)
            }
            _ => None,
        }
    }

    fn stop_selection(&mut self) {
        self.state = PolygonState::Idle;
    }

    fn is_selecting(&self) -> bool {
        matches!(self.state, PolygonState::Drawing { .. })
    }

    fn shape(&self) -> Option<Shape> {
        self.outline().map(|points| Shape::polygon(points, Units::Pixel))
    }

    fn draw(&self, painter: &Painter, frame: &ImageFrame, style: &OutlineStyle) {
        let Some(points) = self.outline() else {
            return;
        };
        let screen: Vec<Pos2> = points.iter().map(|p| frame.to_screen(*p)).collect();
        let closed = matches!(self.state, PolygonState::Completed(_));
        paint_outline(painter, &screen, closed, style, true);

        if let PolygonState::Drawing { points, cursor } = &self.state {
            let snapping = points.len() >= 3 && cursor.distance(points[0]) <= self.close_radius;
            let radius = (self.close_radius * frame.scale()).max(3.0);
            let color = if snapping {
                OutlineStyle::color(style.hi_stroke)
            } else {
                OutlineStyle::color(style.stroke)
            };
            painter.circle_stroke(screen[0], radius, Stroke::new(style.stroke_width, color));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drawing_triangle() -> PolygonSelector {
        let mut sel = PolygonSelector::new(10.0);
        sel.start_selection(Point::new(0.0, 0.0));
        // Initial release lands on the start vertex and is ignored.
        assert_eq!(sel.pointer_released(Point::new(0.0, 0.0)), None);
        sel.pointer_released(Point::new(100.0, 0.0));
        sel.pointer_released(Point::new(100.0, 100.0));
        sel
    }

    fn completed_points(event: Option<SelectionEvent>) -> Vec<Point> {
        match event {
            Some(SelectionEvent::Completed(Shape {
                geometry: crate::annotation::Geometry::Polygon(poly),
                ..
            })) => poly.points,
            other => panic!("expected completed polygon, got {other:?}"),
        }
    }

    #[test]
    fn release_near_first_vertex_closes() {
        let mut sel = drawing_triangle();
        let points = completed_points(sel.pointer_released(Point::new(4.0, 3.0)));
        assert_eq!(
            points,
            vec![
                Point::new(0.0, 0.0),
                Point::new(100.0, 0.0),
                Point::new(100.0, 100.0)
            ]
        );
        assert!(!sel.is_selecting());
    }

    #[test]
    fn too_few_vertices_do_not_close() {
        let mut sel = PolygonSelector::new(10.0);
        sel.start_selection(Point::new(0.0, 0.0));
        sel.pointer_released(Point::new(50.0, 0.0));
        // Only two vertices: a release on the first vertex adds nothing.
        assert_eq!(sel.pointer_released(Point::new(2.0, 2.0)), None);
        assert!(sel.is_selecting());
        assert_eq!(
            sel.shape().map(|s| s.bounds().width),
            Some(50.0),
            "no vertex was placed near the first one"
        );
        match &sel.state {
            PolygonState::Drawing { points, .. } => assert_eq!(points.len(), 2),
            other => panic!("expected drawing, got {other:?}"),
        }
    }

    #[test]
    fn enter_completes_and_escape_cancels() {
        let mut sel = drawing_triangle();
        let points = completed_points(sel.key_pressed(Key::Enter));
        assert_eq!(points.len(), 3);

        let mut sel = drawing_triangle();
        assert_eq!(sel.key_pressed(Key::Escape), Some(SelectionEvent::Canceled));
        assert!(sel.shape().is_none());
    }

    #[test]
    fn backspace_removes_vertices_then_cancels() {
        let mut sel = PolygonSelector::new(10.0);
        sel.start_selection(Point::new(0.0, 0.0));
        sel.pointer_released(Point::new(50.0, 0.0));

        assert!(matches!(
            sel.key_pressed(Key::Backspace),
            Some(SelectionEvent::Changed(_))
        ));
        assert_eq!(
            sel.key_pressed(Key::Backspace),
            Some(SelectionEvent::Canceled)
        );
        assert!(!sel.is_selecting());
    }

    #[test]
    fn in_progress_shape_includes_cursor() {
        let mut sel = PolygonSelector::new(10.0);
        sel.start_selection(Point::new(0.0, 0.0));
        sel.pointer_moved(Point::new(30.0, 40.0));
        let shape = sel.shape().unwrap();
        assert_eq!(shape.bounds().width, 30.0);
        assert_eq!(shape.bounds().height, 40.0);
    }
}
