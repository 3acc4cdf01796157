use eframe::egui::{self, Painter, Pos2, Stroke, Vec2};

use crate::annotation::{Annotation, AnnotationId, Geometry};
use crate::config::OutlineStyle;
use crate::geometry::{ImageFrame, Point};

/// Two-tone outline: a dark halo under a lighter stroke, so shapes stay
/// visible over both light and dark images.
pub fn paint_outline(
    painter: &Painter,
    points: &[Pos2],
    closed: bool,
    style: &OutlineStyle,
    highlighted: bool,
) {
    if points.len() < 2 {
        return;
    }

    let (stroke_color, stroke_width, fill) = if highlighted {
        (style.hi_stroke, style.hi_stroke_width, style.hi_fill)
    } else {
        (style.stroke, style.stroke_width, style.fill)
    };

    // Only rectangles are guaranteed convex.
    if closed && points.len() == 4 && fill[3] > 0 {
        painter.add(egui::Shape::convex_polygon(
            points.to_vec(),
            OutlineStyle::color(fill),
            Stroke::NONE,
        ));
    }

    let halo = Stroke::new(
        stroke_width + 2.0 * style.outline_width,
        OutlineStyle::color(style.outline),
    );
    let line = Stroke::new(stroke_width, OutlineStyle::color(stroke_color));
    if closed {
        painter.add(egui::Shape::closed_line(points.to_vec(), halo));
        painter.add(egui::Shape::closed_line(points.to_vec(), line));
    } else {
        painter.add(egui::Shape::line(points.to_vec(), halo));
        painter.add(egui::Shape::line(points.to_vec(), line));
    }
}

/// Annotations leaving and entering the highlight.
#[derive(Debug, Default, PartialEq)]
pub struct HighlightChange {
    pub out: Option<Annotation>,
    pub over: Option<Annotation>,
}

impl HighlightChange {
    pub fn is_empty(&self) -> bool {
        self.out.is_none() && self.over.is_none()
    }
}

/// Renders the finished annotations of one image and answers hit tests.
#[derive(Debug)]
pub struct Viewer {
    image_size: Vec2,
    annotations: Vec<Annotation>,
    highlighted: Option<AnnotationId>,
    visible: bool,
}

impl Viewer {
    pub fn new(image_size: Vec2) -> Self {
        Self {
            image_size,
            annotations: Vec::new(),
            highlighted: None,
            visible: true,
        }
    }

    pub fn add(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    /// Puts an annotation back at `index`, or at the end if the list shrank.
    pub fn insert(&mut self, index: usize, annotation: Annotation) {
        let index = index.min(self.annotations.len());
        self.annotations.insert(index, annotation);
    }

    pub fn position(&self, id: AnnotationId) -> Option<usize> {
        self.annotations.iter().position(|a| a.id == id)
    }

    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let index = self.annotations.iter().position(|a| a.id == id)?;
        if self.highlighted == Some(id) {
            self.highlighted = None;
        }
        Some(self.annotations.remove(index))
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
        self.highlighted = None;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Everything under `p` (image pixels), smallest area first.
    pub fn annotations_at(&self, p: Point) -> Vec<&Annotation> {
        if !self.visible {
            return Vec::new();
        }
        let mut hits: Vec<(f32, &Annotation)> = self
            .annotations
            .iter()
            .filter_map(|a| {
                let shape = a.pixel_shape(self.image_size)?;
                shape.contains(p).then(|| (shape.area(), a))
            })
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        hits.into_iter().map(|(_, a)| a).collect()
    }

    /// Small annotations nested in bigger ones stay reachable.
    pub fn topmost_at(&self, p: Point) -> Option<&Annotation> {
        self.annotations_at(p).into_iter().next()
    }

    pub fn highlighted(&self) -> Option<&Annotation> {
        self.highlighted.and_then(|id| self.get(id))
    }

    pub fn set_highlighted(&mut self, id: Option<AnnotationId>) -> HighlightChange {
        let id = id.filter(|id| self.get(*id).is_some());
        if id == self.highlighted {
            return HighlightChange::default();
        }
        let out = self.highlighted().cloned();
        self.highlighted = id;
        HighlightChange {
            out,
            over: self.highlighted().cloned(),
        }
    }

    pub fn draw(&self, painter: &Painter, frame: &ImageFrame, style: &OutlineStyle) {
        if !self.visible {
            return;
        }
        for annotation in &self.annotations {
            let Some(shape) = annotation.pixel_shape(self.image_size) else {
                continue;
            };
            let highlighted = self.highlighted == Some(annotation.id);
            match &shape.geometry {
                Geometry::Rect(r) => {
                    let r = frame.rect_to_screen(*r);
                    paint_outline(
                        painter,
                        &[r.left_top(), r.right_top(), r.right_bottom(), r.left_bottom()],
                        true,
                        style,
                        highlighted,
                    );
                }
                Geometry::Polygon(poly) => {
                    let points: Vec<Pos2> =
                        poly.points.iter().map(|p| frame.to_screen(*p)).collect();
                    paint_outline(painter, &points, true, style, highlighted);
                }
            }
        }
    }
}
