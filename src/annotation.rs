use std::sync::atomic::{AtomicU64, Ordering};

use eframe::egui::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::{Point, PolygonGeometry, RectGeometry};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique handle for an annotation. Never serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(u64);

impl AnnotationId {
    pub fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeType {
    Rect,
    Polygon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Pixel,
    /// Fractions of the natural image width and height.
    Fraction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Geometry {
    Rect(RectGeometry),
    Polygon(PolygonGeometry),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub geometry: Geometry,
    #[serde(default)]
    pub units: Units,
}

impl Shape {
    pub fn rect(rect: RectGeometry, units: Units) -> Self {
        Self {
            geometry: Geometry::Rect(rect),
            units,
        }
    }

    pub fn polygon(points: Vec<Point>, units: Units) -> Self {
        Self {
            geometry: Geometry::Polygon(PolygonGeometry::new(points)),
            units,
        }
    }

    pub fn shape_type(&self) -> ShapeType {
        match self.geometry {
            Geometry::Rect(_) => ShapeType::Rect,
            Geometry::Polygon(_) => ShapeType::Polygon,
        }
    }

    /// Point must be in the same units as the shape.
    pub fn contains(&self, p: Point) -> bool {
        match &self.geometry {
            Geometry::Rect(r) => r.contains(p),
            Geometry::Polygon(poly) => poly.contains(p),
        }
    }

    pub fn bounds(&self) -> RectGeometry {
        match &self.geometry {
            Geometry::Rect(r) => *r,
            Geometry::Polygon(poly) => poly.bounds(),
        }
    }

    pub fn area(&self) -> f32 {
        match &self.geometry {
            Geometry::Rect(r) => r.area(),
            Geometry::Polygon(poly) => poly.area(),
        }
    }

    /// Re-expresses the shape in `units` for an image of natural `image_size`.
    pub fn to_units(&self, units: Units, image_size: Vec2) -> Shape {
        // Without a natural size there is nothing to scale against.
        if self.units == units || image_size.x <= 0.0 || image_size.y <= 0.0 {
            return self.clone();
        }

        let convert = |p: Point| match units {
            Units::Fraction => Point::new(p.x / image_size.x, p.y / image_size.y),
            Units::Pixel => Point::new(p.x * image_size.x, p.y * image_size.y),
        };
        let geometry = match &self.geometry {
            Geometry::Rect(r) => {
                let min = convert(r.min());
                let size = convert(Point::new(r.width, r.height));
                Geometry::Rect(RectGeometry::new(min.x, min.y, size.x, size.y))
            }
            Geometry::Polygon(poly) => Geometry::Polygon(PolygonGeometry::new(
                poly.points.iter().map(|p| convert(*p)).collect(),
            )),
        };
        Shape { geometry, units }
    }

    pub fn to_pixels(&self, image_size: Vec2) -> Shape {
        self.to_units(Units::Pixel, image_size)
    }
}

fn default_editable() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(skip, default = "AnnotationId::next")]
    pub id: AnnotationId,
    pub src: String,
    #[serde(default)]
    pub text: String,
    pub shapes: Vec<Shape>,
    #[serde(default = "default_editable")]
    pub editable: bool,
}

impl Annotation {
    pub fn new(src: impl Into<String>, text: impl Into<String>, shape: Shape) -> Self {
        Self {
            id: AnnotationId::next(),
            src: src.into(),
            text: text.into(),
            shapes: vec![shape],
            editable: true,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    /// Annotations loaded from JSON may come without a shape.
    pub fn validate(&self) -> Result<()> {
        if self.shapes.is_empty() {
            return Err(Error::NoShape(self.src.clone()));
        }
        Ok(())
    }

    pub fn shape(&self) -> Option<&Shape> {
        self.shapes.first()
    }

    /// Pixel-space copy of the first shape, used for hit testing and drawing.
    pub fn pixel_shape(&self, image_size: Vec2) -> Option<Shape> {
        self.shape().map(|s| s.to_pixels(image_size))
    }

    pub fn label(&self) -> String {
        let kind = match self.shape().map(Shape::shape_type) {
            Some(ShapeType::Polygon) => "⬠ Polygon",
            _ => "⬜ Box",
        };
        if self.text.is_empty() {
            kind.to_string()
        } else {
            format!("{kind} \"{}\"", self.text)
        }
    }
}
