//! Plain geometry used by shapes, hit testing and widget placement.

use eframe::egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<Pos2> for Point {
    fn from(p: Pos2) -> Self {
        Point::new(p.x, p.y)
    }
}

impl From<Point> for Pos2 {
    fn from(p: Point) -> Self {
        Pos2::new(p.x, p.y)
    }
}

/// Axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RectGeometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectGeometry {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalizes two arbitrary corners, so dragging up or left works too.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn min(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn max(&self) -> Point {
        Point::new(self.x + self.width, self.y + self.height)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PolygonGeometry {
    pub points: Vec<Point>,
}

impl PolygonGeometry {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Even-odd ray casting. Degenerate polygons contain nothing.
    pub fn contains(&self, p: Point) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }

        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let vi = self.points[i];
            let vj = self.points[j];
            if (vi.y > p.y) != (vj.y > p.y)
                && p.x < (vj.x - vi.x) * (p.y - vi.y) / (vj.y - vi.y) + vi.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    pub fn bounds(&self) -> RectGeometry {
        let Some(first) = self.points.first() else {
            return RectGeometry::default();
        };
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &self.points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        RectGeometry::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Shoelace formula, always positive.
    pub fn area(&self) -> f32 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            sum += a.x * b.y - b.x * a.y;
        }
        (sum / 2.0).abs()
    }
}

/// Where an image is drawn on screen, in relation to its natural size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageFrame {
    pub screen_rect: Rect,
    pub image_size: Vec2,
}

impl ImageFrame {
    pub fn new(screen_rect: Rect, image_size: Vec2) -> Self {
        Self {
            screen_rect,
            image_size,
        }
    }

    /// Screen pixels per image pixel.
    pub fn scale(&self) -> f32 {
        if self.image_size.x <= 0.0 {
            1.0
        } else {
            self.screen_rect.width() / self.image_size.x
        }
    }

    pub fn to_image(&self, screen: Pos2) -> Point {
        let size = self.screen_rect.size();
        if size.x <= 0.0 || size.y <= 0.0 {
            return Point::from(screen - self.screen_rect.min.to_vec2());
        }
        let normalized = (screen - self.screen_rect.min) / size;
        Point::new(
            normalized.x * self.image_size.x,
            normalized.y * self.image_size.y,
        )
    }

    pub fn to_screen(&self, image: Point) -> Pos2 {
        if self.image_size.x <= 0.0 || self.image_size.y <= 0.0 {
            return self.screen_rect.min;
        }
        let normalized = Vec2::new(image.x / self.image_size.x, image.y / self.image_size.y);
        self.screen_rect.min + normalized * self.screen_rect.size()
    }

    pub fn rect_to_screen(&self, rect: RectGeometry) -> Rect {
        Rect::from_min_max(self.to_screen(rect.min()), self.to_screen(rect.max()))
    }

    /// Pins an image position inside the image, for drags that leave it.
    pub fn clamp(&self, p: Point) -> Point {
        Point::new(
            p.x.clamp(0.0, self.image_size.x.max(0.0)),
            p.y.clamp(0.0, self.image_size.y.max(0.0)),
        )
    }
}

/// Top-left position for a widget of `size` hanging below `bounds`,
/// pushed back inside `container` when it would overflow.
pub fn place_below(bounds: Rect, container: Rect, size: Vec2, gap: f32) -> Pos2 {
    let mut x = bounds.min.x;
    let mut y = bounds.max.y + gap;

    if x + size.x > container.max.x {
        x = container.max.x - size.x;
    }
    if y + size.y > container.max.y {
        // No room underneath, flip above the bounds.
        y = bounds.min.y - gap - size.y;
    }
    x = x.max(container.min.x);
    y = y.max(container.min.y);
    Pos2::new(x, y)
}
