//! Rectangles and affine transforms in PDF user space.

use serde::{Deserialize, Serialize};

/// Axis-aligned box in PDF user space (origin bottom-left, points).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl Rect {
    pub const fn new(left: f32, bottom: f32, right: f32, top: f32) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    /// Builds a rect from an origin and a size, normalizing negative extents.
    pub fn from_origin(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::bounding(&[(x, y), (x + width, y + height)])
    }

    /// Smallest rect covering every point. An empty slice yields a zero rect.
    pub fn bounding(points: &[(f32, f32)]) -> Self {
        let Some(&(x0, y0)) = points.first() else {
            return Self::new(0.0, 0.0, 0.0, 0.0);
        };
        points.iter().skip(1).fold(Self::new(x0, y0, x0, y0), |acc, &(x, y)| {
            Self::new(acc.left.min(x), acc.bottom.min(y), acc.right.max(x), acc.top.max(y))
        })
    }

    /// True when the two boxes share any area. Boxes that only touch along an
    /// edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.bottom < other.top
            && other.bottom < self.top
    }
}

/// PDF transformation matrix `[a b c d e f]`, applied to row vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other`: applies `self` first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Bounding box of a rect after transformation.
    pub fn apply_rect(&self, rect: &Rect) -> Rect {
        Rect::bounding(&[
            self.apply(rect.left, rect.bottom),
            self.apply(rect.right, rect.bottom),
            self.apply(rect.left, rect.top),
            self.apply(rect.right, rect.top),
        ])
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}
