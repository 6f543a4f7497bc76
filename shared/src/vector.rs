use serde::{Deserialize, Serialize};

///Represents a vector in 2D space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vector2 {
    ///Value along the x-axis.
    /// Positive direction is to the right.
    pub x: f32,
    ///Value along the y-axis.
    /// Positive direction is up.
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Vector2 { x, y }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    ///Returns the distance between two points.
    pub fn distance(&self, other: &Vector2) -> f32 {
        Vector2 {
            x: other.x - self.x,
            y: other.y - self.y,
        }
        .magnitude()
    }
}

///Axis-aligned box described by its centre and full size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub center: Vector2,
    pub size: Vector2,
}

impl Aabb {
    pub fn new(center: Vector2, size: Vector2) -> Self {
        Aabb { center, size }
    }

    pub fn left(&self) -> f32 {
        self.center.x - self.size.x / 2.0
    }

    pub fn right(&self) -> f32 {
        self.center.x + self.size.x / 2.0
    }

    pub fn bottom(&self) -> f32 {
        self.center.y - self.size.y / 2.0
    }

    pub fn top(&self) -> f32 {
        self.center.y + self.size.y / 2.0
    }

    /// Boxes that only touch at an edge do not overlap.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        !(self.right() <= other.left()
            || other.right() <= self.left()
            || self.top() <= other.bottom()
            || other.top() <= self.bottom())
    }
}
