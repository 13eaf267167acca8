use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// A position in layout units. Y grows downwards, one row per layer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn translate_x(&mut self, dx: f64) {
        self.x += dx;
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned box centred on `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub center: Point,
    pub size: Size,
}

impl Bounds {
    pub fn centered(center: Point, size: Size) -> Self {
        Self { center, size }
    }

    pub fn min_x(&self) -> f64 {
        self.center.x - self.size.width / 2.0
    }

    pub fn max_x(&self) -> f64 {
        self.center.x + self.size.width / 2.0
    }

    pub fn min_y(&self) -> f64 {
        self.center.y - self.size.height / 2.0
    }

    pub fn max_y(&self) -> f64 {
        self.center.y + self.size.height / 2.0
    }

    /// Strict intersection; boxes that only touch along an edge do not intersect.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x() < other.max_x()
            && other.min_x() < self.max_x()
            && self.min_y() < other.max_y()
            && other.min_y() < self.max_y()
    }
}
