//! Screen-space geometry helpers for gesture synthesis
//!
//! All controls build their drag traces from these primitives: vector math,
//! uniform-disk jitter for believable touch placement, and discretization of
//! straight-line moves into steps bounded by a maximum pixel distance.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A point (or delta vector) in the consumer's screen coordinate space.
///
/// Y grows downward, matching the injection backend's convention.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(self, s: f64) -> Point {
        Point::new(self.x * s, self.y * s)
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance_to(self, other: Point) -> f64 {
        self.sub(other).length()
    }

    /// Unit vector in the same direction, or zero for a (near-)zero vector.
    ///
    /// Diagonal key combinations normalize to unit length, not 1.41x.
    pub fn normalize(self) -> Point {
        let l = self.length();
        if l <= 1e-9 {
            return Point::default();
        }
        self.scale(1.0 / l)
    }
}

/// Linear interpolation between two points, `t` in 0..=1.
pub fn lerp(a: Point, b: Point, t: f64) -> Point {
    Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

/// Random point uniformly distributed (by area) within `radius` of `center`.
///
/// A radius of zero or less returns `center` unchanged.
pub fn jitter<R: Rng>(center: Point, radius: f64, rng: &mut R) -> Point {
    if radius <= 0.0 {
        return center;
    }
    let theta = rng.gen::<f64>() * 2.0 * std::f64::consts::PI;
    let r = rng.gen::<f64>().sqrt() * radius;
    Point::new(center.x + theta.cos() * r, center.y + theta.sin() * r)
}

/// Discretize the move from `start` to `end` into points no further than
/// `max_step` apart. The final element is always exactly `end`.
pub fn segment_points(start: Point, end: Point, max_step: f64) -> Vec<Point> {
    if max_step <= 0.0 {
        return vec![end];
    }
    let dist = end.sub(start).length();
    if dist <= max_step {
        return vec![end];
    }
    let steps = (dist / max_step).ceil().max(1.0) as usize;
    (1..=steps)
        .map(|i| lerp(start, end, i as f64 / steps as f64))
        .collect()
}

/// Whether `p` lies within `radius` of `center` (with a small tolerance).
pub fn within_circle(p: Point, center: Point, radius: f64) -> bool {
    let d = p.sub(center);
    d.x * d.x + d.y * d.y <= radius * radius + 1e-6
}

/// Project `p` back onto the disk of `radius` around `center` if outside.
pub fn clamp_to_circle(p: Point, center: Point, radius: f64) -> Point {
    let d = p.sub(center);
    let dist = d.length();
    if dist <= radius || dist <= 1e-6 {
        return p;
    }
    center.add(d.scale(radius / dist))
}

/// Exact point where the segment `from -> to` exits the circle of `radius`
/// around `center`. `from` must be inside and `to` outside; if the quadratic
/// has no usable root the projection of `to` onto the circle is returned.
pub fn circle_exit(center: Point, radius: f64, from: Point, to: Point) -> Point {
    let a0 = from.sub(center);
    let d = to.sub(from);
    let a = d.x * d.x + d.y * d.y;
    if a > 1e-9 {
        let b = 2.0 * (a0.x * d.x + a0.y * d.y);
        let c = a0.x * a0.x + a0.y * a0.y - radius * radius;
        let disc = b * b - 4.0 * a * c;
        if disc >= 0.0 {
            let sd = disc.sqrt();
            let t1 = (-b - sd) / (2.0 * a);
            let t2 = (-b + sd) / (2.0 * a);
            let t_hit = [t1, t2]
                .into_iter()
                .filter(|t| (0.0..=1.0).contains(t))
                .fold(f64::INFINITY, f64::min);
            if t_hit.is_finite() {
                return from.add(d.scale(t_hit));
            }
        }
    }
    clamp_to_circle(to, center, radius)
}
