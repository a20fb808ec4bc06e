//! Math types.
//!
//! The arena is a flat plane: positions are `(x, z)` pairs on the ground.
//! Headings are whole degrees, clockwise, with 0 pointing along +z.

use serde::{Deserialize, Serialize};

/// 2D ground-plane vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec2 {
    pub x: f32,
    pub z: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, z: 0.0 };

    pub const fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.z * rhs.z
    }

    pub fn len_sq(self) -> f32 {
        self.dot(self)
    }

    pub fn distance(self, to: Self) -> f32 {
        Self::new(to.x - self.x, to.z - self.z).len_sq().sqrt()
    }

    pub fn lerp(self, to: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::new(
            self.x + (to.x - self.x) * t,
            self.z + (to.z - self.z) * t,
        )
    }

    /// Like [`Vec2::lerp`] but never lands past `to` on either axis, even
    /// under float rounding.
    pub fn approach(self, to: Self, t: f32) -> Self {
        let next = self.lerp(to, t);
        Self::new(
            clamp_toward(self.x, next.x, to.x),
            clamp_toward(self.z, next.z, to.z),
        )
    }
}

fn clamp_toward(from: f32, next: f32, to: f32) -> f32 {
    if from <= to {
        next.clamp(from, to)
    } else {
        next.clamp(to, from)
    }
}

/// Wraps any angle in degrees into `[0, 360)`.
pub fn wrap_degrees(deg: f32) -> f32 {
    if !deg.is_finite() {
        return 0.0;
    }
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Normalizes a heading to the whole-degree form the wire protocol carries.
pub fn wire_angle(deg: f32) -> u32 {
    let rounded = wrap_degrees(deg).round() as u32;
    rounded % 360
}

/// Heading of a direction vector, where `x` is right and `y` is forward.
///
/// 0 = forward, 90 = right, 180 = back, 270 = left. Returns `None` for the
/// zero vector, which carries no heading.
pub fn heading_from_axes(x: f32, y: f32) -> Option<f32> {
    if x == 0.0 && y == 0.0 {
        return None;
    }
    Some(wrap_degrees(x.atan2(y).to_degrees()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec2_lerp_midpoint() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(2.0, 4.0);
        assert_eq!(a.lerp(b, 0.5), Vec2::new(1.0, 2.0));
    }

    #[test]
    fn approach_never_passes_target() {
        let target = Vec2::new(1.0, -1.0);
        let mut p = Vec2::new(0.999_999, -0.999_999);
        for _ in 0..50 {
            p = p.approach(target, 0.2);
            assert!(p.x <= target.x);
            assert!(p.z >= target.z);
        }
    }

    #[test]
    fn headings_follow_compass() {
        let cases = [
            ((0.0, 1.0), 0.0),
            ((1.0, 0.0), 90.0),
            ((0.0, -1.0), 180.0),
            ((-1.0, 0.0), 270.0),
            ((-1.0, 1.0), 315.0),
        ];
        for ((x, y), want) in cases {
            let got = heading_from_axes(x, y).unwrap();
            assert!((got - want).abs() < 1e-3, "({x}, {y}) -> {got}");
        }
        assert_eq!(heading_from_axes(0.0, 0.0), None);
    }

    #[test]
    fn wire_angle_wraps() {
        assert_eq!(wire_angle(-90.0), 270);
        assert_eq!(wire_angle(360.0), 0);
        assert_eq!(wire_angle(359.6), 0);
        assert_eq!(wire_angle(725.0), 5);
        assert_eq!(wire_angle(f32::NAN), 0);
    }
}
