//! Spatial types

use glam::{Mat4, Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// A rigid transform: translation, unit-quaternion rotation, and per-axis scale.
///
/// Used both for a bone's local transform relative to its parent and for the
/// absolute (skeleton-root-relative) transforms of a resolved pose.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Compose `self` (the parent) with `child`: the result maps child-local
    /// space into the space `self` is expressed in.
    ///
    /// Scale propagates per axis; the shear a non-uniform parent scale would
    /// induce on a rotated child is not represented.
    pub fn compose(&self, child: &Transform) -> Transform {
        Transform {
            translation: self.translation + self.rotation * (self.scale * child.translation),
            rotation: (self.rotation * child.rotation).normalize(),
            scale: self.scale * child.scale,
        }
    }

    /// Apply this transform to a point.
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.translation + self.rotation * (self.scale * point)
    }

    /// Convert to a 4x4 column-major matrix (scale, then rotate, then translate).
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Component-wise comparison with a tolerance. Rotations compare equal
    /// when they describe the same orientation, regardless of quaternion sign.
    pub fn abs_diff_eq(&self, other: &Transform, max_abs_diff: f32) -> bool {
        let same_rotation = Vec4::from(self.rotation).abs_diff_eq(Vec4::from(other.rotation), max_abs_diff)
            || Vec4::from(self.rotation).abs_diff_eq(-Vec4::from(other.rotation), max_abs_diff);
        same_rotation
            && self.translation.abs_diff_eq(other.translation, max_abs_diff)
            && self.scale.abs_diff_eq(other.scale, max_abs_diff)
    }
}

/// Spherical linear interpolation that always takes the shorter arc.
///
/// `a` and `b` are expected to be unit quaternions; the result is normalized.
/// `q` and `-q` encode the same orientation, so when the inputs lie in
/// opposite hemispheres `b` is negated first.
pub fn slerp_shortest(a: Quat, b: Quat, t: f32) -> Quat {
    let va = Vec4::from(a);
    let mut vb = Vec4::from(b);
    let mut dot = va.dot(vb);

    if dot < 0.0 {
        vb = -vb;
        dot = -dot;
    }

    // Nearly parallel: fall back to a normalized lerp to avoid dividing by sin(0)
    let (scale_a, scale_b) = if dot > 0.9995 {
        (1.0 - t, t)
    } else {
        let theta = dot.acos();
        let sin_theta = theta.sin();
        (
            ((1.0 - t) * theta).sin() / sin_theta,
            (t * theta).sin() / sin_theta,
        )
    };

    let r = va * scale_a + vb * scale_b;
    let len = r.length();
    if len < 1e-10 {
        return a;
    }
    Quat::from_vec4(r / len)
}
