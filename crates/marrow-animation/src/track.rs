//! Per-bone keyframe tracks and their interpolated sampling

use glam::{Quat, Vec3};
use marrow_core::{slerp_shortest, MarrowError, Result, Transform};
use serde::{Deserialize, Serialize};

/// A timestamped, partially specified rigid transform.
///
/// Each component is independently optional, so a track may animate only
/// rotation and leave translation and scale to the bind pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Time in seconds from clip start
    pub time: f32,
    #[serde(default)]
    pub rotation: Option<Quat>,
    #[serde(default)]
    pub translation: Option<Vec3>,
    #[serde(default)]
    pub scale: Option<Vec3>,
}

impl Keyframe {
    /// A keyframe at `time` with no components set.
    pub fn at(time: f32) -> Self {
        Self {
            time,
            rotation: None,
            translation: None,
            scale: None,
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = Some(translation);
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Fill the components this keyframe leaves unset from `base`.
    pub fn apply_to(&self, base: &Transform) -> Transform {
        Transform {
            translation: self.translation.unwrap_or(base.translation),
            rotation: self.rotation.unwrap_or(base.rotation),
            scale: self.scale.unwrap_or(base.scale),
        }
    }

    fn retimed(&self, time: f32) -> Keyframe {
        Keyframe { time, ..*self }
    }
}

/// An ordered, immutable sequence of keyframes for one bone.
///
/// Guaranteed non-empty with strictly increasing timestamps and unit-length
/// rotations.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    keyframes: Vec<Keyframe>,
}

impl Track {
    /// Validate and freeze a keyframe sequence.
    ///
    /// Rotations are normalized on the way in; zero-length or non-finite ones
    /// are rejected along with empty tracks and non-increasing timestamps.
    pub fn new(mut keyframes: Vec<Keyframe>) -> Result<Self> {
        if keyframes.is_empty() {
            return Err(MarrowError::MalformedData("track has no keyframes".into()));
        }

        let mut previous: Option<f32> = None;
        for (i, kf) in keyframes.iter_mut().enumerate() {
            if !kf.time.is_finite() {
                return Err(MarrowError::MalformedData(format!(
                    "keyframe {} has non-finite time {}",
                    i, kf.time
                )));
            }
            if let Some(prev) = previous {
                if kf.time <= prev {
                    return Err(MarrowError::MalformedData(format!(
                        "keyframe {} at t={} does not come after t={}",
                        i, kf.time, prev
                    )));
                }
            }
            previous = Some(kf.time);

            if let Some(q) = kf.rotation {
                let len = q.length();
                if !len.is_finite() || len < 1e-6 {
                    return Err(MarrowError::MalformedData(format!(
                        "keyframe {} at t={} has a rotation that cannot be normalized",
                        i, kf.time
                    )));
                }
                kf.rotation = Some(q / len);
            }
            for (label, v) in [("translation", kf.translation), ("scale", kf.scale)] {
                if v.is_some_and(|v| !v.is_finite()) {
                    return Err(MarrowError::MalformedData(format!(
                        "keyframe {} at t={} has a non-finite {}",
                        i, kf.time, label
                    )));
                }
            }
        }

        Ok(Self { keyframes })
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    /// Time of the last keyframe.
    pub fn duration(&self) -> f32 {
        self.last().time
    }

    pub fn has_rotation(&self) -> bool {
        self.keyframes.iter().any(|kf| kf.rotation.is_some())
    }

    pub fn has_translation(&self) -> bool {
        self.keyframes.iter().any(|kf| kf.translation.is_some())
    }

    pub fn has_scale(&self) -> bool {
        self.keyframes.iter().any(|kf| kf.scale.is_some())
    }

    fn first(&self) -> &Keyframe {
        &self.keyframes[0]
    }

    fn last(&self) -> &Keyframe {
        &self.keyframes[self.keyframes.len() - 1]
    }

    /// Sample the track at `time`, returning a keyframe stamped with `time`.
    ///
    /// Times outside the keyframe range clamp to the edge keyframe. Inside,
    /// each component is interpolated only when both bracketing keyframes
    /// define it (rotation by shortest-path slerp, translation and scale
    /// linearly); otherwise it is reported absent.
    pub fn sample(&self, time: f32) -> Keyframe {
        let first = self.first();
        if time.is_nan() || time <= first.time {
            return first.retimed(time);
        }

        let last = self.last();
        if time >= last.time {
            return last.retimed(time);
        }

        // First keyframe strictly after `time`; the range checks above keep it in 1..len
        let next_idx = self.keyframes.partition_point(|kf| kf.time <= time);
        let prev = &self.keyframes[next_idx - 1];
        let next = &self.keyframes[next_idx];

        if prev.time == time {
            return prev.retimed(time);
        }

        let span = next.time - prev.time;
        let t = if span > 0.0 {
            ((time - prev.time) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Keyframe {
            time,
            rotation: match (prev.rotation, next.rotation) {
                (Some(a), Some(b)) => Some(slerp_shortest(a, b, t)),
                _ => None,
            },
            translation: match (prev.translation, next.translation) {
                (Some(a), Some(b)) => Some(a.lerp(b, t)),
                _ => None,
            },
            scale: match (prev.scale, next.scale) {
                (Some(a), Some(b)) => Some(a.lerp(b, t)),
                _ => None,
            },
        }
    }
}
