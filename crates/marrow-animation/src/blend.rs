//! Weighted blending of animation instances into a skeleton pose
//!
//! Every bone gathers the sampled keyframes of the instances that animate it,
//! normalizes their weights, and averages each transform component over the
//! contributors that define it. The blended locals are then composed down the
//! hierarchy into a `Pose`.

use crate::instance::AnimationInstance;
use crate::pose::Pose;
use crate::skeleton::{Bone, Skeleton};
use crate::track::Keyframe;
use glam::{Quat, Vec3, Vec4};
use marrow_core::Transform;
use serde::{Deserialize, Serialize};

/// What a bone does when instances animate it but none carries usable weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZeroWeightFallback {
    /// Keep the bind local transform.
    #[default]
    BindPose,
    /// Use the first instance (in input order) with a track for the bone, at full weight.
    HighestPriority,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendConfig {
    /// Weights at or below this are treated as no contribution
    pub weight_epsilon: f32,
    pub zero_weight_fallback: ZeroWeightFallback,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            weight_epsilon: 1e-4,
            zero_weight_fallback: ZeroWeightFallback::BindPose,
        }
    }
}

/// Stateless pose evaluator.
#[derive(Debug, Clone, Default)]
pub struct Blender {
    config: BlendConfig,
}

impl Blender {
    pub fn new(config: BlendConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BlendConfig {
        &self.config
    }

    /// Blend every bone across `instances` and compose the result.
    pub fn evaluate(&self, skeleton: &Skeleton, instances: &[&AnimationInstance]) -> Pose {
        let locals = skeleton
            .bones()
            .iter()
            .map(|bone| self.blend_bone(bone, instances))
            .collect();
        Pose::compose(skeleton, locals)
    }

    /// Blend `base` instances normally, then lay `overrides` on top.
    ///
    /// Override weights `w_o` are summed and capped at 1 to give `W`; they
    /// contribute absolutely while the base blend is scaled by `1 - W`. Where no
    /// base instance animates a bone, the remainder goes to the bind pose.
    /// Components the overrides leave unset keep the base blend's value.
    pub fn evaluate_layered(
        &self,
        skeleton: &Skeleton,
        base: &[&AnimationInstance],
        overrides: &[&AnimationInstance],
    ) -> Pose {
        let locals = skeleton
            .bones()
            .iter()
            .map(|bone| {
                let below = self.try_blend(bone, base).unwrap_or(*bone.bind());
                let samples = self.gather(bone, overrides);
                if samples.is_empty() {
                    return below;
                }
                let total: f32 = samples.iter().map(|(_, w)| w).sum();
                let layer = total.min(1.0);
                let mut weighted: Vec<(Keyframe, f32)> = samples
                    .into_iter()
                    .map(|(key, w)| (key, w / total * layer))
                    .collect();
                if layer < 1.0 {
                    weighted.push((full_keyframe(&below), 1.0 - layer));
                }
                blend_keyframes(&weighted, &below)
            })
            .collect();
        Pose::compose(skeleton, locals)
    }

    /// Blended local transform for one bone; bind transform if nothing contributes.
    pub fn blend_bone(&self, bone: &Bone, instances: &[&AnimationInstance]) -> Transform {
        self.try_blend(bone, instances).unwrap_or(*bone.bind())
    }

    /// `None` when no instance contributes and the fallback policy resolves to bind.
    fn try_blend(&self, bone: &Bone, instances: &[&AnimationInstance]) -> Option<Transform> {
        let samples = self.gather(bone, instances);
        if !samples.is_empty() {
            return Some(blend_keyframes(&samples, bone.bind()));
        }

        match self.config.zero_weight_fallback {
            ZeroWeightFallback::BindPose => None,
            ZeroWeightFallback::HighestPriority => {
                let first = instances
                    .iter()
                    .find_map(|instance| instance.local_transform(bone.name()))?;
                log::trace!(
                    "Bone '{}' has zero total weight, using highest-priority instance",
                    bone.name()
                );
                Some(first.apply_to(bone.bind()))
            }
        }
    }

    /// Sampled keyframes and weights of every instance contributing to `bone`.
    fn gather(&self, bone: &Bone, instances: &[&AnimationInstance]) -> Vec<(Keyframe, f32)> {
        instances
            .iter()
            .filter_map(|instance| {
                let weight = instance.weight();
                if !weight.is_finite() || weight <= self.config.weight_epsilon {
                    return None;
                }
                instance
                    .local_transform(bone.name())
                    .map(|key| (key, weight))
            })
            .collect()
    }
}

/// Weighted average of partial keyframes.
///
/// Each component is normalized over the samples that define it; a component
/// no sample defines is taken from `base`.
pub fn blend_keyframes(samples: &[(Keyframe, f32)], base: &Transform) -> Transform {
    let translation = average_vectors(samples.iter().filter_map(|(k, w)| Some((k.translation?, *w))));
    let scale = average_vectors(samples.iter().filter_map(|(k, w)| Some((k.scale?, *w))));
    let rotations: Vec<(Quat, f32)> = samples
        .iter()
        .filter_map(|(k, w)| Some((k.rotation?, *w)))
        .collect();

    Transform {
        translation: translation.unwrap_or(base.translation),
        rotation: average_rotations(&rotations).unwrap_or(base.rotation),
        scale: scale.unwrap_or(base.scale),
    }
}

fn average_vectors(samples: impl Iterator<Item = (Vec3, f32)>) -> Option<Vec3> {
    let mut sum = Vec3::ZERO;
    let mut total = 0.0;
    for (v, w) in samples {
        sum += v * w;
        total += w;
    }
    (total > 0.0).then(|| sum / total)
}

/// Normalized weighted quaternion average.
///
/// Every rotation is flipped into the hemisphere of the first one before
/// summing, so `q` and `-q` reinforce instead of cancelling. If the sum still
/// collapses to zero length the highest-weighted rotation wins.
pub fn average_rotations(rotations: &[(Quat, f32)]) -> Option<Quat> {
    let &(first, _) = rotations.first()?;
    let reference = Vec4::from(first);

    let mut sum = Vec4::ZERO;
    let mut heaviest = (first, f32::NEG_INFINITY);
    for &(q, w) in rotations {
        let v = Vec4::from(q);
        let aligned = if v.dot(reference) < 0.0 { -v } else { v };
        sum += aligned * w;
        if w > heaviest.1 {
            heaviest = (q, w);
        }
    }

    let length = sum.length();
    if !length.is_finite() || length < 1e-6 {
        log::trace!("Rotation average collapsed, using heaviest contributor");
        return Some(heaviest.0);
    }
    Some(Quat::from_vec4(sum / length))
}

/// A keyframe carrying every component of `t`.
fn full_keyframe(t: &Transform) -> Keyframe {
    Keyframe::at(0.0)
        .with_translation(t.translation)
        .with_rotation(t.rotation)
        .with_scale(t.scale)
}
