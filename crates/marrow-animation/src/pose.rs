//! Resolved per-bone transforms for one frame

use crate::skeleton::Skeleton;
use glam::Mat4;
use marrow_core::{BoneId, MarrowError, Result, Transform};

/// Local and absolute transform of every bone in a skeleton, indexed by `BoneId`.
///
/// Absolute transforms are relative to the skeleton root space and are what a
/// skinning step consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pose {
    local: Vec<Transform>,
    absolute: Vec<Transform>,
}

impl Pose {
    /// Compose per-bone local transforms down the hierarchy.
    ///
    /// `locals` must hold exactly one transform per bone, in `BoneId` order.
    pub fn from_locals(skeleton: &Skeleton, locals: Vec<Transform>) -> Result<Self> {
        if locals.len() != skeleton.bone_count() {
            return Err(MarrowError::MalformedData(format!(
                "pose for skeleton '{}' needs {} local transforms, got {}",
                skeleton.name(),
                skeleton.bone_count(),
                locals.len()
            )));
        }
        Ok(Self::compose(skeleton, locals))
    }

    /// Caller guarantees `local.len() == skeleton.bone_count()`.
    pub(crate) fn compose(skeleton: &Skeleton, local: Vec<Transform>) -> Self {
        let mut absolute = vec![Transform::IDENTITY; local.len()];
        for &id in skeleton.traversal_order() {
            let i = id.index();
            absolute[i] = match skeleton.bones()[i].parent() {
                Some(parent) => absolute[parent.index()].compose(&local[i]),
                None => local[i],
            };
        }
        Self { local, absolute }
    }

    pub fn bone_count(&self) -> usize {
        self.absolute.len()
    }

    pub fn is_empty(&self) -> bool {
        self.absolute.is_empty()
    }

    /// Blended transform of `id` relative to its parent
    pub fn local(&self, id: BoneId) -> Option<&Transform> {
        self.local.get(id.index())
    }

    pub fn absolute(&self, id: BoneId) -> Option<&Transform> {
        self.absolute.get(id.index())
    }

    pub fn absolute_by_name(&self, skeleton: &Skeleton, name: &str) -> Result<&Transform> {
        let id = skeleton.bone_by_name(name)?.id();
        self.absolute(id)
            .ok_or_else(|| MarrowError::bone_not_found(name, skeleton.name()))
    }

    pub fn locals(&self) -> &[Transform] {
        &self.local
    }

    pub fn absolutes(&self) -> &[Transform] {
        &self.absolute
    }

    /// `(bone, absolute transform)` pairs in `BoneId` order
    pub fn iter(&self) -> impl Iterator<Item = (BoneId, &Transform)> {
        self.absolute
            .iter()
            .enumerate()
            .map(|(i, t)| (BoneId::from_index(i), t))
    }

    /// Absolute transforms as matrices.
    pub fn matrices(&self) -> Vec<Mat4> {
        self.absolute.iter().map(Transform::to_matrix).collect()
    }

    /// `absolute * inverse_bind` per bone: identity everywhere in the bind pose.
    pub fn skinning_matrices(&self, skeleton: &Skeleton) -> Vec<Mat4> {
        self.absolute
            .iter()
            .zip(skeleton.inverse_bind_matrices())
            .map(|(absolute, inverse_bind)| absolute.to_matrix() * *inverse_bind)
            .collect()
    }
}
