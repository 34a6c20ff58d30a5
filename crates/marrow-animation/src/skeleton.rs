//! Runtime skeleton representation with bone hierarchy and bind pose

use crate::pose::Pose;
use glam::Mat4;
use marrow_core::{BoneId, MarrowError, Result, Transform};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// A single bone: its place in the hierarchy and its rest transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    id: BoneId,
    name: String,
    parent: Option<BoneId>,
    bind: Transform,
    length: f32,
}

impl Bone {
    pub fn id(&self) -> BoneId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<BoneId> {
        self.parent
    }

    /// Bind (rest) transform relative to the parent bone
    pub fn bind(&self) -> &Transform {
        &self.bind
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Immutable bone hierarchy, shared by every pose evaluated against it.
///
/// Bones are stored in declaration order and addressed by `BoneId`. A
/// parent-before-child traversal order is computed once at build time, so
/// pose composition is a single forward pass:
/// 1. Blending writes one local transform per bone
/// 2. `traversal_order()` visits each parent before its children
/// 3. `absolute[i] = absolute[parent[i]] ∘ local[i]`
/// 4. Skinning: `absolute[i] * inverse_bind_matrices()[i]`
#[derive(Debug)]
pub struct Skeleton {
    name: String,
    bones: Vec<Bone>,
    by_name: HashMap<String, BoneId>,
    children: Vec<Vec<BoneId>>,
    roots: Vec<BoneId>,
    order: Vec<BoneId>,
    inverse_bind: Vec<Mat4>,
}

impl Skeleton {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn bone(&self, id: BoneId) -> Option<&Bone> {
        self.bones.get(id.index())
    }

    pub fn find(&self, name: &str) -> Option<BoneId> {
        self.by_name.get(name).copied()
    }

    /// Direct lookup by name; a missing bone is an error.
    pub fn bone_by_name(&self, name: &str) -> Result<&Bone> {
        self.find(name)
            .and_then(|id| self.bone(id))
            .ok_or_else(|| MarrowError::bone_not_found(name, &self.name))
    }

    pub fn roots(&self) -> &[BoneId] {
        &self.roots
    }

    /// Direct children of `id`, in declaration order. Empty for unknown ids.
    pub fn children(&self, id: BoneId) -> &[BoneId] {
        self.children
            .get(id.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every bone, each parent before any of its children.
    pub fn traversal_order(&self) -> &[BoneId] {
        &self.order
    }

    /// The pose in which every bone sits at its bind transform.
    pub fn bind_pose(&self) -> Pose {
        let locals = self.bones.iter().map(|bone| bone.bind).collect();
        Pose::compose(self, locals)
    }

    /// Inverse of each bone's absolute bind matrix, indexed by `BoneId`.
    pub fn inverse_bind_matrices(&self) -> &[Mat4] {
        &self.inverse_bind
    }
}

struct PendingBone {
    name: String,
    parent: Option<String>,
    bind: Transform,
    length: f32,
}

/// Collects bones by name and freezes them into a validated `Skeleton`.
///
/// Parents are referenced by name and may be declared after their children.
pub struct SkeletonBuilder {
    name: String,
    bones: Vec<PendingBone>,
}

impl SkeletonBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bones: Vec::new(),
        }
    }

    /// Add a bone with the default length of 1.
    pub fn bone(self, name: impl Into<String>, parent: Option<&str>, bind: Transform) -> Self {
        self.bone_with_length(name, parent, bind, 1.0)
    }

    pub fn bone_with_length(
        mut self,
        name: impl Into<String>,
        parent: Option<&str>,
        bind: Transform,
        length: f32,
    ) -> Self {
        self.bones.push(PendingBone {
            name: name.into(),
            parent: parent.map(str::to_string),
            bind,
            length,
        });
        self
    }

    /// Validate the hierarchy and freeze it.
    ///
    /// Duplicate names and bad bind data are `MalformedData`; a parent that
    /// was never declared or a parent cycle is a `HierarchyError`.
    pub fn build(self) -> Result<Arc<Skeleton>> {
        let SkeletonBuilder { name, bones: pending } = self;

        if pending.is_empty() {
            return Err(MarrowError::MalformedData(format!(
                "skeleton '{}' has no bones",
                name
            )));
        }

        let mut by_name = HashMap::with_capacity(pending.len());
        for (index, bone) in pending.iter().enumerate() {
            if by_name
                .insert(bone.name.clone(), BoneId::from_index(index))
                .is_some()
            {
                return Err(MarrowError::MalformedData(format!(
                    "skeleton '{}' declares bone '{}' more than once",
                    name, bone.name
                )));
            }
        }

        let mut bones = Vec::with_capacity(pending.len());
        for (index, bone) in pending.into_iter().enumerate() {
            let parent = match &bone.parent {
                Some(parent_name) => Some(*by_name.get(parent_name).ok_or_else(|| {
                    MarrowError::HierarchyError(format!(
                        "bone '{}' in skeleton '{}' names missing parent '{}'",
                        bone.name, name, parent_name
                    ))
                })?),
                None => None,
            };
            let bind = validate_bind(&name, &bone.name, bone.bind)?;
            if !bone.length.is_finite() || bone.length < 0.0 {
                return Err(MarrowError::MalformedData(format!(
                    "bone '{}' in skeleton '{}' has invalid length {}",
                    bone.name, name, bone.length
                )));
            }
            bones.push(Bone {
                id: BoneId::from_index(index),
                name: bone.name,
                parent,
                bind,
                length: bone.length,
            });
        }

        let mut children = vec![Vec::new(); bones.len()];
        let mut roots = Vec::new();
        for bone in &bones {
            match bone.parent {
                Some(parent) => children[parent.index()].push(bone.id),
                None => roots.push(bone.id),
            }
        }

        // Breadth-first from the roots; anything unreached sits on a cycle
        let mut order = Vec::with_capacity(bones.len());
        let mut queue: VecDeque<BoneId> = roots.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            order.push(id);
            queue.extend(children[id.index()].iter().copied());
        }
        if order.len() != bones.len() {
            let mut reached = vec![false; bones.len()];
            for id in &order {
                reached[id.index()] = true;
            }
            let cyclic: Vec<&str> = bones
                .iter()
                .filter(|bone| !reached[bone.id.index()])
                .map(|bone| bone.name.as_str())
                .collect();
            return Err(MarrowError::HierarchyError(format!(
                "skeleton '{}' has a parent cycle through {:?}",
                name, cyclic
            )));
        }

        let mut bind_absolute = vec![Transform::IDENTITY; bones.len()];
        for id in &order {
            let bone = &bones[id.index()];
            bind_absolute[id.index()] = match bone.parent {
                Some(parent) => bind_absolute[parent.index()].compose(&bone.bind),
                None => bone.bind,
            };
        }
        let mut inverse_bind = Vec::with_capacity(bones.len());
        for (bone, absolute) in bones.iter().zip(&bind_absolute) {
            let inverse = absolute.to_matrix().inverse();
            if !inverse.is_finite() {
                return Err(MarrowError::MalformedData(format!(
                    "bone '{}' in skeleton '{}' has a bind transform that cannot be inverted",
                    bone.name, name
                )));
            }
            inverse_bind.push(inverse);
        }

        log::debug!(
            "Built skeleton '{}' ({} bones, {} roots)",
            name,
            bones.len(),
            roots.len()
        );

        Ok(Arc::new(Skeleton {
            name,
            bones,
            by_name,
            children,
            roots,
            order,
            inverse_bind,
        }))
    }
}

fn validate_bind(skeleton: &str, bone: &str, bind: Transform) -> Result<Transform> {
    let malformed = |what: &str| {
        MarrowError::MalformedData(format!(
            "bone '{}' in skeleton '{}' has an invalid bind {}",
            bone, skeleton, what
        ))
    };
    if !bind.translation.is_finite() {
        return Err(malformed("translation"));
    }
    if !bind.scale.is_finite() || bind.scale.abs().min_element() < 1e-6 {
        return Err(malformed("scale"));
    }
    let length = bind.rotation.length();
    if !length.is_finite() || length < 1e-6 {
        return Err(malformed("rotation"));
    }
    Ok(Transform {
        rotation: bind.rotation.normalize(),
        ..bind
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    fn arm() -> Arc<Skeleton> {
        SkeletonBuilder::new("arm")
            .bone("shoulder", None, Transform::from_translation(Vec3::new(1.0, 0.0, 0.0)))
            .bone("elbow", Some("shoulder"), Transform::from_translation(Vec3::new(0.0, 2.0, 0.0)))
            .bone_with_length("hand", Some("elbow"), Transform::IDENTITY, 0.25)
            .build()
            .unwrap()
    }

    #[test]
    fn builds_hierarchy() {
        let skel = arm();
        assert_eq!(skel.name(), "arm");
        assert_eq!(skel.bone_count(), 3);
        assert_eq!(skel.roots(), &[BoneId(0)]);
        assert_eq!(skel.children(BoneId(0)), &[BoneId(1)]);
        assert_eq!(skel.children(BoneId(2)), &[] as &[BoneId]);
        assert_eq!(skel.children(BoneId(9)), &[] as &[BoneId]);

        let hand = skel.bone_by_name("hand").unwrap();
        assert_eq!(hand.parent(), Some(BoneId(1)));
        assert_eq!(hand.length(), 0.25);
        assert_eq!(skel.bone(BoneId(1)).unwrap().length(), 1.0);
        assert!(skel.bone(BoneId(0)).unwrap().is_root());
    }

    #[test]
    fn missing_bone_lookup_is_reference_error() {
        let skel = arm();
        assert_eq!(skel.find("tail"), None);
        let err = skel.bone_by_name("tail").unwrap_err();
        assert!(matches!(err, MarrowError::ReferenceNotFound { .. }));
        assert!(err.to_string().contains("tail"));
    }

    #[test]
    fn children_declared_before_parents_are_ordered() {
        let skel = SkeletonBuilder::new("rev")
            .bone("leaf", Some("mid"), Transform::IDENTITY)
            .bone("mid", Some("root"), Transform::IDENTITY)
            .bone("root", None, Transform::IDENTITY)
            .build()
            .unwrap();

        let position = |name: &str| {
            let id = skel.find(name).unwrap();
            skel.traversal_order().iter().position(|b| *b == id).unwrap()
        };
        assert!(position("root") < position("mid"));
        assert!(position("mid") < position("leaf"));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = SkeletonBuilder::new("dup")
            .bone("a", None, Transform::IDENTITY)
            .bone("a", None, Transform::IDENTITY)
            .build()
            .unwrap_err();
        assert!(matches!(err, MarrowError::MalformedData(_)));
    }

    #[test]
    fn rejects_missing_parent() {
        let err = SkeletonBuilder::new("orphan")
            .bone("a", Some("ghost"), Transform::IDENTITY)
            .build()
            .unwrap_err();
        assert!(matches!(err, MarrowError::HierarchyError(_)));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn rejects_cycles() {
        let err = SkeletonBuilder::new("loop")
            .bone("root", None, Transform::IDENTITY)
            .bone("a", Some("b"), Transform::IDENTITY)
            .bone("b", Some("a"), Transform::IDENTITY)
            .build()
            .unwrap_err();
        assert!(matches!(err, MarrowError::HierarchyError(_)));

        let err = SkeletonBuilder::new("self")
            .bone("a", Some("a"), Transform::IDENTITY)
            .build()
            .unwrap_err();
        assert!(matches!(err, MarrowError::HierarchyError(_)));
    }

    #[test]
    fn rejects_bad_bind_data() {
        let zero_rotation = Transform::IDENTITY.with_rotation(Quat::from_xyzw(0.0, 0.0, 0.0, 0.0));
        assert!(SkeletonBuilder::new("s")
            .bone("a", None, zero_rotation)
            .build()
            .is_err());
        assert!(SkeletonBuilder::new("s")
            .bone_with_length("a", None, Transform::IDENTITY, -1.0)
            .build()
            .is_err());
        assert!(SkeletonBuilder::new("empty").build().is_err());
    }

    #[test]
    fn rejects_degenerate_bind_scale() {
        let flat = Transform::IDENTITY.with_scale(Vec3::new(1.0, 0.0, 1.0));
        let err = SkeletonBuilder::new("s")
            .bone("root", None, flat)
            .build()
            .unwrap_err();
        assert!(matches!(err, MarrowError::MalformedData(_)));

        let tiny = Transform::IDENTITY.with_scale(Vec3::new(1.0, 1.0, -1e-9));
        assert!(SkeletonBuilder::new("s")
            .bone("root", None, Transform::IDENTITY)
            .bone("leaf", Some("root"), tiny)
            .build()
            .is_err());
    }

    #[test]
    fn skinning_matrices_are_finite() {
        let skel = arm();
        let pose = skel.bind_pose();
        assert!(pose.skinning_matrices(&skel).iter().all(|m| m.is_finite()));
    }

    #[test]
    fn bind_pose_accumulates_translations() {
        let skel = arm();
        let pose = skel.bind_pose();
        let hand = pose.absolute(skel.find("hand").unwrap()).unwrap();
        assert!((hand.translation - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn inverse_bind_cancels_bind_pose() {
        let skel = arm();
        for matrix in skel.bind_pose().skinning_matrices(&skel) {
            assert!(matrix.abs_diff_eq(Mat4::IDENTITY, 1e-5));
        }
    }
}
