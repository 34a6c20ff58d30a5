//! Playback and pose evaluation tests
//!
//! Tests for:
//! - TimeFunction determinism and fade-in shape
//! - Track clamping, exact-keyframe sampling and shortest-path rotation
//! - Looping walk cycle driven through an AnimationInstance
//! - End callbacks firing once per crossing
//! - Symmetric blending and hierarchical composition of a 3-bone skeleton

use std::f32::consts::FRAC_PI_2;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use glam::{Quat, Vec3};

use marrow_animation::{
    AnimationClip, AnimationInstance, Blender, ClipBuilder, Keyframe, Mixer, SkeletonBuilder,
    TimeFunction, Track,
};
use marrow_core::Transform;

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn approx_vec(a: Vec3, b: Vec3) -> bool {
    (a - b).length() < EPSILON
}

fn walk_clip() -> Arc<AnimationClip> {
    let hip = Track::new(vec![
        Keyframe::at(0.0).with_translation(Vec3::ZERO),
        Keyframe::at(1.0).with_translation(Vec3::new(0.0, 0.0, 1.0)),
    ])
    .unwrap();
    ClipBuilder::new("walk").track("hip", hip).build().unwrap()
}

// ============================================================================
// TimeFunction
// ============================================================================

#[test]
fn time_function_is_deterministic() {
    let f = TimeFunction::identity()
        .cycle()
        .fade_in(0.3)
        .fade_out(0.2);
    for i in 0..50 {
        let t = i as f32 * 0.137;
        assert_eq!(f.value(t).to_bits(), f.value(t).to_bits());
    }
}

#[test]
fn fade_in_ramps_and_clamps() {
    let d = 0.4;
    let f = TimeFunction::constant(1.0).fade_in(d);
    assert!(approx(f.value(0.0), 0.0));
    assert!(approx(f.value(d / 2.0), 0.5));
    assert!(approx(f.value(d), 1.0));
    assert!(approx(f.value(2.0 * d), 1.0));
}

// ============================================================================
// Track sampling
// ============================================================================

#[test]
fn track_clamps_outside_its_range() {
    let track = Track::new(vec![
        Keyframe::at(0.5).with_translation(Vec3::X),
        Keyframe::at(1.5).with_translation(Vec3::Y),
    ])
    .unwrap();
    assert_eq!(track.sample(0.0).translation, Some(Vec3::X));
    assert_eq!(track.sample(9.0).translation, Some(Vec3::Y));
}

#[test]
fn track_exact_keyframe_is_exact() {
    let rotation = Quat::from_rotation_x(0.3);
    let track = Track::new(vec![
        Keyframe::at(0.0).with_rotation(Quat::IDENTITY),
        Keyframe::at(1.0).with_rotation(rotation),
        Keyframe::at(2.0).with_rotation(Quat::IDENTITY),
    ])
    .unwrap();
    let stored = track.keyframes()[1].rotation;
    assert_eq!(track.sample(1.0).rotation, stored);
    assert!(stored.unwrap().dot(rotation) > 1.0 - EPSILON);
}

#[test]
fn shortest_path_ignores_quaternion_sign() {
    let start = Quat::IDENTITY;
    let end = Quat::from_rotation_y(FRAC_PI_2);
    let same = Track::new(vec![
        Keyframe::at(0.0).with_rotation(start),
        Keyframe::at(1.0).with_rotation(end),
    ])
    .unwrap();
    let flipped = Track::new(vec![
        Keyframe::at(0.0).with_rotation(start),
        Keyframe::at(1.0).with_rotation(-end),
    ])
    .unwrap();

    let a = same.sample(0.5).rotation.unwrap();
    let b = flipped.sample(0.5).rotation.unwrap();
    assert!(approx(b.length(), 1.0));
    assert!(a.dot(b).abs() > 1.0 - 1e-4);
}

// ============================================================================
// Instance playback
// ============================================================================

#[test]
fn walk_cycle_wraps_under_repeat() {
    let mut walk =
        AnimationInstance::new(walk_clip()).with_control(TimeFunction::identity().repeat());

    walk.update(0.5);
    assert!(approx(walk.time_absolute(), 0.5));
    let hip = walk.local_transform("hip").unwrap();
    assert!(approx_vec(hip.translation.unwrap(), Vec3::new(0.0, 0.0, 0.5)));

    walk.update(0.7);
    assert!(approx(walk.time_absolute(), 0.2));
    let hip = walk.local_transform("hip").unwrap();
    assert!(approx_vec(hip.translation.unwrap(), Vec3::new(0.0, 0.0, 0.2)));
}

#[test]
fn end_callback_fires_once_when_crossing_duration() {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();

    let mut inst = AnimationInstance::new(walk_clip());
    inst.add_end_callback(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    for _ in 0..9 {
        inst.update(0.1);
    }
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    for _ in 0..10 {
        inst.update(0.1);
    }
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(inst.has_ended());
}

// ============================================================================
// Blending and pose evaluation
// ============================================================================

#[test]
fn symmetric_blend_returns_shared_transform() {
    let key = Keyframe::at(0.0)
        .with_translation(Vec3::new(0.0, 0.0, 0.5))
        .with_rotation(Quat::from_rotation_z(0.4));
    let track = Track::new(vec![key, Keyframe { time: 1.0, ..key }]).unwrap();
    let clip = ClipBuilder::new("hold").track("hip", track).build().unwrap();
    let a = AnimationInstance::new(clip.clone()).with_weight(TimeFunction::constant(0.5));
    let b = AnimationInstance::new(clip).with_weight(TimeFunction::constant(0.5));

    let skel = SkeletonBuilder::new("s")
        .bone("hip", None, Transform::IDENTITY)
        .build()
        .unwrap();
    let pose = Blender::default().evaluate(&skel, &[&a, &b]);
    let hip = pose.absolute_by_name(&skel, "hip").unwrap();
    assert!(hip.abs_diff_eq(&key.apply_to(&Transform::IDENTITY), EPSILON));
}

#[test]
fn three_bone_pose_composes_parent_first() {
    let root_local = Transform::new(
        Vec3::new(0.0, 1.0, 0.0),
        Quat::from_rotation_z(FRAC_PI_2),
        Vec3::ONE,
    );
    let a_local = Transform::from_translation(Vec3::new(1.0, 0.0, 0.0));
    let b_local = Transform::new(
        Vec3::new(0.0, 0.0, 2.0),
        Quat::from_rotation_x(0.5),
        Vec3::ONE,
    );

    let constant_track = |t: Transform| {
        let key = Keyframe::at(0.0)
            .with_translation(t.translation)
            .with_rotation(t.rotation)
            .with_scale(t.scale);
        Track::new(vec![key, Keyframe { time: 1.0, ..key }]).unwrap()
    };
    let clip = ClipBuilder::new("pose")
        .track("root", constant_track(root_local))
        .track("childA", constant_track(a_local))
        .track("childB", constant_track(b_local))
        .build()
        .unwrap();

    let skel = SkeletonBuilder::new("tri")
        .bone("root", None, Transform::IDENTITY)
        .bone("childA", Some("root"), Transform::IDENTITY)
        .bone("childB", Some("root"), Transform::IDENTITY)
        .build()
        .unwrap();

    let mut inst = AnimationInstance::new(clip);
    inst.update(0.3);
    let pose = Blender::default().evaluate(&skel, &[&inst]);

    let root = pose.absolute_by_name(&skel, "root").unwrap();
    let child_a = pose.absolute_by_name(&skel, "childA").unwrap();
    let child_b = pose.absolute_by_name(&skel, "childB").unwrap();

    assert!(root.abs_diff_eq(&root_local, EPSILON));
    assert!(child_a.abs_diff_eq(&root_local.compose(&a_local), EPSILON));
    assert!(child_b.abs_diff_eq(&root_local.compose(&b_local), EPSILON));
    // Root rotates +X into +Y, so childA lands one unit above the root
    assert!(approx_vec(child_a.translation, Vec3::new(0.0, 2.0, 0.0)));
}

#[test]
fn mixer_drives_walk_cycle_into_pose() {
    let skel = SkeletonBuilder::new("biped")
        .bone("hip", None, Transform::IDENTITY)
        .bone("knee", Some("hip"), Transform::from_translation(Vec3::new(0.0, -1.0, 0.0)))
        .build()
        .unwrap();
    let mut mixer = Mixer::new(skel);
    mixer.play(AnimationInstance::new(walk_clip()).with_control(TimeFunction::identity().repeat()));

    mixer.update(0.5);
    mixer.update(0.7);
    let knee = mixer
        .pose()
        .absolute_by_name(mixer.skeleton(), "knee")
        .unwrap();
    assert!(approx_vec(knee.translation, Vec3::new(0.0, -1.0, 0.2)));
}
