//! Skeletal animation runtime for Marrow
//!
//! Evaluates time-varying animation clips against a bone hierarchy and
//! produces a blended per-bone pose each frame:
//! - **Data**: `Track`s of keyframes grouped into shared, immutable `AnimationClip`s,
//!   and a `Skeleton` of named bones with bind transforms
//! - **Playback**: `AnimationInstance` advances a clock over one clip, remapped by a
//!   composable `TimeFunction` and weighted by another
//! - **Evaluation**: `Blender` merges all active instances per bone and composes the
//!   result down the hierarchy into a `Pose`; `Mixer` owns instances and layers
//!   one-shots over looping playback

pub mod blend;
pub mod clip;
pub mod config;
pub mod instance;
pub mod mixer;
pub mod pose;
pub mod skeleton;
pub mod time_fn;
pub mod track;

pub use blend::{BlendConfig, Blender, ZeroWeightFallback};
pub use clip::{AnimationClip, ClipBuilder};
pub use config::{load_config_from_file, load_config_from_str, AnimationConfig};
pub use instance::{AnimationCallback, AnimationInstance, PlaybackState};
pub use mixer::{InstanceKey, Mixer, MixerConfig};
pub use pose::Pose;
pub use skeleton::{Bone, Skeleton, SkeletonBuilder};
pub use time_fn::{LoopBehavior, Modifier, TimeFunction};
pub use track::{Keyframe, Track};
