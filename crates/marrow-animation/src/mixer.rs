//! Instance ownership, timed stops and layered playback over one skeleton

use crate::blend::Blender;
use crate::config::AnimationConfig;
use crate::instance::AnimationInstance;
use crate::pose::Pose;
use crate::skeleton::Skeleton;
use crate::time_fn::TimeFunction;
use marrow_core::Result;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::sync::Arc;

slotmap::new_key_type! {
    /// Handle to an instance owned by a `Mixer`.
    pub struct InstanceKey;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Global multiplier applied to every `update` delta
    pub speed: f32,
    /// Fade length in seconds used by stops that don't give one
    pub default_fade_out: f32,
    /// Control function given to instances that have none of their own
    /// and whose clip has no preferred one
    pub default_control: Option<TimeFunction>,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            default_fade_out: 0.25,
            default_control: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    Cycling,
    OneShot,
}

#[derive(Debug)]
struct Slot {
    instance: AnimationInstance,
    layer: Layer,
    stopping: bool,
}

/// Drives a set of instances against one skeleton.
///
/// Cycling instances are blended normally. One-shot instances are layered on
/// top and removed once they end. Stops fade the instance's weight out over
/// a given time and remove it when it no longer contributes.
#[derive(Debug)]
pub struct Mixer {
    skeleton: Arc<Skeleton>,
    blender: Blender,
    config: MixerConfig,
    instances: SlotMap<InstanceKey, Slot>,
    /// Keys in insertion order; blending follows it
    order: Vec<InstanceKey>,
    pose: Pose,
}

impl Mixer {
    pub fn new(skeleton: Arc<Skeleton>) -> Self {
        let pose = skeleton.bind_pose();
        Self {
            skeleton,
            blender: Blender::default(),
            config: MixerConfig::default(),
            instances: SlotMap::with_key(),
            order: Vec::new(),
            pose,
        }
    }

    pub fn with_config(skeleton: Arc<Skeleton>, config: AnimationConfig) -> Result<Self> {
        config.validate()?;
        let mut mixer = Self::new(skeleton);
        mixer.blender = Blender::new(config.blend);
        mixer.config = config.mixer;
        Ok(mixer)
    }

    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    /// Pose computed by the most recent `update`, bind pose before the first.
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Add an instance to the normally blended set.
    pub fn play(&mut self, instance: AnimationInstance) -> InstanceKey {
        self.insert(instance, Layer::Cycling)
    }

    /// Add an instance layered over everything else until it ends.
    pub fn oneshot(&mut self, instance: AnimationInstance) -> InstanceKey {
        self.insert(instance, Layer::OneShot)
    }

    fn insert(&mut self, mut instance: AnimationInstance, layer: Layer) -> InstanceKey {
        if !instance.has_own_control() && instance.clip().preferred_control().is_none() {
            if let Some(control) = &self.config.default_control {
                instance.set_control_fn(Some(control.clone()));
            }
        }
        log::debug!("Mixer plays '{}' as {:?}", instance.name(), layer);
        let key = self.instances.insert(Slot {
            instance,
            layer,
            stopping: false,
        });
        self.order.push(key);
        key
    }

    /// Fade `key` out over `fade_out` seconds (the configured default when
    /// `None`) and remove it afterwards. Returns false for unknown keys.
    ///
    /// A zero fade, or an instance that is paused or ended and so would never
    /// progress through its fade, is removed immediately.
    pub fn stop(&mut self, key: InstanceKey, fade_out: Option<f32>) -> bool {
        let fade_out = fade_out.unwrap_or(self.config.default_fade_out);
        let Some(slot) = self.instances.get_mut(key) else {
            return false;
        };

        let instance = &mut slot.instance;
        if fade_out <= 0.0 || instance.is_paused() || instance.has_ended() {
            self.remove(key);
            return true;
        }

        let start = instance.time_percent_raw();
        let end = start + fade_out / instance.duration();
        let faded = instance.weight_fn().clone().fade_out_range(start, end);
        instance.set_weight_fn(Some(faded));
        slot.stopping = true;
        log::debug!("Mixer fades out '{}' over {}s", instance.name(), fade_out);
        true
    }

    /// Stop every instance of the clip named `name`. Returns how many were stopped.
    pub fn stop_by_name(&mut self, name: &str, fade_out: Option<f32>) -> usize {
        self.keys_named(name)
            .into_iter()
            .filter(|key| self.stop(*key, fade_out))
            .count()
    }

    pub fn stop_all(&mut self, fade_out: Option<f32>) {
        for key in self.order.clone() {
            self.stop(key, fade_out);
        }
    }

    /// Pause every instance of `name`. Returns false if there is none.
    pub fn pause(&mut self, name: &str) -> bool {
        self.for_each_named(name, AnimationInstance::pause) > 0
    }

    pub fn resume(&mut self, name: &str) -> bool {
        self.for_each_named(name, AnimationInstance::resume) > 0
    }

    /// Whether any instance of `name` is paused.
    pub fn is_paused(&self, name: &str) -> bool {
        self.instances
            .values()
            .any(|slot| slot.instance.name() == name && slot.instance.is_paused())
    }

    pub fn pause_all(&mut self) {
        for slot in self.instances.values_mut() {
            slot.instance.pause();
        }
    }

    pub fn resume_all(&mut self) {
        for slot in self.instances.values_mut() {
            slot.instance.resume();
        }
    }

    pub fn speed(&self) -> f32 {
        self.config.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.config.speed = speed;
    }

    /// Speed of the first instance of `name`.
    pub fn speed_of(&self, name: &str) -> Option<f32> {
        self.order
            .iter()
            .filter_map(|key| self.instances.get(*key))
            .find(|slot| slot.instance.name() == name)
            .map(|slot| slot.instance.speed())
    }

    /// Set the speed of every instance of `name`. Returns how many changed.
    pub fn set_speed_of(&mut self, name: &str, speed: f32) -> usize {
        self.for_each_named(name, |instance| instance.set_speed(speed))
    }

    pub fn instance(&self, key: InstanceKey) -> Option<&AnimationInstance> {
        self.instances.get(key).map(|slot| &slot.instance)
    }

    pub fn instance_mut(&mut self, key: InstanceKey) -> Option<&mut AnimationInstance> {
        self.instances.get_mut(key).map(|slot| &mut slot.instance)
    }

    pub fn contains(&self, key: InstanceKey) -> bool {
        self.instances.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Advance every instance and blend the new pose.
    ///
    /// Faded-out stops and one-shots that ended on an earlier frame are
    /// dropped first, so an ending one-shot still shows on its final frame.
    pub fn update(&mut self, delta_time: f32) -> &Pose {
        let epsilon = self.blender.config().weight_epsilon;
        let finished: Vec<InstanceKey> = self
            .order
            .iter()
            .copied()
            .filter(|key| match self.instances.get(*key) {
                Some(slot) => {
                    let weight = slot.instance.weight();
                    let faded = !weight.is_finite() || weight <= epsilon;
                    (slot.stopping && faded)
                        || (slot.layer == Layer::OneShot && slot.instance.has_ended())
                }
                None => true,
            })
            .collect();
        for key in finished {
            self.remove(key);
        }

        let dt = delta_time * self.config.speed;
        for key in &self.order {
            if let Some(slot) = self.instances.get_mut(*key) {
                slot.instance.update(dt);
            }
        }

        let mut cycling = Vec::new();
        let mut oneshots = Vec::new();
        for slot in self.order.iter().filter_map(|key| self.instances.get(*key)) {
            match slot.layer {
                Layer::Cycling => cycling.push(&slot.instance),
                Layer::OneShot => oneshots.push(&slot.instance),
            }
        }
        self.pose = self
            .blender
            .evaluate_layered(&self.skeleton, &cycling, &oneshots);
        &self.pose
    }

    fn remove(&mut self, key: InstanceKey) {
        if let Some(slot) = self.instances.remove(key) {
            log::debug!("Mixer removed '{}'", slot.instance.name());
        }
        self.order.retain(|k| *k != key);
    }

    fn keys_named(&self, name: &str) -> Vec<InstanceKey> {
        self.order
            .iter()
            .copied()
            .filter(|key| {
                self.instances
                    .get(*key)
                    .is_some_and(|slot| slot.instance.name() == name)
            })
            .collect()
    }

    fn for_each_named(&mut self, name: &str, mut f: impl FnMut(&mut AnimationInstance)) -> usize {
        let mut count = 0;
        for slot in self.instances.values_mut() {
            if slot.instance.name() == name {
                f(&mut slot.instance);
                count += 1;
            }
        }
        count
    }
}
