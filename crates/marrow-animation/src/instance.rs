//! Mutable per-use playback state over a shared clip

use crate::clip::AnimationClip;
use crate::time_fn::TimeFunction;
use crate::track::Keyframe;
use marrow_core::{CallbackId, Result};
use std::fmt;
use std::sync::Arc;

/// Control function used when neither the instance nor its clip provides one.
static IDENTITY_CONTROL: TimeFunction = TimeFunction::Linear { slope: 1.0 };

/// Weight function used when the instance is given none.
static FULL_WEIGHT: TimeFunction = TimeFunction::Constant { value: 1.0 };

/// Invoked synchronously from `AnimationInstance::update`, in registration order.
pub type AnimationCallback = Box<dyn FnMut(&AnimationInstance) + Send>;

/// Coarse playback state derived from the pause and end flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    /// A non-looping control function ran past the end of the clip.
    Ended,
}

/// One playback of an `AnimationClip`.
///
/// Raw time advances by `dt * speed` on every unpaused update. The clip is
/// sampled at the *effective* time, which is the control function applied to
/// raw time normalized by the clip duration, scaled back to seconds.
pub struct AnimationInstance {
    clip: Arc<AnimationClip>,
    /// Elapsed playback time in seconds, before the control function
    raw_time: f32,
    speed: f32,
    paused: bool,
    ended: bool,
    control: Option<TimeFunction>,
    weight: Option<TimeFunction>,
    update_callbacks: Vec<(CallbackId, AnimationCallback)>,
    end_callbacks: Vec<(CallbackId, AnimationCallback)>,
}

impl AnimationInstance {
    pub fn new(clip: Arc<AnimationClip>) -> Self {
        Self {
            clip,
            raw_time: 0.0,
            speed: 1.0,
            paused: false,
            ended: false,
            control: None,
            weight: None,
            update_callbacks: Vec::new(),
            end_callbacks: Vec::new(),
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_control(mut self, control: TimeFunction) -> Self {
        self.control = Some(control);
        self
    }

    pub fn with_weight(mut self, weight: TimeFunction) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn clip(&self) -> &Arc<AnimationClip> {
        &self.clip
    }

    pub fn name(&self) -> &str {
        self.clip.name()
    }

    pub fn duration(&self) -> f32 {
        self.clip.duration()
    }

    /// Advance playback by `delta_time` seconds.
    ///
    /// Paused instances ignore the call entirely. An ended instance keeps its
    /// time but still runs update callbacks, unless its control function has
    /// since become a looping one, in which case it resumes playing.
    pub fn update(&mut self, delta_time: f32) {
        if self.paused {
            return;
        }

        let looping = self.control_fn().is_looping();
        if self.ended && looping {
            log::trace!("Instance of '{}' resumes under a looping control", self.name());
            self.ended = false;
        }

        let mut just_ended = false;
        if !self.ended {
            self.raw_time += delta_time * self.speed;
            // Fades on a control scale the clock toward 0, so the end is read
            // from the unfaded function
            let progress = self.control_fn().without_fades().value(self.time_percent_raw());
            if !looping && progress >= 1.0 {
                self.ended = true;
                just_ended = true;
            }
        }

        let mut callbacks = std::mem::take(&mut self.update_callbacks);
        for (_, callback) in callbacks.iter_mut() {
            callback(self);
        }
        self.update_callbacks = callbacks;

        if just_ended {
            log::debug!("Instance of '{}' reached its end", self.name());
            let mut callbacks = std::mem::take(&mut self.end_callbacks);
            for (_, callback) in callbacks.iter_mut() {
                callback(self);
            }
            self.end_callbacks = callbacks;
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    pub fn state(&self) -> PlaybackState {
        if self.ended {
            PlaybackState::Ended
        } else if self.paused {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        }
    }

    /// Rewind to the start and leave the ended state.
    pub fn restart(&mut self) {
        self.raw_time = 0.0;
        self.ended = false;
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    /// Effective control function: the instance's own, else the clip's
    /// preferred one, else identity.
    pub fn control_fn(&self) -> &TimeFunction {
        self.control
            .as_ref()
            .or_else(|| self.clip.preferred_control())
            .unwrap_or(&IDENTITY_CONTROL)
    }

    /// Whether a control function was set on this instance itself.
    pub fn has_own_control(&self) -> bool {
        self.control.is_some()
    }

    /// Replace the control function; `None` restores the default.
    pub fn set_control_fn(&mut self, control: Option<TimeFunction>) {
        self.control = control;
    }

    pub fn weight_fn(&self) -> &TimeFunction {
        self.weight.as_ref().unwrap_or(&FULL_WEIGHT)
    }

    /// Replace the weight function; `None` restores constant full weight.
    pub fn set_weight_fn(&mut self, weight: Option<TimeFunction>) {
        self.weight = weight;
    }

    /// Raw time as a fraction of the clip duration.
    pub fn time_percent_raw(&self) -> f32 {
        self.raw_time / self.duration()
    }

    /// Raw time in seconds.
    pub fn time_absolute_raw(&self) -> f32 {
        self.raw_time
    }

    /// Effective time as a fraction of the clip duration.
    pub fn time_percent(&self) -> f32 {
        self.control_fn().value(self.time_percent_raw())
    }

    /// Effective time in seconds; this is where the clip gets sampled.
    pub fn time_absolute(&self) -> f32 {
        self.time_percent() * self.duration()
    }

    /// Current blend weight: the weight function at raw normalized time.
    pub fn weight(&self) -> f32 {
        self.weight_fn().value(self.time_percent_raw())
    }

    /// This instance's local transform for `bone`, or `None` when the clip has
    /// no track for it (no contribution, as opposed to an identity transform).
    pub fn local_transform(&self, bone: &str) -> Option<Keyframe> {
        self.clip
            .get_track(bone)
            .map(|track| track.sample(self.time_absolute()))
    }

    /// Like `local_transform`, but a missing track is an error.
    pub fn sample_bone(&self, bone: &str) -> Result<Keyframe> {
        Ok(self.clip.track(bone)?.sample(self.time_absolute()))
    }

    /// Register a callback run on every unpaused update.
    pub fn add_update_callback<F>(&mut self, callback: F) -> CallbackId
    where
        F: FnMut(&AnimationInstance) + Send + 'static,
    {
        let id = CallbackId::new();
        self.update_callbacks.push((id, Box::new(callback)));
        id
    }

    /// Register a callback run once each time playback reaches the end.
    pub fn add_end_callback<F>(&mut self, callback: F) -> CallbackId
    where
        F: FnMut(&AnimationInstance) + Send + 'static,
    {
        let id = CallbackId::new();
        self.end_callbacks.push((id, Box::new(callback)));
        id
    }

    /// Deregister an update or end callback. Returns whether it was found.
    pub fn remove_callback(&mut self, id: CallbackId) -> bool {
        let before = self.update_callbacks.len() + self.end_callbacks.len();
        self.update_callbacks.retain(|(cb_id, _)| *cb_id != id);
        self.end_callbacks.retain(|(cb_id, _)| *cb_id != id);
        before != self.update_callbacks.len() + self.end_callbacks.len()
    }
}

impl fmt::Debug for AnimationInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationInstance")
            .field("clip", &self.clip.name())
            .field("raw_time", &self.raw_time)
            .field("speed", &self.speed)
            .field("state", &self.state())
            .field("control", &self.control)
            .field("weight", &self.weight)
            .field("update_callbacks", &self.update_callbacks.len())
            .field("end_callbacks", &self.end_callbacks.len())
            .finish()
    }
}
