//! Immutable animation clips shared across playing instances

use crate::time_fn::TimeFunction;
use crate::track::Track;
use marrow_core::{MarrowError, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// A named bundle of per-bone tracks.
///
/// Clips are only ever handed out frozen behind an `Arc`; there is no
/// mutating API, so any number of instances (on any number of threads) can
/// read the same clip without locking.
#[derive(Debug)]
pub struct AnimationClip {
    name: String,
    tracks: HashMap<String, Track>,
    /// Max over tracks of the last keyframe time, in seconds
    duration: f32,
    preferred_control: Option<TimeFunction>,
}

impl AnimationClip {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Control function instances fall back to when they are given none.
    pub fn preferred_control(&self) -> Option<&TimeFunction> {
        self.preferred_control.as_ref()
    }

    /// Direct lookup; a missing bone is an error here.
    pub fn track(&self, bone: &str) -> Result<&Track> {
        self.tracks
            .get(bone)
            .ok_or_else(|| MarrowError::track_not_found(bone, &self.name))
    }

    /// Lookup used during blending, where a missing track means "no contribution".
    pub fn get_track(&self, bone: &str) -> Option<&Track> {
        self.tracks.get(bone)
    }

    pub fn has_track(&self, bone: &str) -> bool {
        self.tracks.contains_key(bone)
    }

    /// Read-only view of `(bone name, track)` pairs in no particular order.
    pub fn tracks(&self) -> impl Iterator<Item = (&str, &Track)> {
        self.tracks.iter().map(|(bone, track)| (bone.as_str(), track))
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

/// Collects tracks for a clip, then validates and freezes it.
#[derive(Debug)]
pub struct ClipBuilder {
    name: String,
    tracks: HashMap<String, Track>,
    preferred_control: Option<TimeFunction>,
    duplicate: Option<String>,
}

impl ClipBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tracks: HashMap::new(),
            preferred_control: None,
            duplicate: None,
        }
    }

    /// Add the track animating `bone`. A second track for the same bone makes
    /// `build` fail.
    pub fn track(mut self, bone: impl Into<String>, track: Track) -> Self {
        let bone = bone.into();
        if self.tracks.contains_key(&bone) {
            self.duplicate.get_or_insert(bone);
        } else {
            self.tracks.insert(bone, track);
        }
        self
    }

    pub fn preferred_control(mut self, control: TimeFunction) -> Self {
        self.preferred_control = Some(control);
        self
    }

    pub fn build(self) -> Result<Arc<AnimationClip>> {
        if let Some(bone) = self.duplicate {
            return Err(MarrowError::MalformedData(format!(
                "clip '{}' has more than one track for bone '{}'",
                self.name, bone
            )));
        }

        let duration = self
            .tracks
            .values()
            .map(Track::duration)
            .fold(0.0_f32, f32::max);

        // Validate: duration must be positive
        if duration <= 0.0 {
            return Err(MarrowError::MalformedData(format!(
                "clip '{}' has non-positive duration: {}",
                self.name, duration
            )));
        }

        log::debug!(
            "Built clip '{}' ({} tracks, {:.3}s)",
            self.name,
            self.tracks.len(),
            duration
        );

        Ok(Arc::new(AnimationClip {
            name: self.name,
            tracks: self.tracks,
            duration,
            preferred_control: self.preferred_control,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Keyframe;
    use glam::Vec3;

    fn track_until(end: f32) -> Track {
        Track::new(vec![
            Keyframe::at(0.0).with_translation(Vec3::ZERO),
            Keyframe::at(end).with_translation(Vec3::ONE),
        ])
        .unwrap()
    }

    #[test]
    fn duration_is_longest_track() {
        let clip = ClipBuilder::new("walk")
            .track("hip", track_until(1.0))
            .track("knee", track_until(1.5))
            .build()
            .unwrap();
        assert_eq!(clip.name(), "walk");
        assert_eq!(clip.duration(), 1.5);
        assert_eq!(clip.track_count(), 2);
    }

    #[test]
    fn reject_zero_duration() {
        let single = Track::new(vec![Keyframe::at(0.0)]).unwrap();
        let result = ClipBuilder::new("bad").track("hip", single).build();
        assert!(matches!(result, Err(MarrowError::MalformedData(_))));
    }

    #[test]
    fn reject_clip_without_tracks() {
        let result = ClipBuilder::new("empty").build();
        assert!(matches!(result, Err(MarrowError::MalformedData(_))));
    }

    #[test]
    fn reject_duplicate_bone_track() {
        let result = ClipBuilder::new("dup")
            .track("hip", track_until(1.0))
            .track("hip", track_until(2.0))
            .build();
        assert!(matches!(result, Err(MarrowError::MalformedData(_))));
    }

    #[test]
    fn named_lookup_reports_missing_track() {
        let clip = ClipBuilder::new("walk")
            .track("hip", track_until(1.0))
            .build()
            .unwrap();
        assert!(clip.track("hip").is_ok());
        assert!(clip.get_track("head").is_none());
        assert!(matches!(
            clip.track("head"),
            Err(MarrowError::ReferenceNotFound { kind: "track", .. })
        ));
    }

    #[test]
    fn tracks_view_lists_every_bone() {
        let clip = ClipBuilder::new("walk")
            .track("hip", track_until(1.0))
            .track("knee", track_until(1.0))
            .preferred_control(TimeFunction::identity().repeat())
            .build()
            .unwrap();
        let mut bones: Vec<&str> = clip.tracks().map(|(bone, _)| bone).collect();
        bones.sort_unstable();
        assert_eq!(bones, vec!["hip", "knee"]);
        assert!(clip.preferred_control().unwrap().is_looping());
    }
}
