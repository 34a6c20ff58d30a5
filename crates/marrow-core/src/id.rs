//! Stable identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for generating unique callback IDs
static NEXT_CALLBACK_ID: AtomicU64 = AtomicU64::new(1);

/// Index of a bone inside its skeleton.
///
/// Bones live in a flat array owned by the skeleton; a `BoneId` is a position
/// in that array. Parent links are stored as `BoneId`s, so the hierarchy never
/// holds references into itself.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoneId(pub u32);

impl BoneId {
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// Position in the owning skeleton's bone array
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for BoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoneId({})", self.0)
    }
}

impl fmt::Display for BoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle returned when registering an update or end callback.
///
/// Unique process-wide, so a handle from one instance never deregisters a
/// callback on another.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct CallbackId(u64);

impl CallbackId {
    /// Create a new unique CallbackId
    pub fn new() -> Self {
        Self(NEXT_CALLBACK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw u64 value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for CallbackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallbackId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_ids_are_unique() {
        let id1 = CallbackId::new();
        let id2 = CallbackId::new();
        assert_ne!(id1, id2);
        assert!(id2.raw() > id1.raw());
    }

    #[test]
    fn bone_id_round_trips_index() {
        let id = BoneId::from_index(7);
        assert_eq!(id.index(), 7);
        assert_eq!(format!("{:?}", id), "BoneId(7)");
    }
}
