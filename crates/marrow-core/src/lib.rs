//! Marrow Core - Foundational types for the Marrow animation runtime
//!
//! This crate provides the core types that the animation crate builds on:
//! - `BoneId`, `CallbackId` - Stable identifiers
//! - `Transform` - Rigid translation/rotation/scale with composition
//! - Error types and Result alias

mod error;
mod id;
mod types;

pub use error::{MarrowError, Result};
pub use id::{BoneId, CallbackId};
pub use types::{slerp_shortest, Transform};

pub use glam::{Mat4, Quat, Vec3};
