//! Filesystem collaborators of the codec.
//!
//! This module handles:
//! - Enumerating candidate files (no link following, exclusion pruning)
//! - Collision-free destination names
//! - Capturing and restoring file attributes
//! - Disposing of sources and containers

mod attribs;
mod dispose;
mod naming;
mod walker;

pub use attribs::{AttribStore, AttribUpdate, FileAttribs, NativeAttribs};
pub use dispose::{Disposal, FsDisposal};
pub use naming::{next_collision_free, with_suffix_n};
pub use walker::{iter_targets, Exclusions, PathTask, TaskKind};
