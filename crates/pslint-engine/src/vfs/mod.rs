//! Filesystem access for the analyzer.
//!
//! Script files are read through the [`SourceFs`] trait so the resolver can
//! run against real disks or fully in memory:
//!
//! - **LocalFs**: the real filesystem, paths used as given
//! - **MemoryFs**: an in-memory tree for tests and embedders
//!
//! Path joining and normalization are purely lexical (see [`resolve`]); the
//! analyzer never follows symlinks, so the paths it reports are the paths the
//! scripts wrote.

mod local;
mod memory;
mod path;
mod traits;

pub use local::LocalFs;
pub use memory::MemoryFs;
pub use path::{absolute, normalize, resolve};
pub use traits::SourceFs;
