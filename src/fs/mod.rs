//! Filesystem functions for lfs-shim.
//!
//! Everything here works on host paths produced by a [`PathResolver`]; the
//! script-facing wrappers live in [`crate::lfs`].

mod dir;
mod ops;
mod resolve;

pub use dir::DirIter;
pub use ops::{check_chdir, link, mkdir, rmdir, touch};
pub use resolve::{HostResolver, PathResolver};
