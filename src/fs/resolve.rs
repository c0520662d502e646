//! Mapping script paths onto host paths.

use crate::error::{LfsError, Result};
use crate::reclaim::lock_unpoisoned;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

/// Turns script-supplied path strings into host paths.
///
/// Sandboxing belongs here: an embedder that confines scripts to a subtree
/// supplies its own resolver and every filesystem function goes through it.
pub trait PathResolver: Send + Sync {
    /// Host path for `path`, relative paths taken from the working directory.
    fn resolve(&self, path: &str) -> Result<PathBuf>;

    /// The script-visible working directory.
    fn current_dir(&self) -> PathBuf;

    /// Replace the working directory. `dir` is already resolved and checked.
    fn set_current_dir(&self, dir: PathBuf) -> Result<()>;
}

/// Resolver over the host filesystem with its own working directory.
///
/// `chdir` never touches the process working directory, so several script
/// states can each have their own.
#[derive(Debug)]
pub struct HostResolver {
    cwd: Mutex<PathBuf>,
}

impl HostResolver {
    /// Start in the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| LfsError::Io {
            message: format!("cannot determine working directory: {}", e),
            code: e.raw_os_error().map(i64::from),
        })?;
        Ok(Self::with_cwd(cwd))
    }

    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Mutex::new(normalize(&cwd.into())),
        }
    }
}

impl PathResolver for HostResolver {
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        if path.contains('\0') {
            return Err(LfsError::InvalidArgument);
        }
        let path = Path::new(path);
        if path.is_absolute() {
            Ok(normalize(path))
        } else {
            Ok(normalize(&lock_unpoisoned(&self.cwd).join(path)))
        }
    }

    fn current_dir(&self) -> PathBuf {
        lock_unpoisoned(&self.cwd).clone()
    }

    fn set_current_dir(&self, dir: PathBuf) -> Result<()> {
        *lock_unpoisoned(&self.cwd) = normalize(&dir);
        Ok(())
    }
}

/// Lexically drop `.` components and fold `..` into its parent.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_dots() {
        let base = std::env::temp_dir();
        assert_eq!(normalize(&base.join("a/./b/../c")), base.join("a").join("c"));
        assert_eq!(normalize(Path::new("x/../../y")), Path::new("../y"));
        assert_eq!(normalize(Path::new("../../z")), Path::new("../../z"));
    }

    #[test]
    fn test_relative_paths_follow_virtual_cwd() {
        let base = std::env::temp_dir();
        let resolver = HostResolver::with_cwd(&base);

        assert_eq!(resolver.resolve("sub/file").unwrap(), base.join("sub").join("file"));

        resolver.set_current_dir(base.join("sub")).unwrap();
        assert_eq!(resolver.current_dir(), base.join("sub"));
        assert_eq!(resolver.resolve("..").unwrap(), base);
        assert_eq!(resolver.resolve(base.to_str().unwrap()).unwrap(), base);
    }

    #[test]
    fn test_nul_byte_is_invalid() {
        let resolver = HostResolver::with_cwd(std::env::temp_dir());
        assert!(resolver.resolve("bad\0name").is_err());
    }
}
