//! The script-facing function table.
//!
//! Every function returns `Ok(Reply)` for outcomes a script branches on,
//! including recoverable failures, and `Err` only for usage faults that the
//! host runtime should raise.

use crate::config::Config;
use crate::dir_lock::{self, DirLock};
use crate::error::{LfsError, Result};
use crate::file::FileHandle;
use crate::fs::{self, DirIter, HostResolver, PathResolver};
use crate::locks::{self, LockDriver, LockOp, LockRange, LockRegistry};
use crate::reclaim::Scheduler;
use std::sync::Arc;

/// Result of a script call: a value, or `nil, message[, code]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    Success(T),
    Failure { message: String, code: Option<i64> },
}

impl<T> Reply<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            Reply::Success(value) => Some(value),
            Reply::Failure { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Reply::Success(_) => None,
            Reply::Failure { message, .. } => Some(message),
        }
    }

    pub fn code(&self) -> Option<i64> {
        match self {
            Reply::Success(_) => None,
            Reply::Failure { code, .. } => *code,
        }
    }
}

/// Split a result into a script reply, keeping faults as errors.
fn reply<T>(result: Result<T>) -> Result<Reply<T>> {
    match result {
        Ok(value) => Ok(Reply::Success(value)),
        Err(e) if e.is_fault() => Err(e),
        Err(e) => Ok(Reply::Failure {
            message: e.to_string(),
            code: e.code(),
        }),
    }
}

/// A script argument where a file is expected.
#[derive(Debug, Clone, Copy)]
pub enum ScriptValue<'a> {
    File(&'a FileHandle),
    /// Anything else, by its script type name.
    Other(&'a str),
}

fn expect_file<'a>(value: ScriptValue<'a>, function: &'static str) -> Result<&'a FileHandle> {
    match value {
        ScriptValue::File(file) => Ok(file),
        ScriptValue::Other(type_name) => Err(LfsError::BadArgument {
            position: 1,
            function,
            expected: "FILE*",
            got: type_name.to_string(),
        }),
    }
}

/// One script state's view of the filesystem module.
pub struct Lfs {
    config: Config,
    scheduler: Scheduler,
    registry: LockRegistry,
    resolver: Arc<dyn PathResolver>,
}

impl Lfs {
    /// Build against the process-wide scheduler, the configured driver, and the
    /// host filesystem.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let scheduler = Scheduler::init_global(&config).clone();
        let driver = locks::select(config.driver)?;
        let resolver = Arc::new(HostResolver::new()?);
        Ok(Self::with_parts(config, scheduler, driver, resolver))
    }

    pub fn with_parts(
        config: Config,
        scheduler: Scheduler,
        driver: Arc<dyn LockDriver>,
        resolver: Arc<dyn PathResolver>,
    ) -> Self {
        let registry = LockRegistry::new(driver, scheduler.clone());
        Self {
            config,
            scheduler,
            registry,
            resolver,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn registry(&self) -> &LockRegistry {
        &self.registry
    }

    /// `lfs.lock(fh, mode[, start[, len]])`
    pub fn lock(
        &self,
        file: ScriptValue<'_>,
        mode: &str,
        start: Option<i64>,
        len: Option<i64>,
    ) -> Result<Reply<()>> {
        let file = expect_file(file, "lock")?;
        let op = LockOp::parse(mode)?;
        let result = LockRange::new(start.unwrap_or(0), len.unwrap_or(0)).and_then(|range| {
            match op {
                LockOp::Acquire(mode) => self.registry.lock(file, mode, range),
                LockOp::Unlock => self.registry.unlock(file, range),
            }
        });
        reply(result)
    }

    /// `lfs.unlock(fh[, start[, len]])`
    pub fn unlock(
        &self,
        file: ScriptValue<'_>,
        start: Option<i64>,
        len: Option<i64>,
    ) -> Result<Reply<()>> {
        let file = expect_file(file, "unlock")?;
        let result = LockRange::new(start.unwrap_or(0), len.unwrap_or(0))
            .and_then(|range| self.registry.unlock(file, range));
        reply(result)
    }

    /// `lfs.lock_dir(path)`; release with [`DirLock::free`] or by dropping it.
    pub fn lock_dir(&self, path: &str) -> Result<Reply<DirLock>> {
        let result = self
            .resolver
            .resolve(path)
            .and_then(|dir| dir_lock::lock_directory(&dir, &self.config, &self.scheduler));
        reply(result)
    }

    /// `lfs.dir(path)`. Unlike the other functions, every failure is a fault.
    pub fn dir(&self, path: &str) -> Result<DirIter> {
        let dir = self.resolver.resolve(path)?;
        DirIter::open(&dir, path)
    }

    /// `lfs.mkdir(path)`
    pub fn mkdir(&self, path: &str) -> Result<Reply<()>> {
        reply(self.resolver.resolve(path).and_then(|p| fs::mkdir(&p)))
    }

    /// `lfs.rmdir(path)`
    pub fn rmdir(&self, path: &str) -> Result<Reply<()>> {
        reply(self.resolver.resolve(path).and_then(|p| fs::rmdir(&p)))
    }

    /// `lfs.touch(path[, atime[, mtime]])`
    pub fn touch(&self, path: &str, atime: Option<i64>, mtime: Option<i64>) -> Result<Reply<()>> {
        reply(
            self.resolver
                .resolve(path)
                .and_then(|p| fs::touch(&p, atime, mtime)),
        )
    }

    /// `lfs.link(target, linkpath[, symbolic])`
    pub fn link(&self, target: &str, link_path: &str, symbolic: bool) -> Result<Reply<()>> {
        let result = self.resolver.resolve(link_path).and_then(|link_path| {
            if symbolic {
                fs::link(std::path::Path::new(target), &link_path, true)
            } else {
                let target = self.resolver.resolve(target)?;
                fs::link(&target, &link_path, false)
            }
        });
        reply(result)
    }

    /// `lfs.currentdir()`
    pub fn currentdir(&self) -> String {
        self.resolver.current_dir().to_string_lossy().into_owned()
    }

    /// `lfs.chdir(path)`
    pub fn chdir(&self, path: &str) -> Result<Reply<()>> {
        let result = self.resolver.resolve(path).and_then(|dir| {
            fs::check_chdir(&dir, path)?;
            self.resolver.set_current_dir(dir)
        });
        reply(result)
    }

    /// `lfs.setmode(fh, mode)`: there is no text mode, so always `true, "binary"`.
    pub fn setmode(&self, file: ScriptValue<'_>, _mode: &str) -> Result<Reply<&'static str>> {
        expect_file(file, "setmode")?;
        Ok(Reply::Success("binary"))
    }
}

impl std::fmt::Debug for Lfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lfs")
            .field("registry", &self.registry)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_rw, scratch_scheduler};
    use tempfile::TempDir;

    fn lfs_in(dir: &std::path::Path) -> Lfs {
        Lfs::with_parts(
            Config::default(),
            scratch_scheduler(),
            locks::detect(),
            Arc::new(HostResolver::with_cwd(dir)),
        )
    }

    #[test]
    fn test_lock_rejects_non_file_argument() {
        let temp_dir = TempDir::new().unwrap();
        let lfs = lfs_in(temp_dir.path());

        let err = lfs.lock(ScriptValue::Other("number"), "w", None, None).unwrap_err();
        assert!(err.is_fault());
        assert_eq!(
            err.to_string(),
            "bad argument #1 to 'lock' (FILE* expected, got number)"
        );

        let err = lfs.unlock(ScriptValue::Other("nil"), None, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad argument #1 to 'unlock' (FILE* expected, got nil)"
        );
    }

    #[test]
    fn test_lock_mode_is_checked_before_range() {
        let temp_dir = TempDir::new().unwrap();
        let lfs = lfs_in(temp_dir.path());
        let file = FileHandle::from(open_rw(&temp_dir.path().join("f"), 16));

        let err = lfs
            .lock(ScriptValue::File(&file), "q", Some(-1), None)
            .unwrap_err();
        assert_eq!(err.to_string(), "lock: invalid mode");

        let reply = lfs
            .lock(ScriptValue::File(&file), "r", Some(-1), None)
            .unwrap();
        assert_eq!(reply.message(), Some("Invalid argument"));
        assert_eq!(reply.code(), None);
    }

    #[test]
    fn test_lock_unlock_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let lfs = lfs_in(temp_dir.path());
        let file = FileHandle::from(open_rw(&temp_dir.path().join("f"), 16));
        let fh = ScriptValue::File(&file);

        assert!(lfs.lock(fh, "w", None, None).unwrap().is_success());
        assert_eq!(lfs.registry().len(), 1);

        // "u" through lock() is the same as unlock().
        assert!(lfs.lock(fh, "u", None, None).unwrap().is_success());
        assert!(lfs.registry().is_empty());

        let reply = lfs.unlock(fh, None, None).unwrap();
        assert!(!reply.is_success());
        assert!(reply.message().is_some());
    }

    #[test]
    fn test_lock_dir_reports_file_exists() {
        let temp_dir = TempDir::new().unwrap();
        let lfs = lfs_in(temp_dir.path());
        std::fs::create_dir(temp_dir.path().join("guarded")).unwrap();

        let held = lfs.lock_dir("guarded").unwrap().success().unwrap();
        let reply = lfs.lock_dir("guarded").unwrap();
        assert!(!reply.is_success());
        assert_eq!(reply.message(), Some("File exists"));
        assert_eq!(reply.code(), Some(17));

        held.free();
        assert!(lfs.lock_dir("guarded").unwrap().is_success());
    }

    #[test]
    fn test_paths_follow_chdir() {
        let temp_dir = TempDir::new().unwrap();
        let lfs = lfs_in(temp_dir.path());

        assert!(lfs.mkdir("work").unwrap().is_success());
        assert!(lfs.chdir("work").unwrap().is_success());
        assert_eq!(
            std::path::PathBuf::from(lfs.currentdir()),
            temp_dir.path().join("work")
        );

        assert!(lfs.mkdir("inner").unwrap().is_success());
        assert!(temp_dir.path().join("work").join("inner").is_dir());

        let mut iter = lfs.dir(".").unwrap();
        let mut names = Vec::new();
        while let Some(name) = iter.next().unwrap() {
            names.push(name);
        }
        assert_eq!(names, [".", "..", "inner"]);

        let reply = lfs.chdir("missing").unwrap();
        assert_eq!(
            reply.message(),
            Some("Unable to change working directory to 'missing'\nNo such file or directory")
        );
        assert!(lfs.rmdir("inner").unwrap().is_success());
    }

    #[test]
    fn test_dir_on_missing_path_is_fault() {
        let temp_dir = TempDir::new().unwrap();
        let lfs = lfs_in(temp_dir.path());
        let err = lfs.dir("nowhere").unwrap_err();
        assert!(err.is_fault());
        assert_eq!(err.to_string(), "cannot open nowhere: No such file or directory");
    }

    #[test]
    fn test_touch_and_link_replies() {
        let temp_dir = TempDir::new().unwrap();
        let lfs = lfs_in(temp_dir.path());
        std::fs::write(temp_dir.path().join("t"), b"x").unwrap();

        assert!(lfs.touch("t", Some(10), None).unwrap().is_success());
        assert_eq!(lfs.touch("absent", None, None).unwrap().code(), Some(2));

        assert!(lfs.link("t", "t2", false).unwrap().is_success());
        assert_eq!(lfs.link("t", "t2", false).unwrap().code(), Some(17));
    }

    #[test]
    #[serial_test::serial]
    fn test_new_uses_global_scheduler() {
        let lfs = Lfs::new(Config::default()).unwrap();
        assert!(lfs.scheduler().ptr_eq(Scheduler::global()));

        let bad = Config {
            sentinel_name: String::new(),
            ..Config::default()
        };
        assert!(Lfs::new(bad).is_err());
    }

    #[test]
    fn test_setmode_is_always_binary() {
        let temp_dir = TempDir::new().unwrap();
        let lfs = lfs_in(temp_dir.path());
        let file = FileHandle::from(open_rw(&temp_dir.path().join("f"), 0));

        let reply = lfs.setmode(ScriptValue::File(&file), "text").unwrap();
        assert_eq!(reply, Reply::Success("binary"));
        assert!(lfs.setmode(ScriptValue::Other("string"), "binary").is_err());
    }
}
