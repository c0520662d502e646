//! The open-file abstraction consumed by the lock drivers.
//!
//! Host runtimes open files in different ways, so an open file exposes whichever
//! accessors it has: a native handle or descriptor, a [`File`] channel, and a
//! seekable position. Drivers report `NotSupported` when the accessor they need
//! is missing.

use crate::reclaim::Owner;
use std::fmt;
use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Raw OS-level identity of an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeHandle {
    /// A C-runtime style descriptor number.
    Descriptor(i32),
    /// A Windows `HANDLE` value.
    Handle(isize),
}

/// Accessors an open file may expose to the lock drivers.
pub trait OpenFile: Send + Sync {
    /// Native handle or descriptor, if the file was opened in a way that has one.
    fn native(&self) -> io::Result<Option<NativeHandle>> {
        Ok(None)
    }

    /// Channel usable for runtime-managed locking.
    fn channel(&self) -> Option<&File> {
        None
    }

    /// Current read/write position.
    fn position(&self) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "file position is not available",
        ))
    }

    /// Move the read/write position.
    fn set_position(&self, _pos: u64) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "file position is not available",
        ))
    }
}

impl OpenFile for File {
    fn native(&self) -> io::Result<Option<NativeHandle>> {
        #[cfg(unix)]
        {
            use std::os::fd::AsRawFd;
            Ok(Some(NativeHandle::Descriptor(self.as_raw_fd())))
        }
        #[cfg(windows)]
        {
            use std::os::windows::io::AsRawHandle;
            Ok(Some(NativeHandle::Handle(self.as_raw_handle() as isize)))
        }
        #[cfg(not(any(unix, windows)))]
        {
            Ok(None)
        }
    }

    fn channel(&self) -> Option<&File> {
        Some(self)
    }

    fn position(&self) -> io::Result<u64> {
        let mut file = self;
        file.stream_position()
    }

    fn set_position(&self, pos: u64) -> io::Result<()> {
        let mut file = self;
        file.seek(SeekFrom::Start(pos)).map(|_| ())
    }
}

/// A bare descriptor number handed over by a runtime with no richer file object.
///
/// The descriptor is borrowed: it is never closed by this type.
#[derive(Debug, Clone, Copy)]
pub struct RawDescriptor(pub i32);

impl OpenFile for RawDescriptor {
    fn native(&self) -> io::Result<Option<NativeHandle>> {
        Ok(Some(NativeHandle::Descriptor(self.0)))
    }
}

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(1);

struct FileInner {
    id: u64,
    // Declared before `file` so reclamation is requested before the file closes.
    owner: Owner,
    file: Box<dyn OpenFile>,
}

/// Script-visible handle to an open file.
///
/// Clones share identity. Registry keys compare by this identity, never by the
/// path or descriptor number, so two opens of one file never collide. When the
/// last clone is dropped, every lock still registered against it is reclaimed.
#[derive(Clone)]
pub struct FileHandle {
    inner: Arc<FileInner>,
}

impl FileHandle {
    pub fn new(file: impl OpenFile + 'static) -> Self {
        Self {
            inner: Arc::new(FileInner {
                id: NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed),
                owner: Owner::new(),
                file: Box::new(file),
            }),
        }
    }

    /// Process-unique identity of this handle.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn file(&self) -> &dyn OpenFile {
        self.inner.file.as_ref()
    }

    pub fn same_file(&self, other: &FileHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn owner(&self) -> &Owner {
        &self.inner.owner
    }

    pub(crate) fn downgrade(&self) -> WeakFileHandle {
        WeakFileHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl From<File> for FileHandle {
    fn from(file: File) -> Self {
        FileHandle::new(file)
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle").field("id", &self.id()).finish()
    }
}

/// Non-owning reference used by lock cleanups, so a held lock never keeps its
/// file reachable.
#[derive(Clone)]
pub(crate) struct WeakFileHandle {
    inner: Weak<FileInner>,
}

impl WeakFileHandle {
    pub(crate) fn upgrade(&self) -> Option<FileHandle> {
        self.inner.upgrade().map(|inner| FileHandle { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn handles_have_distinct_identity() {
        let a = FileHandle::new(RawDescriptor(3));
        let b = FileHandle::new(RawDescriptor(3));
        assert_ne!(a.id(), b.id());
        assert!(!a.same_file(&b));

        let a2 = a.clone();
        assert_eq!(a.id(), a2.id());
        assert!(a.same_file(&a2));
    }

    #[test]
    fn std_file_exposes_every_accessor() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.bin");
        std::fs::write(&path, b"0123456789").unwrap();
        let file = File::open(&path).unwrap();

        assert!(file.native().unwrap().is_some());
        assert!(file.channel().is_some());

        file.set_position(4).unwrap();
        assert_eq!(file.position().unwrap(), 4);
    }

    #[test]
    fn raw_descriptor_has_no_channel_or_position() {
        let raw = RawDescriptor(7);
        assert_eq!(raw.native().unwrap(), Some(NativeHandle::Descriptor(7)));
        assert!(raw.channel().is_none());
        assert!(raw.position().is_err());
    }

    #[test]
    fn weak_handle_dies_with_last_clone() {
        let handle = FileHandle::new(RawDescriptor(9));
        let weak = handle.downgrade();
        assert!(weak.upgrade().is_some());
        drop(handle);
        assert!(weak.upgrade().is_none());
    }
}
