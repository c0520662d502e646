//! Directory iteration for scripts.

use crate::error::{LfsError, Result};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Dot,
    DotDot,
    Entry(usize),
    Closed,
}

/// Snapshot of a directory listing, yielded one name at a time.
///
/// Yields `.`, then `..`, then every entry name, then `None` forever.
#[derive(Debug)]
pub struct DirIter {
    entries: Vec<String>,
    cursor: Cursor,
}

impl DirIter {
    /// List `dir`. `shown` is the path as the script wrote it, used in faults.
    pub fn open(dir: &Path, shown: &str) -> Result<Self> {
        let meta = fs::metadata(dir)
            .map_err(|_| LfsError::Fault(format!("cannot open {}: No such file or directory", shown)))?;
        if !meta.is_dir() {
            return Err(LfsError::Fault(format!("cannot open {}: Not a directory", shown)));
        }

        let io_fault = |_| LfsError::Fault(format!("cannot open {}: I/O error", shown));
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_fault)? {
            let entry = entry.map_err(io_fault)?;
            entries.push(entry.file_name().to_string_lossy().into_owned());
        }

        Ok(Self {
            entries,
            cursor: Cursor::Dot,
        })
    }

    /// Next name, or `None` once the listing is exhausted.
    ///
    /// Fails once the iterator has been closed.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<String>> {
        match self.cursor {
            Cursor::Dot => {
                self.cursor = Cursor::DotDot;
                Ok(Some(".".to_string()))
            }
            Cursor::DotDot => {
                self.cursor = Cursor::Entry(0);
                Ok(Some("..".to_string()))
            }
            Cursor::Entry(index) => match self.entries.get(index) {
                Some(name) => {
                    self.cursor = Cursor::Entry(index + 1);
                    Ok(Some(name.clone()))
                }
                None => Ok(None),
            },
            Cursor::Closed => Err(LfsError::Fault(
                "calling 'next' on bad self (closed directory)".to_string(),
            )),
        }
    }

    pub fn close(&mut self) {
        self.cursor = Cursor::Closed;
    }

    pub fn is_closed(&self) -> bool {
        self.cursor == Cursor::Closed
    }
}
