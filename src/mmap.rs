//! Memory-mapped file loading.
//!
//! `MmapWholeFile` opens a file read-only and maps it in one piece. The
//! `populate` flag asks the kernel to fault the pages in eagerly
//! (`MAP_POPULATE` where `memmap2` supports it, plus `MADV_WILLNEED` on
//! Linux); on other platforms it is advisory and silently ignored.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::{Mmap, MmapOptions};

use crate::error::{Error, Result};
use crate::region::ByteRegion;

/// A whole file mapped read-only.
#[derive(Debug)]
pub struct MmapWholeFile {
    map: Arc<Mmap>,
    path: PathBuf,
}

impl MmapWholeFile {
    /// Map `path` read-only. With `populate`, prefault the mapping.
    pub fn open(path: &Path, populate: bool) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mut opts = MmapOptions::new();
        if populate {
            opts.populate();
        }
        // SAFETY: artifacts are immutable once finished; callers must not
        // truncate a store file while readers hold it mapped.
        let map = unsafe { opts.map(&file) }.map_err(|e| Error::io(path, e))?;
        if populate {
            advise_willneed(&map);
        }
        Ok(MmapWholeFile {
            map: Arc::new(map),
            path: path.to_path_buf(),
        })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A region over the entire mapping. Cheap; shares the map refcount.
    pub fn region(&self) -> ByteRegion {
        ByteRegion::from_mmap(Arc::clone(&self.map))
    }
}

#[cfg(target_os = "linux")]
fn advise_willneed(map: &Mmap) {
    if map.len() == 0 {
        return;
    }
    // Best-effort: a failed madvise only loses the prefetch hint.
    unsafe {
        libc::madvise(
            map.as_ptr() as *mut libc::c_void,
            map.len(),
            libc::MADV_WILLNEED,
        );
    }
}

#[cfg(not(target_os = "linux"))]
fn advise_willneed(_map: &Mmap) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn maps_file_contents() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"mapped bytes").unwrap();
        tmp.flush().unwrap();
        let mm = MmapWholeFile::open(tmp.path(), false).unwrap();
        assert_eq!(mm.region().as_slice(), b"mapped bytes");
    }

    #[test]
    fn populate_flag_is_harmless() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[7u8; 4096]).unwrap();
        tmp.flush().unwrap();
        let mm = MmapWholeFile::open(tmp.path(), true).unwrap();
        assert_eq!(mm.len(), 4096);
        assert_eq!(mm.region().as_slice()[4095], 7);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = MmapWholeFile::open(Path::new("/nonexistent/zbs-test"), false).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/zbs-test"));
    }
}
