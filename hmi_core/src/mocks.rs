//! Test and helper mocks for hmi_core.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use hmi_traits::FlashFs;

#[derive(Debug, Default)]
struct MemInner {
    files: HashMap<String, Vec<u8>>,
    fail_create: bool,
    fail_rename: bool,
    /// Writes fail once a file reaches this many bytes.
    write_limit: Option<usize>,
    /// Bytes past this length are silently dropped, like a full partition
    /// that still acknowledges writes.
    truncate_at: Option<usize>,
}

/// In-memory `FlashFs` with fault injection.
///
/// Clones share the same files, so a test can keep a handle after moving
/// the filesystem into a store or a worker thread.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    inner: Arc<Mutex<MemInner>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemInner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().files.get(name).cloned()
    }

    pub fn put_file(&self, name: &str, bytes: Vec<u8>) {
        self.lock().files.insert(name.to_string(), bytes);
    }

    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().files.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.lock().fail_create = fail;
    }

    pub fn set_fail_rename(&self, fail: bool) {
        self.lock().fail_rename = fail;
    }

    pub fn set_write_limit(&self, limit: Option<usize>) {
        self.lock().write_limit = limit;
    }

    pub fn set_truncate_at(&self, limit: Option<usize>) {
        self.lock().truncate_at = limit;
    }
}

struct MemWriter {
    fs: MemFs,
    name: String,
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.fs.lock();
        let write_limit = inner.write_limit;
        let truncate_at = inner.truncate_at;
        let file = inner.files.entry(self.name.clone()).or_default();
        if let Some(limit) = write_limit
            && file.len() + buf.len() > limit
        {
            return Err(io::Error::other("no space left on flash"));
        }
        let keep = match truncate_at {
            Some(t) => buf.len().min(t.saturating_sub(file.len())),
            None => buf.len(),
        };
        file.extend_from_slice(&buf[..keep]);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn not_found(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{name} not found"))
}

impl FlashFs for MemFs {
    fn exists(&self, name: &str) -> bool {
        self.lock().files.contains_key(name)
    }

    fn size(&self, name: &str) -> io::Result<u64> {
        self.lock()
            .files
            .get(name)
            .map(|f| f.len() as u64)
            .ok_or_else(|| not_found(name))
    }

    fn open_read(&self, name: &str) -> io::Result<Box<dyn Read + '_>> {
        let bytes = self.file(name).ok_or_else(|| not_found(name))?;
        Ok(Box::new(io::Cursor::new(bytes)))
    }

    fn create(&mut self, name: &str) -> io::Result<Box<dyn Write + '_>> {
        if self.lock().fail_create {
            return Err(io::Error::other("flash create failed"));
        }
        self.lock().files.insert(name.to_string(), Vec::new());
        Ok(Box::new(MemWriter {
            fs: self.clone(),
            name: name.to_string(),
        }))
    }

    fn remove(&mut self, name: &str) -> io::Result<()> {
        self.lock()
            .files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(name))
    }

    fn rename(&mut self, from: &str, to: &str) -> io::Result<()> {
        let mut inner = self.lock();
        if inner.fail_rename {
            return Err(io::Error::other("flash rename failed"));
        }
        let data = inner.files.remove(from).ok_or_else(|| not_found(from))?;
        inner.files.insert(to.to_string(), data);
        Ok(())
    }
}
