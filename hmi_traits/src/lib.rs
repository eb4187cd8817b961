pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::io::{Read, Write};

/// Point-to-point serial link to the motor controller.
pub trait SerialLink {
    /// Copy whatever bytes are already pending into `buf` and return the count.
    /// Must not block; returns `Ok(0)` when nothing is waiting.
    fn read_available(
        &mut self,
        buf: &mut [u8],
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>>;

    /// Write one protocol line. Implementations append the `\n` terminator.
    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: SerialLink + ?Sized> SerialLink for Box<T> {
    fn read_available(
        &mut self,
        buf: &mut [u8],
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_available(buf)
    }

    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).write_line(line)
    }
}

/// Minimal flat filesystem on the flash partition (LittleFS on the target).
///
/// Names are flat file names relative to the mount point. Dropping a writer
/// returned by `create` closes the file.
pub trait FlashFs {
    fn exists(&self, name: &str) -> bool;
    fn size(&self, name: &str) -> std::io::Result<u64>;
    fn open_read(&self, name: &str) -> std::io::Result<Box<dyn Read + '_>>;
    fn create(&mut self, name: &str) -> std::io::Result<Box<dyn Write + '_>>;
    fn remove(&mut self, name: &str) -> std::io::Result<()>;
    fn rename(&mut self, from: &str, to: &str) -> std::io::Result<()>;
}

impl<T: FlashFs + ?Sized> FlashFs for Box<T> {
    fn exists(&self, name: &str) -> bool {
        (**self).exists(name)
    }
    fn size(&self, name: &str) -> std::io::Result<u64> {
        (**self).size(name)
    }
    fn open_read(&self, name: &str) -> std::io::Result<Box<dyn Read + '_>> {
        (**self).open_read(name)
    }
    fn create(&mut self, name: &str) -> std::io::Result<Box<dyn Write + '_>> {
        (**self).create(name)
    }
    fn remove(&mut self, name: &str) -> std::io::Result<()> {
        (**self).remove(name)
    }
    fn rename(&mut self, from: &str, to: &str) -> std::io::Result<()> {
        (**self).rename(from, to)
    }
}
