pub mod error;
pub mod fs;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod uart;

pub use fs::DirFs;
pub use hmi_traits::{FlashFs, SerialLink};

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::HwError;

/// Lines written by a `SimulatedLink`, readable after the link has been
/// handed to the bridge.
#[derive(Clone, Default)]
pub struct LinkProbe {
    sent: Rc<RefCell<Vec<String>>>,
}

impl LinkProbe {
    /// All lines written so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        self.sent.borrow().clone()
    }

    pub fn last_sent(&self) -> Option<String> {
        self.sent.borrow().last().cloned()
    }

    pub fn clear(&self) {
        self.sent.borrow_mut().clear();
    }
}

/// Simulated controller link.
///
/// Inbound traffic comes from raw bytes pushed with `push_bytes`/`push_line`,
/// or from a script that releases one line per `read_available` call so a
/// replayed session advances one protocol line per polling tick.
pub struct SimulatedLink {
    inbound: VecDeque<u8>,
    script: VecDeque<String>,
    probe: LinkProbe,
    fail_writes: bool,
}

impl Default for SimulatedLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedLink {
    pub fn new() -> Self {
        SimulatedLink {
            inbound: VecDeque::new(),
            script: VecDeque::new(),
            probe: LinkProbe::default(),
            fail_writes: false,
        }
    }

    /// Replay `lines` one per read call. Blank lines and `#` comments are skipped.
    pub fn from_script<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut link = Self::new();
        link.script = lines
            .into_iter()
            .map(Into::into)
            .filter(|l| {
                let t = l.trim();
                !t.is_empty() && !t.starts_with('#')
            })
            .collect();
        link
    }

    pub fn probe(&self) -> LinkProbe {
        self.probe.clone()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    pub fn push_line(&mut self, line: &str) {
        self.push_bytes(line.as_bytes());
        self.inbound.push_back(b'\n');
    }

    /// Make every subsequent write fail, as a disconnected UART would.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Scripted lines not yet released.
    pub fn script_remaining(&self) -> usize {
        self.script.len()
    }
}

impl SerialLink for SimulatedLink {
    fn read_available(
        &mut self,
        buf: &mut [u8],
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        if self.inbound.is_empty()
            && let Some(line) = self.script.pop_front()
        {
            tracing::trace!(line = %line, "simulated link releasing scripted line");
            self.push_line(&line);
        }
        let n = buf.len().min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.fail_writes {
            return Err(Box::new(HwError::Closed));
        }
        tracing::trace!(line = %line, "simulated link write");
        self.probe.sent.borrow_mut().push(line.to_string());
        Ok(())
    }
}
