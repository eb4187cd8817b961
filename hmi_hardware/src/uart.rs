use std::path::Path;
use std::time::Duration;

use rppal::uart::{Parity, Uart};
use tracing::{debug, trace};

use crate::error::{HwError, Result};
use hmi_traits::SerialLink;

/// Controller link on a hardware UART (8N1).
pub struct UartLink {
    uart: Uart,
}

impl UartLink {
    /// Open `device` at `baud`, configured for non-blocking reads.
    pub fn open(device: &Path, baud: u32) -> Result<Self> {
        let mut uart = Uart::with_path(device, baud, Parity::None, 8, 1)
            .map_err(|e| HwError::Uart(e.to_string()))?;
        // min_length 0 + zero timeout: read() returns immediately with what is buffered
        uart.set_read_mode(0, Duration::ZERO)
            .map_err(|e| HwError::Uart(e.to_string()))?;
        uart.set_write_mode(true)
            .map_err(|e| HwError::Uart(e.to_string()))?;
        debug!(device = %device.display(), baud, "uart opened");
        Ok(Self { uart })
    }
}

fn write_error(e: rppal::uart::Error) -> HwError {
    match e {
        rppal::uart::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => HwError::Timeout,
        other => HwError::Uart(other.to_string()),
    }
}

impl SerialLink for UartLink {
    fn read_available(
        &mut self,
        buf: &mut [u8],
    ) -> std::result::Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let n = self
            .uart
            .read(buf)
            .map_err(|e| HwError::Uart(e.to_string()))?;
        if n > 0 {
            trace!(bytes = n, "uart rx");
        }
        Ok(n)
    }

    fn write_line(
        &mut self,
        line: &str,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut frame = Vec::with_capacity(line.len() + 1);
        frame.extend_from_slice(line.as_bytes());
        frame.push(b'\n');
        let written = self.uart.write(&frame).map_err(write_error)?;
        if written != frame.len() {
            return Err(HwError::ShortWrite {
                written,
                expected: frame.len(),
            }
            .into());
        }
        trace!(line, "uart tx");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_timeouts_map_to_timeout() {
        let e = rppal::uart::Error::Io(std::io::Error::from(std::io::ErrorKind::TimedOut));
        assert!(matches!(write_error(e), HwError::Timeout));
        let e = rppal::uart::Error::Io(std::io::Error::other("framing"));
        assert!(matches!(write_error(e), HwError::Uart(_)));
    }
}
