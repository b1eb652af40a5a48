//! Host devices receive serialized frames and drive the physical bus.

use std::io;

use tracing::trace;

use crate::error::{Error, Result};

pub mod capture;
pub mod pipe;
pub use self::capture::{CaptureHost, FrameReader};
pub use self::pipe::PipeHost;

/// Bus hosts accept complete frame lines and pass them on to whatever drives the bus.
pub trait DmxHost {
    /// Write one newline-terminated frame and flush it.
    fn write_frame(&mut self, line: &str) -> io::Result<()>;
    /// Release the output channel. Closing twice is a no-op.
    fn close(&mut self) -> io::Result<()>;
}

/// Render channel values in the wire format: comma separated decimal integers.
///
/// Values are truncated toward zero and never clamped.
pub fn serialize(values: &[f64]) -> String {
    values
        .iter()
        .map(|value| (*value as i64).to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// The controller's single output channel.
pub struct TransportSink {
    host: Box<dyn DmxHost>,
    frames_written: u64,
}

impl TransportSink {
    pub fn new(host: Box<dyn DmxHost>) -> TransportSink {
        TransportSink {
            host,
            frames_written: 0,
        }
    }

    /// Serialize a frame and write it to the host immediately.
    ///
    /// Failures are not retried.
    pub fn write(&mut self, values: &[f64]) -> Result<()> {
        let mut line = serialize(values);
        line.push('\n');
        self.host
            .write_frame(&line)
            .map_err(Error::TransportFailure)?;
        self.frames_written += 1;
        trace!("wrote frame {}: {}", self.frames_written, line.trim_end());
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.host.close().map_err(Error::TransportFailure)
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}
