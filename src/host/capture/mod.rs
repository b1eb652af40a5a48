//! In-process host that captures frames instead of spawning a bus process.

use crossbeam::channel::{self, Receiver, Sender};
use std::io;

use super::DmxHost;

/// The capture host passes frame lines over a channel to a `FrameReader`.
pub struct CaptureHost {
    sender: Option<Sender<String>>,
}

/// Read end of a `CaptureHost`.
#[derive(Clone)]
pub struct FrameReader {
    receiver: Receiver<String>,
}

impl CaptureHost {
    pub fn new() -> (CaptureHost, FrameReader) {
        let (sender, receiver) = channel::unbounded();
        (
            CaptureHost {
                sender: Some(sender),
            },
            FrameReader { receiver },
        )
    }
}

impl DmxHost for CaptureHost {
    fn write_frame(&mut self, line: &str) -> io::Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "capture host is closed"))?;
        sender
            .send(line.to_owned())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "frame reader is gone"))
    }

    fn close(&mut self) -> io::Result<()> {
        self.sender = None;
        Ok(())
    }
}

impl FrameReader {
    /// Next written frame, newline included. `None` when nothing is pending.
    pub fn next_frame(&self) -> Option<String> {
        self.receiver.try_recv().ok()
    }

    /// Drain every pending frame.
    pub fn frames(&self) -> Vec<String> {
        self.receiver.try_iter().collect()
    }
}
