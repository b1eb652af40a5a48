//! Streaming client support: frames go to the stdin of an external process.

use std::io::{self, Write};
use std::process::{Child, ChildStdin, Command, Stdio};

use tracing::{info, warn};

use super::DmxHost;

/// The pipe host launches the bus process on first write and keeps its
/// standard input open until closed.
pub struct PipeHost {
    /// Shell command line, e.g. `ola_streaming_client -u 1`.
    cmd: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    closed: bool,
}

impl PipeHost {
    pub fn new<S: Into<String>>(cmd: S) -> PipeHost {
        PipeHost {
            cmd: cmd.into(),
            child: None,
            stdin: None,
            closed: false,
        }
    }

    /// Whether the bus process has been launched.
    pub fn is_open(&self) -> bool {
        self.stdin.is_some()
    }

    fn open(&mut self) -> io::Result<&mut ChildStdin> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "bus process pipe is closed",
            ));
        }
        if self.stdin.is_none() {
            info!("Starting bus process: {}", self.cmd);
            let mut child = shell(&self.cmd).stdin(Stdio::piped()).spawn()?;
            self.stdin = child.stdin.take();
            self.child = Some(child);
        }
        self.stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "bus process has no stdin"))
    }
}

#[cfg(unix)]
fn shell(cmd: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(cmd);
    command
}

#[cfg(windows)]
fn shell(cmd: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(cmd);
    command
}

impl DmxHost for PipeHost {
    fn write_frame(&mut self, line: &str) -> io::Result<()> {
        let stdin = self.open()?;
        stdin.write_all(line.as_bytes())?;
        stdin.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // Dropping stdin sends EOF to the process.
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            let status = child.wait()?;
            if status.success() {
                info!("Bus process exited");
            } else {
                warn!("Bus process exited with {}", status);
            }
        }
        Ok(())
    }
}

impl Drop for PipeHost {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("Failed to close bus process: {}", err);
        }
    }
}
